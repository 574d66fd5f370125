//! Inbound message processing: recognize the `!chatgpt` command, ask the
//! completion provider and reply through the chat session.

pub mod command;
pub mod dispatcher;
pub mod error;

pub use {
    command::{APOLOGY, COMMAND_PREFIX, Command, PROCESSING_NOTICE, USAGE_HINT, parse_command},
    dispatcher::Dispatcher,
    error::{Error, Result},
};
