//! Chat session contract.
//!
//! A messaging transport (WhatsApp Web today) implements [`ChatSession`] and
//! hands every inbound message to exactly one consumer over an
//! [`InboundReceiver`] created alongside the session.

pub mod error;
pub mod message;
pub mod session;

pub use {
    error::{Error, Result},
    message::InboundMessage,
    session::{
        ChatSession, DEFAULT_INBOUND_CAPACITY, InboundReceiver, InboundSender, SessionState,
        StateObserver, StatePublisher, inbound_channel, state_channel,
    },
};
