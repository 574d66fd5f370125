//! WhatsApp Web transport.
//!
//! WhatsApp Web is spoken by a Node.js sidecar (Baileys). This crate
//! supervises that process, talks to it over a local WebSocket and exposes
//! the result as a [`wagpt_channels::ChatSession`].

pub mod error;
pub mod process;
pub mod qr;
pub mod session;
pub mod sidecar;
pub mod state;
pub mod types;

pub use {
    error::{Error, Result},
    session::{CHANNEL_ID, SessionConfig, WhatsAppSession},
};
