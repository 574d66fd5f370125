use std::error::Error as StdError;

use crate::session::SessionState;

/// Crate-wide result type for chat session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a chat session to its caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A send was attempted while the session was not `Ready`.
    #[error("chat session is not ready (state: {state})")]
    NotReady { state: SessionState },

    /// The transport rejected or lost an outbound message.
    #[error("message delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },

    /// The transport connection is gone.
    #[error("chat session transport closed")]
    Closed,

    /// Wrapped source error from an external dependency.
    #[error("chat session operation failed: {context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn delivery(recipient: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Delivery {
            recipient: recipient.into(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Short machine-friendly kind, used as a log field and metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotReady { .. } => "not_ready",
            Self::Delivery { .. } => "delivery",
            Self::Closed => "closed",
            Self::External { .. } => "external",
        }
    }
}
