use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::sync::{mpsc, watch},
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    message::InboundMessage,
};

/// Buffer size of the inbound message channel.
pub const DEFAULT_INBOUND_CAPACITY: usize = 256;

/// Sending half of the inbound stream; owned by the session.
pub type InboundSender = mpsc::Sender<InboundMessage>;

/// Receiving half of the inbound stream; owned by the single consumer.
pub type InboundReceiver = mpsc::Receiver<InboundMessage>;

/// Create the inbound stream a session delivers normalized messages on.
#[must_use]
pub fn inbound_channel(capacity: usize) -> (InboundSender, InboundReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Connection lifecycle of a chat session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// Connecting or waiting for the out-of-band login step.
    Authenticating,
    Ready,
    Disconnected,
}

impl SessionState {
    #[must_use]
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Authenticating => "authenticating",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Staying in the same state is always allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::*;

        self == next
            || matches!(
                (self, next),
                (Uninitialized, Authenticating)
                    | (Authenticating, Ready)
                    | (Authenticating, Disconnected)
                    | (Ready, Disconnected)
                    | (Disconnected, Authenticating)
            )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Create the single-writer state cell for a session.
#[must_use]
pub fn state_channel() -> (StatePublisher, StateObserver) {
    let (tx, rx) = watch::channel(SessionState::Uninitialized);
    (StatePublisher { tx }, StateObserver { rx })
}

/// Write side of the session state. Only the owning session holds one.
#[derive(Debug)]
pub struct StatePublisher {
    tx: watch::Sender<SessionState>,
}

impl StatePublisher {
    #[must_use]
    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    /// Move to `next` if the lifecycle allows it.
    ///
    /// Returns the state that is in effect afterwards.
    pub fn transition(&self, next: SessionState) -> SessionState {
        let current = self.current();
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "ignoring invalid session state transition");
            return current;
        }
        if current != next {
            debug!(from = %current, to = %next, "session state changed");
            self.tx.send_replace(next);
        }
        next
    }

    #[must_use]
    pub fn observer(&self) -> StateObserver {
        StateObserver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read-only view of the session state.
#[derive(Debug, Clone)]
pub struct StateObserver {
    rx: watch::Receiver<SessionState>,
}

impl StateObserver {
    #[must_use]
    pub fn current(&self) -> SessionState {
        *self.rx.borrow()
    }

    /// Fail with [`Error::NotReady`] unless the session is `Ready`.
    pub fn ensure_ready(&self) -> Result<()> {
        let state = self.current();
        if state.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady { state })
        }
    }

    /// Wait until the session reaches `Ready`.
    pub async fn ready(&mut self) -> Result<()> {
        self.rx
            .wait_for(|state| state.is_ready())
            .await
            .map(|_| ())
            .map_err(|_| Error::Closed)
    }

    /// Wait for the next state change and return the new state.
    pub async fn changed(&mut self) -> Result<SessionState> {
        self.rx.changed().await.map_err(|_| Error::Closed)?;
        Ok(*self.rx.borrow_and_update())
    }
}

/// One authenticated connection to a messaging network.
///
/// Inbound traffic is not part of this trait: the implementation is built
/// together with its [`InboundReceiver`] and delivers every normalized
/// message there.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Transport identifier (e.g. "whatsapp-web").
    fn id(&self) -> &str;

    /// Establish the connection. Returning `Ok` does not imply `Ready`;
    /// watch [`ChatSession::observe`] for that.
    async fn initialize(&self) -> Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> SessionState;

    /// Subscribe to lifecycle changes.
    fn observe(&self) -> StateObserver;

    /// Deliver `text` to `recipient_id`.
    ///
    /// Fails with [`Error::NotReady`] without touching the transport when the
    /// session is not `Ready`, and with [`Error::Delivery`] when the transport
    /// fails. Never retries.
    async fn send_message(&self, recipient_id: &str, text: &str) -> Result<()>;

    /// Tear the connection down. No-op by default.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
