//! WebSocket connection to the sidecar.
//!
//! A reader task turns incoming frames into [`SidecarEvent`]s; a writer task
//! drains the outgoing queue. When the socket closes the reader emits
//! [`SidecarEvent::ConnectionLost`] exactly once.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    futures::{SinkExt, StreamExt},
    tokio::sync::mpsc,
    tokio_tungstenite::{connect_async, tungstenite::Message},
    tracing::{debug, info, trace, warn},
};

use crate::{
    error::{Error, Result},
    types::{GatewayMessage, SidecarMessage},
};

pub const DEFAULT_SIDECAR_PORT: u16 = 3100;

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// What the connection reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SidecarEvent {
    Message(SidecarMessage),
    ConnectionLost,
}

pub type EventSender = mpsc::UnboundedSender<SidecarEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<SidecarEvent>;

/// Handle to a live sidecar connection.
#[derive(Clone)]
pub struct SidecarHandle {
    outgoing: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
}

impl SidecarHandle {
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.outgoing.is_closed()
    }

    /// Queue a frame for the sidecar.
    pub async fn send(&self, msg: GatewayMessage) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let text = serde_json::to_string(&msg)?;
        trace!(frame = %text, "sidecar frame out");
        self.outgoing
            .send(Message::text(text))
            .map_err(|_| Error::NotConnected)
    }

    /// Close the socket. The reader then reports `ConnectionLost`.
    pub fn close(&self) {
        let _ = self.outgoing.send(Message::Close(None));
    }
}

/// Connect to the sidecar listening on `127.0.0.1:port`.
pub async fn connect(port: u16, events: EventSender) -> Result<SidecarHandle> {
    let url = format!("ws://127.0.0.1:{port}");
    let (ws, _response) = connect_async(url.as_str()).await?;
    info!(port, "connected to whatsapp sidecar");

    let (mut sink, mut stream) = ws.split();
    let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();
    let connected = Arc::new(AtomicBool::new(true));

    tokio::spawn(async move {
        while let Some(frame) = outgoing_rx.recv().await {
            let closing = matches!(frame, Message::Close(_));
            if let Err(e) = sink.send(frame).await {
                warn!(error = %e, "failed to write to sidecar socket");
                break;
            }
            if closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader_connected = Arc::clone(&connected);
    tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<SidecarMessage>(&text) {
                    Ok(msg) => {
                        if events.send(SidecarEvent::Message(msg)).is_err() {
                            break;
                        }
                    },
                    Err(e) => warn!(error = %e, "ignoring malformed sidecar frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "sidecar closed the socket");
                    break;
                },
                Ok(_) => {},
                Err(e) => {
                    warn!(error = %e, "sidecar socket error");
                    break;
                },
            }
        }
        reader_connected.store(false, Ordering::Release);
        let _ = events.send(SidecarEvent::ConnectionLost);
    });

    Ok(SidecarHandle {
        outgoing,
        connected,
    })
}

/// [`connect`] with up to `max_attempts` tries, for a sidecar process that
/// may still be starting.
pub async fn connect_with_retry(
    port: u16,
    events: EventSender,
    max_attempts: u32,
) -> Result<SidecarHandle> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = String::new();
    for attempt in 1..=max_attempts {
        match connect(port, events.clone()).await {
            Ok(handle) => return Ok(handle),
            Err(e) => {
                debug!(port, attempt, error = %e, "sidecar not reachable yet");
                last_error = e.to_string();
            },
        }
        if attempt < max_attempts {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }
    Err(Error::ConnectFailed {
        port,
        attempts: max_attempts,
        last_error,
    })
}
