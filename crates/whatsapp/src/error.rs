use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("sidecar is not connected")]
    NotConnected,

    #[error("failed to connect to sidecar on port {port} after {attempts} attempts: {last_error}")]
    ConnectFailed {
        port: u16,
        attempts: u32,
        last_error: String,
    },

    #[error("sidecar process: {0}")]
    Process(String),
}

impl Error {
    #[must_use]
    pub fn process(err: impl std::fmt::Display) -> Self {
        Self::Process(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
