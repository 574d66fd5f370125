use {wagpt_channels::Error as SessionError, wagpt_providers::ProviderError};

/// Why a command could not be answered. Never escapes the dispatcher: it is
/// logged and replaced by the apology reply.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl Error {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Session(e) => e.kind(),
            Self::Provider(e) => e.kind(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
