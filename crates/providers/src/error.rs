/// Errors raised by a completion provider call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A request was built from an empty prompt.
    #[error("completion prompt must not be empty")]
    EmptyPrompt,

    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("completion provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The provider answered with a body that is not JSON.
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Api { status: 429, .. })
    }

    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }

    /// Short machine-friendly kind, used as a log field and metric label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "empty_prompt",
            Self::Http(_) => "http",
            Self::Api { .. } if self.is_rate_limited() => "rate_limited",
            Self::Api { .. } if self.is_auth() => "auth",
            Self::Api { .. } => "api",
            Self::SerdeJson(_) => "decode",
        }
    }
}

pub type ProviderError = Error;
pub type Result<T> = std::result::Result<T, Error>;
