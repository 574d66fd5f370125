//! Completion provider client.
//!
//! A provider turns one prompt into one generated reply plus token usage.
//! [`openai::OpenAiProvider`] talks to any OpenAI-compatible
//! `/chat/completions` endpoint; tests substitute their own
//! [`CompletionProvider`].

pub mod error;
pub mod model;
pub mod openai;

pub use {
    error::{Error, ProviderError, Result},
    model::{CompletionProvider, CompletionRequest, CompletionResult, Usage},
    openai::OpenAiProvider,
};

/// Shared HTTP client for providers.
///
/// Reused across requests to share the connection pool, DNS cache and TLS
/// sessions.
pub fn shared_http_client() -> &'static reqwest::Client {
    static CLIENT: std::sync::LazyLock<reqwest::Client> =
        std::sync::LazyLock::new(reqwest::Client::new);
    &CLIENT
}
