use {async_trait::async_trait, serde::Serialize};

use crate::error::{Error, Result};

/// A prompt that is guaranteed to be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    prompt: String,
}

impl CompletionRequest {
    /// Build a request, rejecting prompts that are empty after trimming.
    pub fn new(prompt: impl Into<String>) -> Result<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(Error::EmptyPrompt);
        }
        Ok(Self { prompt })
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

/// Token accounting reported by the provider. Missing fields are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Generated reply for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub text: String,
    pub usage: Usage,
}

/// A remote service that turns a prompt into text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider name (e.g. "openai").
    fn name(&self) -> &str;

    /// Model identifier (e.g. "gpt-3.5-turbo").
    fn id(&self) -> &str;

    /// Issue exactly one completion call. No retries.
    async fn generate(&self, request: &CompletionRequest) -> Result<CompletionResult>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_prompt_is_rejected() {
        assert!(matches!(CompletionRequest::new(""), Err(Error::EmptyPrompt)));
        assert!(matches!(
            CompletionRequest::new("  \n\t"),
            Err(Error::EmptyPrompt)
        ));
    }

    #[test]
    fn prompt_is_kept_verbatim() {
        let request = CompletionRequest::new("what is 2+2").unwrap();
        assert_eq!(request.prompt(), "what is 2+2");
    }
}
