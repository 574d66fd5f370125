use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, trace, warn},
};

#[cfg(feature = "metrics")]
use wagpt_metrics::{counter, histogram, labels, llm as llm_metrics};

use crate::{
    error::{Error, Result},
    model::{CompletionProvider, CompletionRequest, CompletionResult, Usage},
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Response length ceiling sent with every request.
pub const MAX_RESPONSE_TOKENS: u32 = 500;
/// Sampling temperature sent with every request.
pub const TEMPERATURE: f64 = 0.7;

const SYSTEM_PROMPT: &str = "You are a helpful assistant responding to questions from WhatsApp \
                             users. Keep responses concise and helpful.";

/// Reply text used when the provider returns no content.
pub const FALLBACK_RESPONSE: &str = "Sorry, I could not generate a response.";

const PROMPT_PREVIEW_CHARS: usize = 100;

pub struct OpenAiProvider {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    provider_name: String,
    client: &'static reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(api_key: Secret<String>, model: String, base_url: String) -> Self {
        Self::new_with_name(api_key, model, base_url, "openai".into())
    }

    /// Same as [`OpenAiProvider::new`] for an OpenAI-compatible endpoint run
    /// by someone else; the name only shows up in logs and metrics.
    pub fn new_with_name(
        api_key: Secret<String>,
        model: String,
        base_url: String,
        provider_name: String,
    ) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            provider_name,
            client: crate::shared_http_client(),
        }
    }

    fn request_body(&self, prompt: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
            "max_tokens": MAX_RESPONSE_TOKENS,
            "temperature": TEMPERATURE,
        })
    }

    async fn send(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        let body = self.request_body(request.prompt());
        trace!(body = %body, "openai request body");

        let http_resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = http_resp.status();
        if !status.is_success() {
            let body_text = http_resp.text().await.unwrap_or_default();
            warn!(
                status = %status,
                model = %self.model,
                provider = %self.provider_name,
                body = %body_text,
                "openai API error"
            );
            return Err(Error::api(status.as_u16(), body_text));
        }

        let bytes = http_resp.bytes().await?;
        let resp: serde_json::Value = serde_json::from_slice(&bytes)?;
        trace!(response = %resp, "openai raw response");

        Ok(parse_completion(&resp))
    }
}

/// Extract the reply text and usage from a `/chat/completions` payload.
///
/// Missing or empty content becomes [`FALLBACK_RESPONSE`]; missing usage
/// counters become zero.
fn parse_completion(resp: &serde_json::Value) -> CompletionResult {
    let text = resp["choices"][0]["message"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let text = match text {
        Some(text) => text,
        None => {
            debug!("provider returned no content, using fallback reply");
            #[cfg(feature = "metrics")]
            counter!(llm_metrics::EMPTY_RESPONSES_TOTAL).increment(1);
            FALLBACK_RESPONSE.to_string()
        },
    };

    CompletionResult {
        text,
        usage: parse_usage(&resp["usage"]),
    }
}

fn parse_usage(usage: &serde_json::Value) -> Usage {
    let count = |key: &str| {
        usage[key]
            .as_u64()
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
            .unwrap_or(0)
    };
    Usage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        total_tokens: count("total_tokens"),
    }
}

fn prompt_preview(prompt: &str) -> String {
    prompt.chars().take(PROMPT_PREVIEW_CHARS).collect()
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    fn id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &CompletionRequest) -> Result<CompletionResult> {
        debug!(
            model = %self.model,
            provider = %self.provider_name,
            prompt = %prompt_preview(request.prompt()),
            "sending prompt to completion provider"
        );

        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();

        let result = self.send(request).await;

        #[cfg(feature = "metrics")]
        {
            counter!(
                llm_metrics::COMPLETIONS_TOTAL,
                labels::PROVIDER => self.provider_name.clone(),
                labels::MODEL => self.model.clone()
            )
            .increment(1);
            histogram!(
                llm_metrics::COMPLETION_DURATION_SECONDS,
                labels::PROVIDER => self.provider_name.clone()
            )
            .record(start.elapsed().as_secs_f64());
            match &result {
                Ok(result) => {
                    counter!(llm_metrics::INPUT_TOKENS_TOTAL, labels::MODEL => self.model.clone())
                        .increment(u64::from(result.usage.prompt_tokens));
                    counter!(llm_metrics::OUTPUT_TOKENS_TOTAL, labels::MODEL => self.model.clone())
                        .increment(u64::from(result.usage.completion_tokens));
                },
                Err(e) => {
                    counter!(
                        llm_metrics::COMPLETION_ERRORS_TOTAL,
                        labels::PROVIDER => self.provider_name.clone(),
                        labels::ERROR_TYPE => e.kind()
                    )
                    .increment(1);
                },
            }
        }

        match &result {
            Ok(result) => debug!(
                prompt_tokens = result.usage.prompt_tokens,
                completion_tokens = result.usage.completion_tokens,
                total_tokens = result.usage.total_tokens,
                "received response from completion provider"
            ),
            Err(e) => warn!(error = %e, kind = e.kind(), "completion request failed"),
        }

        result
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, extract::Request, http::StatusCode, routing::post};

    use super::*;

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        authorization: Option<String>,
        body: serde_json::Value,
    }

    /// Start a mock `/chat/completions` server that records each request
    /// and answers with `status` and `payload`.
    async fn start_mock(
        status: StatusCode,
        payload: serde_json::Value,
    ) -> (String, Arc<Mutex<Vec<CapturedRequest>>>) {
        let captured: Arc<Mutex<Vec<CapturedRequest>>> = Arc::new(Mutex::new(Vec::new()));
        let captured_clone = Arc::clone(&captured);

        let app = Router::new().route(
            "/chat/completions",
            post(move |req: Request| {
                let cap = Arc::clone(&captured_clone);
                let payload = payload.clone();
                async move {
                    let authorization = req
                        .headers()
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let body_bytes = axum::body::to_bytes(req.into_body(), 1024 * 1024)
                        .await
                        .unwrap_or_default();
                    let body = serde_json::from_slice(&body_bytes).unwrap_or_default();
                    cap.lock().unwrap().push(CapturedRequest {
                        authorization,
                        body,
                    });
                    (status, axum::Json(payload))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), captured)
    }

    fn test_provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new(
            Secret::new("test-key".to_string()),
            DEFAULT_MODEL.to_string(),
            base_url.to_string(),
        )
    }

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest::new(prompt).unwrap()
    }

    #[tokio::test]
    async fn generate_returns_text_and_usage() {
        let (base_url, captured) = start_mock(
            StatusCode::OK,
            serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "4" } }],
                "usage": { "prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13 }
            }),
        )
        .await;

        let result = test_provider(&base_url)
            .generate(&request("what is 2+2"))
            .await
            .unwrap();

        assert_eq!(result.text, "4");
        assert_eq!(result.usage, Usage {
            prompt_tokens: 12,
            completion_tokens: 1,
            total_tokens: 13,
        });

        let requests = captured.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.authorization.as_deref(), Some("Bearer test-key"));
        assert_eq!(req.body["model"], DEFAULT_MODEL);
        assert_eq!(req.body["max_tokens"], MAX_RESPONSE_TOKENS);
        assert_eq!(req.body["temperature"], TEMPERATURE);
        assert_eq!(req.body["messages"][0]["role"], "system");
        assert_eq!(req.body["messages"][1]["role"], "user");
        assert_eq!(req.body["messages"][1]["content"], "what is 2+2");
    }

    #[tokio::test]
    async fn missing_content_uses_fallback_and_zero_usage() {
        let (base_url, _captured) = start_mock(
            StatusCode::OK,
            serde_json::json!({ "choices": [{ "message": { "role": "assistant", "content": null } }] }),
        )
        .await;

        let result = test_provider(&base_url)
            .generate(&request("hello"))
            .await
            .unwrap();

        assert_eq!(result.text, FALLBACK_RESPONSE);
        assert_eq!(result.usage, Usage::default());
    }

    #[tokio::test]
    async fn rate_limit_is_reported_as_provider_error() {
        let (base_url, _captured) = start_mock(
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({ "error": { "message": "slow down" } }),
        )
        .await;

        let err = test_provider(&base_url)
            .generate(&request("hello"))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(err.kind(), "rate_limited");
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn unauthorized_is_reported_as_auth_error() {
        let (base_url, captured) = start_mock(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": { "message": "bad key" } }),
        )
        .await;

        let err = test_provider(&base_url)
            .generate(&request("hello"))
            .await
            .unwrap_err();

        assert!(err.is_auth());
        // One request, no retry.
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unreachable_provider_is_http_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = test_provider(&format!("http://{addr}"))
            .generate(&request("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn empty_string_content_uses_fallback() {
        let result = parse_completion(&serde_json::json!({
            "choices": [{ "message": { "content": "" } }],
            "usage": { "prompt_tokens": 3 }
        }));
        assert_eq!(result.text, FALLBACK_RESPONSE);
        assert_eq!(result.usage.prompt_tokens, 3);
        assert_eq!(result.usage.total_tokens, 0);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = test_provider("http://localhost:1234/v1/");
        assert_eq!(provider.base_url, "http://localhost:1234/v1");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.id(), DEFAULT_MODEL);
    }

    #[test]
    fn prompt_preview_is_char_bounded() {
        let long = "é".repeat(300);
        assert_eq!(prompt_preview(&long).chars().count(), PROMPT_PREVIEW_CHARS);
    }
}
