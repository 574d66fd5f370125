//! Semantic validation of the effective configuration.
//!
//! Runs after file loading and env overrides; the binary refuses to start
//! when any diagnostic is an error.

use crate::{
    error::{Error, Result},
    schema::WagptConfig,
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "provider.api_key"
    pub path: &'static str,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Turn error diagnostics into [`Error::Invalid`].
    pub fn into_result(self) -> Result<Vec<Diagnostic>> {
        if !self.has_errors() {
            return Ok(self.diagnostics);
        }
        let message = self
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| format!("{}: {}", d.path, d.message))
            .collect::<Vec<_>>()
            .join("; ");
        Err(Error::Invalid(message))
    }

    fn push(&mut self, severity: Severity, path: &'static str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity,
            path,
            message: message.into(),
        });
    }
}

const KNOWN_ENVIRONMENTS: &[&str] = &["development", "production", "test", "staging"];

/// Check the effective configuration.
#[must_use]
pub fn validate(config: &WagptConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !config.provider.has_api_key() {
        result.push(
            Severity::Error,
            "provider.api_key",
            "OPENAI_API_KEY is required",
        );
    }

    if config.provider.model.trim().is_empty() {
        result.push(Severity::Error, "provider.model", "model must not be empty");
    }

    let base_url = config.provider.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        result.push(
            Severity::Error,
            "provider.base_url",
            format!("expected an http(s) URL, got {base_url:?}"),
        );
    }

    if config.whatsapp.account_id.trim().is_empty() {
        result.push(
            Severity::Error,
            "whatsapp.account_id",
            "account id must not be empty",
        );
    }

    if config.whatsapp.sidecar_port == config.server.port {
        result.push(
            Severity::Error,
            "whatsapp.sidecar_port",
            format!(
                "sidecar port {} collides with server.port",
                config.whatsapp.sidecar_port
            ),
        );
    }

    if config.dispatch.max_concurrent_requests == 0 {
        result.push(
            Severity::Warning,
            "dispatch.max_concurrent_requests",
            "0 leaves concurrent completion requests unbounded",
        );
    }

    if !KNOWN_ENVIRONMENTS
        .iter()
        .any(|env| config.environment.eq_ignore_ascii_case(env))
    {
        result.push(
            Severity::Info,
            "environment",
            format!(
                "unrecognized environment {:?}; treated as non-development",
                config.environment
            ),
        );
    }

    result
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use secrecy::Secret;

    use super::*;

    fn valid_config() -> WagptConfig {
        let mut cfg = WagptConfig::default();
        cfg.provider.api_key = Secret::new("sk-test".into());
        cfg
    }

    #[test]
    fn valid_config_passes() {
        let result = validate(&valid_config());
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert!(result.into_result().is_ok());
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let result = validate(&WagptConfig::default());
        assert!(result.has_errors());
        let err = result.into_result().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY is required"));
    }

    #[test]
    fn non_http_base_url_is_an_error() {
        let mut cfg = valid_config();
        cfg.provider.base_url = "api.openai.com".into();
        let result = validate(&cfg);
        assert_eq!(result.count(Severity::Error), 1);
        assert_eq!(result.diagnostics[0].path, "provider.base_url");
    }

    #[test]
    fn port_collision_is_an_error() {
        let mut cfg = valid_config();
        cfg.whatsapp.sidecar_port = cfg.server.port;
        assert!(validate(&cfg).has_errors());
    }

    #[test]
    fn unbounded_dispatch_is_a_warning() {
        let mut cfg = valid_config();
        cfg.dispatch.max_concurrent_requests = 0;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }
}
