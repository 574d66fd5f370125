//! Config schema types.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ENVIRONMENT: &str = "development";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Hidden directory, relative to the working directory, holding WhatsApp
/// login credentials between runs.
pub const DEFAULT_SESSION_DATA_DIR: &str = ".wwebjs_auth";
pub const DEFAULT_SIDECAR_PORT: u16 = 3100;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 32;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WagptConfig {
    /// Environment name ("development", "production", ...).
    pub environment: String,
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub whatsapp: WhatsAppConfig,
    pub dispatch: DispatchConfig,
    pub metrics: MetricsConfig,
}

impl Default for WagptConfig {
    fn default() -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.into(),
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            whatsapp: WhatsAppConfig::default(),
            dispatch: DispatchConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl WagptConfig {
    #[must_use]
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEFAULT_ENVIRONMENT)
    }
}

/// Health/metrics HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: DEFAULT_PORT,
        }
    }
}

/// Completion provider (OpenAI-compatible API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Required. Usually supplied through `OPENAI_API_KEY`.
    #[serde(serialize_with = "serialize_redacted")]
    pub api_key: Secret<String>,
    pub model: String,
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
        }
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }
}

fn serialize_redacted<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    if secret.expose_secret().is_empty() {
        serializer.serialize_str("")
    } else {
        serializer.serialize_str("[REDACTED]")
    }
}

/// WhatsApp Web session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Account identifier passed to the sidecar.
    pub account_id: String,
    /// Where login credentials are persisted. Relative paths resolve against
    /// the working directory.
    pub session_data_path: PathBuf,
    /// Local port of the sidecar WebSocket server.
    pub sidecar_port: u16,
    /// Directory holding the sidecar package; searched for when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidecar_dir: Option<PathBuf>,
    /// Spawn and supervise the sidecar process. Disable to run it by hand.
    pub auto_start_sidecar: bool,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            account_id: "default".into(),
            session_data_path: PathBuf::from(DEFAULT_SESSION_DATA_DIR),
            sidecar_port: DEFAULT_SIDECAR_PORT,
            sidecar_dir: None,
            auto_start_sidecar: true,
        }
    }
}

/// Inbound dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Ceiling on dispatches running at once. `0` means unbounded.
    pub max_concurrent_requests: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
