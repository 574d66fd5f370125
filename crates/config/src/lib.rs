//! Configuration loading, environment overrides and validation.
//!
//! Config files: `wagpt.toml`, `wagpt.yaml` or `wagpt.json`, searched in
//! `./` then the user config directory (`~/.config/wagpt/` on Linux).
//! Environment variables (`PORT`, `OPENAI_API_KEY`, ...) override file
//! values; see [`loader::ENV_OVERRIDES`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover, load, load_config},
    schema::{
        DispatchConfig, MetricsConfig, ProviderConfig, ServerConfig, WagptConfig, WhatsAppConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
