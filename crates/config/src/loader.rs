use std::path::{Path, PathBuf};

use {secrecy::Secret, tracing::debug};

use crate::{
    error::{Error, Result},
    schema::WagptConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["wagpt.toml", "wagpt.yaml", "wagpt.yml", "wagpt.json"];

/// Environment variables that override file values.
pub const ENV_OVERRIDES: &[&str] = &[
    "PORT",
    "WAGPT_ENV",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "OPENAI_BASE_URL",
    "WHATSAPP_SESSION_DATA_PATH",
    "WAGPT_WHATSAPP_SIDECAR_DIR",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<WagptConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&raw, path)
}

/// Find the config file in standard locations, if any.
///
/// Search order:
/// 1. `<base>/wagpt.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/wagpt.{toml,yaml,yml,json}`
pub fn discover(base: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| base.join(name))
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Build the effective process configuration: file (explicit or
/// discovered), then environment overrides, then path resolution.
///
/// A config file that exists but cannot be read or parsed is an error,
/// whether it was named explicitly or discovered. Defaults are only used
/// when there is no file at all.
pub fn load(explicit: Option<&Path>) -> Result<WagptConfig> {
    let base = std::env::current_dir().unwrap_or_default();
    load_from(explicit, &base, |name| std::env::var(name).ok())
}

fn load_from(
    explicit: Option<&Path>,
    base: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<WagptConfig> {
    let path = explicit.map(Path::to_path_buf).or_else(|| discover(base));
    let mut config = match path {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?
        },
        None => {
            debug!("no config file found, using defaults");
            WagptConfig::default()
        },
    };
    apply_env_overrides_with(&mut config, lookup)?;
    resolve_paths(&mut config, base);
    Ok(config)
}

/// Returns the user-global config directory (`~/.config/wagpt/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "wagpt").map(|d| d.config_dir().to_path_buf())
}

/// Apply `PORT`, `OPENAI_API_KEY` and the other [`ENV_OVERRIDES`].
pub fn apply_env_overrides(config: &mut WagptConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Same as [`apply_env_overrides`] with a custom lookup, so tests do not
/// have to mutate the process environment.
fn apply_env_overrides_with(
    config: &mut WagptConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(port) = get("PORT") {
        config.server.port = port.trim().parse().map_err(|_| Error::InvalidEnv {
            name: "PORT",
            value: port.clone(),
        })?;
    }
    if let Some(env) = get("WAGPT_ENV") {
        config.environment = env;
    }
    if let Some(key) = get("OPENAI_API_KEY") {
        config.provider.api_key = Secret::new(key);
    }
    if let Some(model) = get("OPENAI_MODEL") {
        config.provider.model = model;
    }
    if let Some(base_url) = get("OPENAI_BASE_URL") {
        config.provider.base_url = base_url;
    }
    if let Some(path) = get("WHATSAPP_SESSION_DATA_PATH") {
        config.whatsapp.session_data_path = PathBuf::from(path);
    }
    if let Some(dir) = get("WAGPT_WHATSAPP_SIDECAR_DIR") {
        config.whatsapp.sidecar_dir = Some(PathBuf::from(dir));
    }
    Ok(())
}

/// Make relative filesystem paths absolute against `base`.
fn resolve_paths(config: &mut WagptConfig, base: &Path) {
    let session = &mut config.whatsapp.session_data_path;
    if session.is_relative() {
        *session = base.join(&*session);
    }
    if let Some(dir) = config.whatsapp.sidecar_dir.as_mut()
        && dir.is_relative()
    {
        *dir = base.join(&*dir);
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<WagptConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| Error::parse(path, e)),
        "json" => serde_json::from_str(raw).map_err(|e| Error::parse(path, e)),
        _ => Err(Error::UnsupportedFormat(ext.to_string())),
    }
}
