//! Configuration loading for the Redfish event service.
//!
//! Layers built-in defaults, an optional TOML file and `RFEVENTS_*`
//! environment variables into [`rfevents_core::EventServiceConfig`].
//! Nested keys use a double underscore in the environment, e.g.
//! `RFEVENTS_DELIVERY__RETRY_ATTEMPTS=5`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use thiserror::Error;

use rfevents_core::EventServiceConfig;

pub const ENV_PREFIX: &str = "RFEVENTS_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Platform config file location (`~/.config/rfevents/config.toml` on Linux).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "rfevents", "rfevents").map_or_else(
        || PathBuf::from("rfevents.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// The layered figment: defaults, then `path` (or the platform file), then
/// the environment.
pub fn figment(path: Option<&Path>) -> Figment {
    let file = path.map_or_else(config_path, Path::to_path_buf);
    Figment::new()
        .merge(Serialized::defaults(EventServiceConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate the service configuration.
///
/// An explicitly given `path` must exist; the platform default may be
/// absent.
pub fn load_config(path: Option<&Path>) -> Result<EventServiceConfig, ConfigError> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("config file {} not found", path.display()),
            )));
        }
    }
    let config: EventServiceConfig = figment(path).extract()?;
    validate(&config)?;
    Ok(config)
}

/// Reject settings the service cannot run with.
pub fn validate(config: &EventServiceConfig) -> Result<(), ConfigError> {
    let scheme = config.plugin.scheme.as_str();
    if scheme != "https" && scheme != "http" {
        return Err(invalid("plugin.scheme", format!("expected http or https, got '{scheme}'")));
    }
    if config.plugin_status_polling.start_up_resource_batch_size == 0 {
        return Err(invalid(
            "plugin_status_polling.start_up_resource_batch_size",
            "must be at least 1",
        ));
    }
    if config.plugin_status_polling.max_retry_attempts == 0 {
        return Err(invalid(
            "plugin_status_polling.max_retry_attempts",
            "must be at least 1",
        ));
    }
    if config.subscription.max_concurrent_origins == 0 {
        return Err(invalid("subscription.max_concurrent_origins", "must be at least 1"));
    }
    if config.delivery.request_timeout_secs == 0 {
        return Err(invalid("delivery.request_timeout_secs", "must be at least 1"));
    }
    let translation = &config.url_translation;
    for (table, map) in [
        ("url_translation.north_bound", &translation.north_bound),
        ("url_translation.south_bound", &translation.south_bound),
    ] {
        if map.keys().any(String::is_empty) {
            return Err(invalid(table, "translation keys must not be empty"));
        }
    }
    Ok(())
}

// ── Rendering ───────────────────────────────────────────────────────

/// The effective configuration as TOML.
pub fn render_config(config: &EventServiceConfig) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(config)?)
}

/// Write `config` to `path`, creating parent directories.
pub fn save_config(config: &EventServiceConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_config(config)?)?;
    Ok(())
}
