//! Application settings loaded from `config.toml`.
//!
//! The file is optional: every field has a default, and `DATABASE_URL` /
//! `GATEWAY_API_TOKEN` from the environment (or `.env`) override what the file says.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Default provider base URL used when the config file does not set one.
pub const DEFAULT_GATEWAY_BASE_URL: &str = "http://127.0.0.1:33201";
/// Default path of the provider's internal transfer endpoint.
pub const DEFAULT_TRANSFER_PATH: &str = "/api/accounts/transfer/internal";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Database settings
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Transfer gateway settings
    #[serde(default)]
    pub gateway: GatewaySettings,
}

/// `[database]` section
#[derive(Debug, Default, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// SeaORM connection URL
    pub url: Option<String>,
}

/// `[gateway]` section
#[derive(Debug, Deserialize, Clone)]
pub struct GatewaySettings {
    /// Scheme, host and port of the account provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the transfer endpoint, appended to `base_url`
    #[serde(default = "default_transfer_path")]
    pub transfer_path: String,
    /// Bearer token sent with every transfer request
    #[serde(default)]
    pub api_token: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            transfer_path: default_transfer_path(),
            api_token: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}

fn default_transfer_path() -> String {
    DEFAULT_TRANSFER_PATH.to_string()
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_config(&contents)
}

/// Parses settings from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads `path` if it exists, otherwise uses defaults, then applies
/// environment overrides.
pub fn load_app_configuration<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let mut config = if path.as_ref().exists() {
        load_config(path)?
    } else {
        tracing::info!(
            "No config file at {}, using defaults",
            path.as_ref().display()
        );
        AppConfig::default()
    };

    if let Some(token) = env_override("GATEWAY_API_TOKEN")? {
        config.gateway.api_token = Some(token);
    }
    Ok(config)
}

/// Reads an optional environment override. An unset variable is `None`; a set
/// but non-UTF-8 value is an error rather than being silently ignored.
///
/// # Errors
/// [`Error::EnvVar`] when the variable holds invalid unicode.
pub fn env_override(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [database]
            url = "sqlite::memory:"

            [gateway]
            base_url = "https://provider.example"
            transfer_path = "/transfer"
            api_token = "secret"
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.database.url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.gateway.base_url, "https://provider.example");
        assert_eq!(config.gateway.transfer_path, "/transfer");
        assert_eq!(config.gateway.api_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.database.url.is_none());
        assert_eq!(config.gateway.base_url, DEFAULT_GATEWAY_BASE_URL);
        assert_eq!(config.gateway.transfer_path, DEFAULT_TRANSFER_PATH);
        assert!(config.gateway.api_token.is_none());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let result = parse_config("[gateway\nbase_url = 1");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_unset_override_is_none() {
        let value = env_override("BATCH_TRANSFER_TEST_SURELY_UNSET_VARIABLE").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_invalid_unicode_override_maps_to_env_error() {
        let err: Error = std::env::VarError::NotUnicode("\u{fffd}".into()).into();
        assert!(matches!(err, Error::EnvVar(_)));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_app_configuration("definitely/not/here.toml").unwrap();
        assert!(config.database.url.is_none());
        assert_eq!(config.gateway.base_url, DEFAULT_GATEWAY_BASE_URL);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = load_config("definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
