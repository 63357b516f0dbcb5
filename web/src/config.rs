//! Configuration management for the booking server.
//!
//! Loads configuration from environment variables with sensible defaults.

use fieldserve_core::registry::default_roster;
use fieldserve_core::retry::{DEFAULT_RETRY_CEILING, RetryPolicy};
use fieldserve_core::types::{Capabilities, Provider, ProviderId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Booking rules and seed data
    pub booking: BookingConfig,
    /// Whether to install the Prometheus recorder and serve `/metrics`
    pub metrics_enabled: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Path prefix for the booking API
    pub api_prefix: String,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

/// Booking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfig {
    /// Misses and rejections allowed before a booking fails
    pub retry_ceiling: u32,
    /// Whether `retry` zeroes the counter
    pub reset_retries_on_revive: bool,
    /// JSON file with the provider roster; the built-in roster when unset
    pub providers_file: Option<PathBuf>,
}

/// Failure to load the provider roster
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The roster file could not be read
    #[error("failed to read provider roster {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The roster file is not valid JSON of the expected shape
    #[error("failed to parse provider roster {path}: {source}")]
    Parse {
        /// File that was parsed
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },
}

/// One entry of a provider roster file.
///
/// ```json
/// { "id": "p1", "name": "Ramesh Kumar", "serviceTypes": ["plumbing"], "rating": 4.8 }
/// ```
///
/// An empty or missing `serviceTypes` means the provider takes any job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSeed {
    /// Provider id
    pub id: String,
    /// Display name
    pub name: String,
    /// Services offered
    #[serde(default)]
    pub service_types: Vec<String>,
    /// Contact number
    #[serde(default)]
    pub phone: Option<String>,
    /// Average rating
    #[serde(default)]
    pub rating: Option<f32>,
}

impl From<ProviderSeed> for Provider {
    fn from(seed: ProviderSeed) -> Self {
        let mut provider = Self::new(
            ProviderId::new(seed.id),
            seed.name,
            Capabilities::restricted(seed.service_types),
        );
        if let Some(phone) = seed.phone {
            provider = provider.with_phone(phone);
        }
        if let Some(rating) = seed.rating {
            provider = provider.with_rating(rating);
        }
        provider
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` instead of the process environment.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_var(&lookup, "PORT").unwrap_or(4000),
                api_prefix: lookup("API_PREFIX")
                    .map(|prefix| normalize_prefix(&prefix))
                    .unwrap_or_else(|| "/api".to_string()),
                log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            },
            booking: BookingConfig {
                retry_ceiling: parse_var(&lookup, "RETRY_CEILING")
                    .unwrap_or(DEFAULT_RETRY_CEILING),
                reset_retries_on_revive: parse_var(&lookup, "RESET_RETRIES_ON_REVIVE")
                    .unwrap_or(false),
                providers_file: lookup("PROVIDERS_FILE")
                    .filter(|path| !path.trim().is_empty())
                    .map(PathBuf::from),
            },
            metrics_enabled: parse_var(&lookup, "METRICS_ENABLED").unwrap_or(true),
        }
    }

    /// Retry policy built from the booking section
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .ceiling(self.booking.retry_ceiling)
            .reset_on_revive(self.booking.reset_retries_on_revive)
            .build()
    }

    /// Address to bind, as `host:port`
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// The provider roster: from `PROVIDERS_FILE` if set, built-in otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_roster(&self) -> Result<Vec<Provider>, ConfigError> {
        match &self.booking.providers_file {
            Some(path) => read_roster(path),
            None => Ok(default_roster()),
        }
    }
}

/// `None` when `key` is unset or does not parse as `T`.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

fn read_roster(path: &Path) -> Result<Vec<Provider>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let seeds: Vec<ProviderSeed> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(seeds.into_iter().map(Provider::from).collect())
}

/// `api`, `/api/` and `/api` all become `/api`; an empty prefix stays empty.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.bind_address(), "0.0.0.0:4000");
        assert_eq!(config.server.api_prefix, "/api");
        assert_eq!(config.booking.retry_ceiling, 3);
        assert!(!config.booking.reset_retries_on_revive);
        assert!(config.metrics_enabled);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.load_roster().unwrap().len(), 3);
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = config(&[
            ("PORT", "not-a-port"),
            ("API_PREFIX", "v2/"),
            ("RETRY_CEILING", "5"),
            ("RESET_RETRIES_ON_REVIVE", "true"),
            ("METRICS_ENABLED", "false"),
        ]);
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.api_prefix, "/v2");
        assert_eq!(config.retry_policy().ceiling, 5);
        assert!(config.retry_policy().reset_on_revive);
        assert!(!config.metrics_enabled);
    }

    #[test]
    fn test_each_variable_parses_to_its_own_type() {
        let config = config(&[
            ("PORT", " 8080 "),
            ("RETRY_CEILING", "7"),
            ("RESET_RETRIES_ON_REVIVE", "true"),
            ("METRICS_ENABLED", "nope"),
        ]);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.booking.retry_ceiling, 7);
        assert!(config.booking.reset_retries_on_revive);
        assert!(config.metrics_enabled);
    }

    #[test]
    fn test_missing_roster_file_is_an_error() {
        let config = config(&[("PROVIDERS_FILE", "/definitely/not/here.json")]);
        assert!(matches!(config.load_roster(), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_seed_without_services_is_unrestricted() {
        let seeds: Vec<ProviderSeed> =
            serde_json::from_str(r#"[{"id": "p9", "name": "Any Job", "rating": 4.1}]"#).unwrap();
        let provider = Provider::from(seeds[0].clone());
        assert_eq!(provider.capabilities, Capabilities::Unrestricted);
        assert!(provider.available);
    }
}
