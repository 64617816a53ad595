//! Configuration for the retention service.
//!
//! The service is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax. Every section is
//! optional; an empty file yields a service with retention disabled.
//!
//! # Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9000
//!
//! [datastore]
//! path = "${MAIL_ROOT}/spool"
//! retention_minutes = 1440
//! retention_sleep_ms = 50
//!
//! [observability.logging]
//! level = "info"
//! format = "json"
//! ```

mod datastore;
mod observability;
mod server;

use std::{path::Path, sync::LazyLock};

pub use datastore::*;
pub use observability::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
pub use server::*;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// HTTP server for the stats and status endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Mail store location and retention settings.
    #[serde(default)]
    pub datastore: DataStoreConfig,

    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: AppConfig = toml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.datastore.retention_enabled() && self.datastore.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "datastore.path must be set when retention is enabled".into(),
            ));
        }

        if self.observability.metrics.enabled
            && self
                .observability
                .metrics
                .pass_duration_buckets_secs
                .windows(2)
                .any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::Validation(
                "observability.metrics.pass_duration_buckets_secs must be strictly increasing"
                    .into(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Expand `${VAR_NAME}` references line by line.
/// References after a `#` on the same line are left as-is.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut expanded = Vec::new();

    for line in input.split('\n') {
        let comment_start = line.find('#').unwrap_or(line.len());
        let mut out = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in ENV_VAR_PATTERN.captures_iter(line) {
            let Some(whole) = cap.get(0) else { continue };
            if whole.start() >= comment_start {
                break;
            }

            let name = &cap[1];
            let value =
                std::env::var(name).map_err(|_| ConfigError::EnvVarNotFound(name.to_string()))?;

            out.push_str(&line[last_end..whole.start()]);
            out.push_str(&value);
            last_end = whole.end();
        }

        out.push_str(&line[last_end..]);
        expanded.push(out);
    }

    Ok(expanded.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_str("").unwrap();
        assert!(!config.datastore.retention_enabled());
        assert_eq!(config.server.port, 9000);
        assert!(config.observability.metrics.enabled);
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9200

            [datastore]
            path = "/srv/mail"
            retention_minutes = 60
            retention_sleep_ms = 5

            [observability.logging]
            level = "warn"
        "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9200);
        assert_eq!(config.datastore.retention_minutes, 60);
        assert_eq!(config.datastore.retention_sleep_ms, 5);
        assert_eq!(config.observability.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_unknown_section_rejected() {
        let err = AppConfig::from_str("[smtp]\nport = 25\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_var_expansion() {
        temp_env::with_var("MAILSWEEP_TEST_ROOT", Some("/data/mail"), || {
            let config = AppConfig::from_str(
                r#"
                [datastore]
                path = "${MAILSWEEP_TEST_ROOT}"
            "#,
            )
            .unwrap();
            assert_eq!(config.datastore.path, std::path::PathBuf::from("/data/mail"));
        });
    }

    #[test]
    fn test_missing_env_var() {
        temp_env::with_var_unset("MAILSWEEP_TEST_MISSING", || {
            let err = expand_env_vars("path = \"${MAILSWEEP_TEST_MISSING}\"").unwrap_err();
            assert!(matches!(err, ConfigError::EnvVarNotFound(name) if name == "MAILSWEEP_TEST_MISSING"));
        });
    }

    #[test]
    fn test_env_var_in_comment_ignored() {
        let result = expand_env_vars("# path = \"${NONEXISTENT_VAR}\"").unwrap();
        assert_eq!(result, "# path = \"${NONEXISTENT_VAR}\"");

        let result = expand_env_vars("port = 1 # ${NONEXISTENT_VAR}\n").unwrap();
        assert_eq!(result, "port = 1 # ${NONEXISTENT_VAR}\n");
    }

    #[test]
    fn test_empty_path_with_retention_rejected() {
        let err = AppConfig::from_str(
            r#"
            [datastore]
            path = ""
            retention_minutes = 10
        "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_, _)));
    }
}
