//! # Daemon configuration.
//!
//! [`Config`] is loaded from a TOML file at startup. Four keys matter:
//! the bus URL, the scripts directory, the log level, and the host
//! identifier used for subject rewriting. A handful of tuning knobs carry
//! defaults and rarely need touching.
//!
//! Missing required keys are fatal; unknown keys are ignored. There is no
//! hot-reload: the file is read once.
//!
//! ```toml
//! bus_url = "nats://127.0.0.1:4222"
//! scripts_dir = "/srv/scripts"
//! log_level = "info"
//! host = "auto"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::RuntimeError;

/// Log levels the daemon accepts, mirroring the `tracing` hierarchy.
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Host identifier used to namespace subjects on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum HostId {
    /// Use the operating-system hostname.
    Auto,
    /// Use this identifier verbatim.
    Explicit(String),
}

impl Default for HostId {
    fn default() -> Self {
        HostId::Auto
    }
}

impl From<String> for HostId {
    fn from(raw: String) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "auto" {
            HostId::Auto
        } else {
            HostId::Explicit(trimmed.to_string())
        }
    }
}

/// Daemon configuration, deserialized from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bus endpoint URL, passed opaquely to the bus client.
    pub bus_url: String,
    /// Directory scanned and watched for `.sh` scripts.
    pub scripts_dir: PathBuf,
    /// Log level: one of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Host identifier for subject rewriting (`auto` = OS hostname).
    #[serde(default)]
    pub host: HostId,
    /// Deadline for one request invocation of a script, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Grace period for in-flight work during shutdown, in seconds.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl Config {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, RuntimeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RuntimeError::Config {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_toml(&raw)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self, RuntimeError> {
        let config: Config = toml::from_str(raw).map_err(|e| RuntimeError::Config {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks required keys and value ranges.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.bus_url.trim().is_empty() {
            return Err(RuntimeError::Config {
                reason: "bus_url is required".to_string(),
            });
        }
        if self.scripts_dir.as_os_str().is_empty() {
            return Err(RuntimeError::Config {
                reason: "scripts_dir is required".to_string(),
            });
        }
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(RuntimeError::Config {
                reason: format!(
                    "invalid log level '{}', must be one of: {}",
                    self.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(RuntimeError::Config {
                reason: "request_timeout_secs must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Deadline for one request invocation of a script.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Grace period for in-flight work during shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_full_config() {
        let cfg = Config::from_toml(
            r#"
            bus_url = "nats://127.0.0.1:4222"
            scripts_dir = "/srv/scripts"
            log_level = "debug"
            host = "web01"
            request_timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bus_url, "nats://127.0.0.1:4222");
        assert_eq!(cfg.scripts_dir, PathBuf::from("/srv/scripts"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.host, HostId::Explicit("web01".to_string()));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn applies_defaults_for_optional_keys() {
        let cfg = Config::from_toml(
            r#"
            bus_url = "nats://127.0.0.1:4222"
            scripts_dir = "/srv/scripts"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.host, HostId::Auto);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.shutdown_grace(), Duration::from_secs(10));
    }

    #[test]
    fn missing_required_key_is_fatal() {
        let err = Config::from_toml(r#"scripts_dir = "/srv/scripts""#).unwrap_err();
        assert_eq!(err.as_label(), "config_invalid");
    }

    #[test]
    fn empty_bus_url_is_rejected() {
        let err = Config::from_toml(
            r#"
            bus_url = "  "
            scripts_dir = "/srv/scripts"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bus_url"));
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let err = Config::from_toml(
            r#"
            bus_url = "nats://127.0.0.1:4222"
            scripts_dir = "/srv/scripts"
            log_level = "loud"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        Config::from_toml(
            r#"
            bus_url = "nats://127.0.0.1:4222"
            scripts_dir = "/srv/scripts"
            shiny = true
            "#,
        )
        .unwrap();
    }

    #[test]
    fn host_id_auto_tokens() {
        assert_eq!(HostId::from("auto".to_string()), HostId::Auto);
        assert_eq!(HostId::from("".to_string()), HostId::Auto);
        assert_eq!(
            HostId::from("web01".to_string()),
            HostId::Explicit("web01".to_string())
        );
    }
}
