// src/config/settings.rs
//! Core configuration settings.
//!
//! This module contains the command line arguments, the optional JSON
//! configuration file overlay, and the validated runtime configuration
//! consumed by [`crate::core::SecurityCore`].

use clap::{Parser, Subcommand};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::constants::{COOKIE_SECRET_ENV, COOKIE_SECRET_SIZE};
use crate::config::defaults;

/// Error type for configuration-related operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cookie secret: {0}")]
    InvalidSecret(#[from] hex::FromHexError),
}

/// Subcommands of the CLI
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print a fresh key-exchange parameter set as JSON
    Params,
    /// Register and log in a demo user through the sealed channel
    SelfCheck {
        /// Demo username
        #[arg(long, default_value = "alice")]
        username: String,

        /// Demo password
        #[arg(long, default_value = "secret1")]
        password: String,
    },
}

/// Command line arguments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "sealed-session",
    about = "Diffie-Hellman sealed credentials, signed-cookie sessions and CSRF tokens",
    version,
    author
)]
pub struct CoreArgs {
    /// Log level
    #[arg(long, default_value = defaults::DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Optional log file (daily rotation)
    #[arg(long)]
    pub log_file: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    pub config_file: Option<String>,

    /// Hex-encoded cookie signing secret (random per process when absent)
    #[arg(long, env = COOKIE_SECRET_ENV, hide_env_values = true)]
    pub cookie_secret: Option<String>,

    /// Key exchange lifetime in seconds
    #[arg(long, default_value_t = defaults::DEFAULT_EXCHANGE_TTL)]
    pub exchange_ttl_secs: u64,

    /// Sliding session lifetime in seconds
    #[arg(long, default_value_t = defaults::DEFAULT_SESSION_DURATION)]
    pub session_duration_secs: u64,

    /// CSRF token lifetime in seconds
    #[arg(long, default_value_t = defaults::DEFAULT_CSRF_TTL)]
    pub csrf_ttl_secs: u64,

    /// Interval between expiry sweeps in seconds
    #[arg(long, default_value_t = defaults::DEFAULT_SWEEP_INTERVAL)]
    pub sweep_interval_secs: u64,

    /// Maximum number of pending key exchanges
    #[arg(long, default_value_t = defaults::DEFAULT_MAX_PENDING_EXCHANGES)]
    pub max_pending_exchanges: usize,

    /// Accept credentials sent without a key exchange (protocol downgrade)
    #[arg(long)]
    pub allow_plaintext_credentials: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that may be supplied by the JSON configuration file.
/// Absent fields keep the command line value.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub log_level: Option<String>,
    pub cookie_secret: Option<String>,
    pub exchange_ttl_secs: Option<u64>,
    pub session_duration_secs: Option<u64>,
    pub csrf_ttl_secs: Option<u64>,
    pub sweep_interval_secs: Option<u64>,
    pub max_pending_exchanges: Option<usize>,
    pub allow_plaintext_credentials: Option<bool>,
}

impl FileConfig {
    /// Load a configuration overlay from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Validated runtime configuration
#[derive(Clone)]
pub struct CoreConfig {
    pub log_level: String,
    /// HMAC key for the session cookie
    pub cookie_secret: Vec<u8>,
    pub exchange_ttl: Duration,
    pub session_duration: Duration,
    pub csrf_ttl: Duration,
    pub sweep_interval: Duration,
    pub max_pending_exchanges: usize,
    pub allow_plaintext_credentials: bool,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("log_level", &self.log_level)
            .field("cookie_secret", &"<redacted>")
            .field("exchange_ttl", &self.exchange_ttl)
            .field("session_duration", &self.session_duration)
            .field("csrf_ttl", &self.csrf_ttl)
            .field("sweep_interval", &self.sweep_interval)
            .field("max_pending_exchanges", &self.max_pending_exchanges)
            .field("allow_plaintext_credentials", &self.allow_plaintext_credentials)
            .finish()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            cookie_secret: generate_cookie_secret(),
            exchange_ttl: Duration::from_secs(defaults::DEFAULT_EXCHANGE_TTL),
            session_duration: Duration::from_secs(defaults::DEFAULT_SESSION_DURATION),
            csrf_ttl: Duration::from_secs(defaults::DEFAULT_CSRF_TTL),
            sweep_interval: Duration::from_secs(defaults::DEFAULT_SWEEP_INTERVAL),
            max_pending_exchanges: defaults::DEFAULT_MAX_PENDING_EXCHANGES,
            allow_plaintext_credentials: defaults::DEFAULT_ALLOW_PLAINTEXT_CREDENTIALS,
        }
    }
}

impl CoreConfig {
    /// Create a configuration from command line arguments, applying the
    /// configuration file on top when one is given
    pub fn from_args(args: &CoreArgs) -> Result<Self, ConfigError> {
        let file = match &args.config_file {
            Some(path) => {
                info!("Loading configuration file {}", path);
                FileConfig::load(path)?
            }
            None => FileConfig::default(),
        };

        let secret_hex = file.cookie_secret.clone().or_else(|| args.cookie_secret.clone());
        let cookie_secret = match secret_hex {
            Some(hex_secret) => hex::decode(hex_secret.trim())?,
            None => {
                warn!("No cookie secret configured; generated a process-local secret");
                generate_cookie_secret()
            }
        };

        let config = Self {
            log_level: file.log_level.unwrap_or_else(|| args.log_level.clone()),
            cookie_secret,
            exchange_ttl: Duration::from_secs(file.exchange_ttl_secs.unwrap_or(args.exchange_ttl_secs)),
            session_duration: Duration::from_secs(
                file.session_duration_secs.unwrap_or(args.session_duration_secs),
            ),
            csrf_ttl: Duration::from_secs(file.csrf_ttl_secs.unwrap_or(args.csrf_ttl_secs)),
            sweep_interval: Duration::from_secs(
                file.sweep_interval_secs.unwrap_or(args.sweep_interval_secs),
            ),
            max_pending_exchanges: file.max_pending_exchanges.unwrap_or(args.max_pending_exchanges),
            allow_plaintext_credentials: file
                .allow_plaintext_credentials
                .unwrap_or(args.allow_plaintext_credentials),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cookie_secret.len() < COOKIE_SECRET_SIZE {
            return Err(ConfigError::Invalid(format!(
                "Cookie secret must be at least {} bytes",
                COOKIE_SECRET_SIZE
            )));
        }

        for (name, value) in [
            ("exchange_ttl", self.exchange_ttl),
            ("session_duration", self.session_duration),
            ("csrf_ttl", self.csrf_ttl),
            ("sweep_interval", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
            }
        }

        if self.max_pending_exchanges == 0 {
            return Err(ConfigError::Invalid(
                "max_pending_exchanges must be greater than zero".to_string(),
            ));
        }

        if self.allow_plaintext_credentials {
            warn!("Plain credentials without key exchange are accepted (downgrade enabled)");
        }

        Ok(())
    }
}

/// Fresh random cookie-signing secret
pub fn generate_cookie_secret() -> Vec<u8> {
    let mut secret = vec![0u8; COOKIE_SECRET_SIZE];
    OsRng.fill_bytes(&mut secret);
    secret
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args(extra: &[&str]) -> CoreArgs {
        let mut argv = vec!["sealed-session"];
        argv.extend_from_slice(extra);
        argv.push("params");
        CoreArgs::parse_from(argv)
    }

    #[test]
    fn test_defaults_from_args() {
        let config = CoreConfig::from_args(&args(&[])).unwrap();

        assert_eq!(config.exchange_ttl, Duration::from_secs(300));
        assert_eq!(config.session_duration, Duration::from_secs(1800));
        assert_eq!(config.csrf_ttl, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(300));
        assert_eq!(config.cookie_secret.len(), COOKIE_SECRET_SIZE);
        assert!(!config.allow_plaintext_credentials);
    }

    #[test]
    fn test_cookie_secret_from_args() {
        let secret = "ab".repeat(32);
        let config = CoreConfig::from_args(&args(&["--cookie-secret", &secret])).unwrap();
        assert_eq!(config.cookie_secret, vec![0xab; 32]);
    }

    #[test]
    fn test_short_cookie_secret_rejected() {
        let result = CoreConfig::from_args(&args(&["--cookie-secret", "abcd"]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_hex_cookie_secret_rejected() {
        let result = CoreConfig::from_args(&args(&["--cookie-secret", "not-hex"]));
        assert!(matches!(result, Err(ConfigError::InvalidSecret(_))));
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let result = CoreConfig::from_args(&args(&["--session-duration-secs", "0"]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_file_overrides_args() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"session_duration_secs": 60, "allow_plaintext_credentials": true}}"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = CoreConfig::from_args(&args(&["--config-file", &path])).unwrap();

        assert_eq!(config.session_duration, Duration::from_secs(60));
        assert!(config.allow_plaintext_credentials);
        // Untouched settings keep the argument value
        assert_eq!(config.csrf_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_unknown_file_field_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"listen": "0.0.0.0:8443"}}"#).unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let result = CoreConfig::from_args(&args(&["--config-file", &path]));
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = CoreConfig::default();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&format!("{:?}", config.cookie_secret)));
    }
}
