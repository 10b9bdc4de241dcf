//! # Client Configuration
//!
//! Settings read from the environment.
//!
//! | variable             | meaning                         | default        |
//! |----------------------|---------------------------------|----------------|
//! | `KBRIDGE_DEVICE`     | device path to open             | `\\.\kbridge`  |
//! | `KBRIDGE_KEY`        | session obfuscation key         | none           |
//! | `KBRIDGE_LOG_FORMAT` | `pretty` or `json`              | `pretty`       |
//! | `KBRIDGE_LOG_LEVEL`  | `error` .. `trace`              | from `RUST_LOG`|
//!
//! A variable that is set but invalid is an error. Only unset variables fall
//! back to their defaults.

use std::env;

use kbridge_core::ObfuscationKey;

use crate::logging::{LogFormat, LogLevel, LOG_FORMAT_VAR};

pub const DEVICE_VAR: &str = "KBRIDGE_DEVICE";
pub const KEY_VAR: &str = "KBRIDGE_KEY";
pub const LOG_LEVEL_VAR: &str = "KBRIDGE_LOG_LEVEL";

/// Device path used when `KBRIDGE_DEVICE` is unset
pub const DEFAULT_DEVICE: &str = r"\\.\kbridge";

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError
{
    /// A variable is set to something unusable
    #[error("Invalid value for {var}: {reason}")]
    Invalid
    {
        /// Variable name
        var: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// No key was configured and none was given on the command line
    #[error("No obfuscation key configured; set KBRIDGE_KEY or pass --key")]
    MissingKey,
}

/// Settings for one client session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig
{
    pub device: String,
    pub key: Option<ObfuscationKey>,
    pub log_format: LogFormat,
    /// Explicit level; `None` defers to `RUST_LOG`
    pub log_level: Option<LogLevel>,
}

impl Default for ClientConfig
{
    fn default() -> Self
    {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            key: None,
            log_format: LogFormat::default(),
            log_level: None,
        }
    }
}

impl ClientConfig
{
    /// Read the configuration from the process environment.
    ///
    /// ## Errors
    ///
    /// `ConfigError::Invalid` for the first variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError>
    {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Read the configuration through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError>
    {
        let mut config = Self::default();

        if let Some(device) = lookup(DEVICE_VAR) {
            if device.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    var: DEVICE_VAR,
                    reason: "empty device path".to_string(),
                });
            }
            config.device = device;
        }
        if let Some(key) = lookup(KEY_VAR) {
            let parsed = key.parse::<ObfuscationKey>().map_err(|err| invalid(KEY_VAR, err))?;
            config.key = Some(parsed);
        }
        if let Some(format) = lookup(LOG_FORMAT_VAR) {
            config.log_format = format.parse().map_err(|err| invalid(LOG_FORMAT_VAR, err))?;
        }
        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            config.log_level = Some(level.parse().map_err(|err| invalid(LOG_LEVEL_VAR, err))?);
        }

        Ok(config)
    }

    /// The configured key.
    ///
    /// ## Errors
    ///
    /// `ConfigError::MissingKey` if none was set.
    pub fn require_key(&self) -> Result<ObfuscationKey, ConfigError>
    {
        self.key.ok_or(ConfigError::MissingKey)
    }
}

fn invalid(var: &'static str, err: impl std::fmt::Display) -> ConfigError
{
    ConfigError::Invalid {
        var,
        reason: err.to_string(),
    }
}
