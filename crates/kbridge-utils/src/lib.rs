//! # kbridge Utilities
//!
//! Shared logging and configuration for kbridge.
//!
//! This crate provides common functionality used across the kbridge workspace:
//! `tracing`-based logging setup and environment-driven client configuration.

pub mod config;
pub mod logging;

pub use config::{ClientConfig, ConfigError};
// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with_level, LogFormat, LogLevel, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
