//! # Logging Utilities
//!
//! Logging infrastructure for kbridge using `tracing`.
//!
//! This module provides structured logging with support for:
//! - Pretty output for interactive use and JSON for collection
//! - Level filtering through `RUST_LOG` or an explicit level
//! - Optional file output next to the console
//!
//! Console output goes to stderr so that command output on stdout stays
//! clean.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kbridge_utils::init_logging;
//!
//! // Keep the guard alive for as long as logs should be flushed to file
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("client started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Filter directives (e.g., `RUST_LOG=debug`, `RUST_LOG=kbridge_core=trace`)
//! - `KBRIDGE_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `KBRIDGE_LOG_FILE`: Optional log file. A directory gets a dated file
//!   inside it; any other path is rotated daily.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io};

use chrono::{NaiveDate, Utc};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format
pub const LOG_FORMAT_VAR: &str = "KBRIDGE_LOG_FORMAT";

/// Environment variable naming the log file or directory
pub const LOG_FILE_VAR: &str = "KBRIDGE_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "development" => Ok(LogFormat::Pretty),
            "json" | "prod" | "production" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level, includes failed device calls
    Debug,
    /// Trace level, includes every device call
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the background file writer alive
///
/// Buffered file output is flushed when this is dropped. Console-only
/// logging holds nothing.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard
{
    _file: Option<WorkerGuard>,
}

/// Initialize logging from the environment
///
/// Reads `KBRIDGE_LOG_FORMAT`, `KBRIDGE_LOG_FILE` and `RUST_LOG`. Without
/// `RUST_LOG` the level is `info`.
///
/// ## Errors
///
/// Returns an error if:
/// - `KBRIDGE_LOG_FORMAT` holds an unknown format
/// - The log file cannot be created
/// - A global subscriber is already installed
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(LOG_FORMAT_VAR) {
        Ok(value) => value.parse()?,
        Err(_) => LogFormat::default(),
    };
    init_logging_internal(format, None)
}

/// Initialize logging with an explicit level and format
///
/// The explicit level wins over `RUST_LOG`. `KBRIDGE_LOG_FILE` is still
/// honored.
///
/// ## Example
///
/// ```rust,no_run
/// use kbridge_utils::{LogFormat, LogLevel, init_logging_with_level};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)
///     .expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or file logging fails.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    init_logging_internal(format, Some(level.into()))
}

fn build_filter(explicit_level: Option<Level>) -> EnvFilter
{
    // Priority:
    // 1. Explicit level (from --log-level or KBRIDGE_LOG_LEVEL)
    // 2. RUST_LOG, which allows per-module directives
    // 3. INFO
    match explicit_level {
        Some(level) => EnvFilter::new(level.to_string()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
    }
}

fn init_logging_internal(format: LogFormat, explicit_level: Option<Level>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers = vec![console_layer(format, build_filter(explicit_level))];

    let guard = match env::var_os(LOG_FILE_VAR) {
        Some(path) => {
            let (layer, guard) = file_layer(format, build_filter(explicit_level), Path::new(&path))?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(io::stderr)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, filter: EnvFilter, requested: &Path) -> Result<(BoxedLayer, WorkerGuard), LoggingError>
{
    let target = LogFileTarget::resolve(requested, Utc::now().date_naive())?;
    fs::create_dir_all(&target.directory)?;

    let appender = if target.rotate_daily {
        tracing_appender::rolling::daily(&target.directory, &target.file_name)
    } else {
        // Name already carries the date
        tracing_appender::rolling::never(&target.directory, &target.file_name)
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = match format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_ansi(false) // No ANSI in files
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    };
    Ok((layer, guard))
}

/// Where file logs go
#[derive(Debug, Clone, PartialEq, Eq)]
struct LogFileTarget
{
    directory: PathBuf,
    file_name: String,
    rotate_daily: bool,
}

impl LogFileTarget
{
    /// Directories (existing, or spelled with a trailing separator) get a
    /// `YYYY-MM-DD-kbridge.log` file; file paths rotate daily under their
    /// own name.
    fn resolve(requested: &Path, today: NaiveDate) -> Result<Self, LoggingError>
    {
        let spelled_as_dir = requested
            .as_os_str()
            .to_string_lossy()
            .ends_with(std::path::MAIN_SEPARATOR);
        if spelled_as_dir || requested.is_dir() {
            return Ok(Self {
                directory: requested.to_path_buf(),
                file_name: format!("{}-kbridge.log", today.format("%Y-%m-%d")),
                rotate_daily: false,
            });
        }

        let file_name = requested
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| LoggingError::InvalidPath(requested.display().to_string()))?;
        let directory = match requested.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Ok(Self {
            directory,
            file_name,
            rotate_daily: true,
        })
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Log file path has no usable file name
    #[error("Invalid log file path: {0}")]
    InvalidPath(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
