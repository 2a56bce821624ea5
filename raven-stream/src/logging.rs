//! Logging setup for applications built on the gateway crates
//!
//! The library itself only emits `tracing` events. Applications that do not
//! install their own subscriber can call [`init_logging`] once at startup.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with source locations
    Debug,
    /// One JSON object per line, for log collectors
    Json,
}

impl LoggingMode {
    /// Parse a `RAVEN_LOG_MODE` value; unknown values map to `Silent`
    pub fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => LoggingMode::Development,
            "debug" => LoggingMode::Debug,
            "json" => LoggingMode::Json,
            _ => LoggingMode::Silent,
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },
}

/// Initialize logging with the specified mode
///
/// # Environment Variables
///
/// - `RAVEN_LOG_LEVEL`: filter directive, e.g. `raven_stream=trace`
/// - `RUST_LOG`: used when `RAVEN_LOG_LEVEL` is unset
///
/// ```rust,ignore
/// raven_stream::logging::init_logging(LoggingMode::Development)?;
/// ```
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;
            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;
            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter("info")?;
            Registry::default()
                .with(fmt::layer().json().with_current_span(false))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `RAVEN_LOG_MODE` (`silent`, `development`,
/// `debug` or `json`), defaulting to silent
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var("RAVEN_LOG_MODE")
        .map(|value| LoggingMode::from_env_value(&value))
        .unwrap_or(LoggingMode::Silent);
    init_logging(mode)
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("RAVEN_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives.clone(),
        message: e.to_string(),
    })
}

/// Whether a global subscriber has already been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[test]
    fn test_mode_from_env_value() {
        assert_eq!(LoggingMode::from_env_value("debug"), LoggingMode::Debug);
        assert_eq!(LoggingMode::from_env_value(" JSON "), LoggingMode::Json);
        assert_eq!(LoggingMode::from_env_value("dev"), LoggingMode::Development);
        assert_eq!(LoggingMode::from_env_value("loud"), LoggingMode::Silent);
    }

    #[test]
    fn test_logging_error_display() {
        let error = LoggingError::InvalidFilter {
            filter: "[".to_string(),
            message: "bad".to_string(),
        };
        assert_eq!(error.to_string(), "Invalid log filter '[': bad");
    }
}
