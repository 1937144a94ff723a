//! Standardized logging configuration.
//!
//! Consistent log format for every host embedding the router core:
//! human-readable console output by default, JSON for log aggregation.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard tracing filter (e.g. `info`, `venue_router=debug`)
//! - `LOG_FORMAT`: `pretty` (default), `compact`, or `json`

use std::env;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable format (default for terminals)
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for machine parsing
    Json,
}

impl LogFormat {
    /// Parse format from string; unknown values fall back to pretty.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format
    pub format: LogFormat,
    /// Default log level filter when `RUST_LOG` is unset
    pub default_level: String,
    /// Include source file location
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            default_level: "info".to_string(),
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            include_location: env::var("LOG_LOCATION")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
        }
    }

    /// Set the default log level.
    pub fn with_default_level(mut self, level: impl Into<String>) -> Self {
        self.default_level = level.into();
        self
    }
}

/// Initialize logging with the given configuration.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_file(config.include_location)
                .with_line_number(config.include_location);
            registry.with(layer).try_init()?;
        }
        LogFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_file(config.include_location)
                .with_line_number(config.include_location);
            registry.with(layer).try_init()?;
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .with_file(config.include_location)
                .with_line_number(config.include_location);
            registry.with(layer).try_init()?;
        }
    }

    Ok(())
}
