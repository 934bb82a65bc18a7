//! Logging configuration module
//!
//! Console output goes to stderr so stdout only ever carries rendered
//! templates. An optional rotating JSON file layer records the same events.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "forge.log";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for JSON log files; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub rotation: LogRotation,
}

/// Log rotation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    Daily,
    Never,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            rotation: LogRotation::Daily,
        }
    }
}

impl LoggingConfig {
    /// Build the filter: `RUST_LOG` wins over the configured level
    pub fn env_filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.level),
        }
    }

    /// Install the global subscriber
    ///
    /// Keep the returned guard alive for the life of the process, otherwise
    /// buffered file output is lost.
    pub fn init(&self) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error + Send + Sync>> {
        let env_filter = self.env_filter()?;

        let console_layer = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr);

        if let Some(ref dir) = self.log_dir {
            let file_appender = match self.rotation {
                LogRotation::Hourly => rolling::hourly(dir, LOG_FILE_PREFIX),
                LogRotation::Daily => rolling::daily(dir, LOG_FILE_PREFIX),
                LogRotation::Never => rolling::never(dir, LOG_FILE_PREFIX),
            };
            let (writer, guard) = non_blocking(file_appender);

            let file_layer = fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()?;

            tracing::debug!(level = %self.level, dir = %dir.display(), "Logging initialized");
            Ok(Some(guard))
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init()?;

            tracing::debug!(level = %self.level, "Logging initialized");
            Ok(None)
        }
    }

    /// Console-only logging at `level`, e.g. from a `--verbose` flag
    pub fn console(level: &str) -> Self {
        Self {
            level: level.to_string(),
            ..Default::default()
        }
    }
}
