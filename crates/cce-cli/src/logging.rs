//! Tracing-subscriber initialization, layered from CLI flags.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::Cli;
use crate::error::{Error, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty-printed, multi-line format.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
    /// Single-line, minimal format.
    Compact,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(Error::configuration(format!(
                "unknown log format '{other}': expected pretty, json, or compact"
            ))),
        }
    }
}

/// Resolved logging configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive passed to `EnvFilter`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Log file path. `None` means stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Build the logging configuration from parsed CLI flags.
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            level: cli.log_level.clone(),
            format: cli.log_format.parse().unwrap_or_default(),
            file: cli.log_file.clone(),
        }
    }

    /// Install the global tracing subscriber. Must be called at most
    /// once per process.
    pub fn init(&self) -> Result<()> {
        let filter = EnvFilter::try_new(&self.level)
            .map_err(|e| Error::configuration(format!("invalid log level '{}': {e}", self.level)))?;

        let writer = match &self.file {
            Some(path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| Error::configuration(format!("opening log file '{}': {e}", path.display())))?;
                BoxMakeWriter::new(std::sync::Mutex::new(file))
            }
            None => BoxMakeWriter::new(std::io::stderr),
        };

        let subscriber = tracing_subscriber::registry().with(filter);

        let init_result = match self.format {
            LogFormat::Pretty => subscriber.with(fmt::layer().with_writer(writer).pretty()).try_init(),
            LogFormat::Json => subscriber.with(fmt::layer().with_writer(writer).json()).try_init(),
            LogFormat::Compact => subscriber.with(fmt::layer().with_writer(writer).compact()).try_init(),
        };

        init_result.map_err(|e| Error::configuration(format!("failed to initialize logging: {e}")))
    }

    /// The configured level as a `tracing::Level`, falling back to
    /// `INFO` for an unrecognized directive.
    #[must_use]
    pub fn tracing_level(&self) -> Level {
        match self.level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}
