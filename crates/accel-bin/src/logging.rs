//! Tracing initialisation for both processes.
//!
//! Console output goes to stdout in the configured format. When
//! `logging.dir` is set, every event is also appended (never rotated) to
//! `<dir>/<file_name>` through a non-blocking writer; the returned guard
//! must be held until exit so buffered lines are flushed.

use std::path::{Path, PathBuf};

use accel_core::config::{LogFormat, LoggingConfig};
use anyhow::{anyhow, Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Keeps the file writer alive.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
    log_file: Option<PathBuf>,
}

impl LoggingGuard {
    /// Path of the log file, if file logging is enabled.
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }
}

/// Parse log level string into tracing Level
fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(anyhow!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        )),
    }
}

fn level_to_filter_string(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// `RUST_LOG` if set and valid, the configured level otherwise.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_to_filter_string(level)))
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig, file_name: &str) -> Result<LoggingGuard> {
    let level = parse_log_level(&config.level)?;
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console = match config.format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_thread_names(true)
            .with_filter(env_filter(level))
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_ansi(false)
            .with_filter(env_filter(level))
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter(level))
            .boxed(),
    };
    layers.push(console);

    let mut file_guard = None;
    let mut log_file = None;
    if let Some(dir) = &config.dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        layers.push(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter(level))
                .boxed(),
        );
        file_guard = Some(guard);
        log_file = Some(dir.join(file_name));
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize tracing: {e}"))?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        log_file,
    })
}
