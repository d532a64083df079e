//! Layered configuration for the collector and the event processor.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. Built-in defaults ([`AppConfig::default`])
//! 2. An optional TOML file
//! 3. Environment variables prefixed `ACCEL_`, with `__` separating
//!    sections (e.g. `ACCEL_COLLECTOR__BUS=3`, `ACCEL_DETECTOR__ABS_THRESHOLD_G=8.0`)
//!
//! # Example
//!
//! ```toml
//! [collector]
//! bus = 0
//! sample_rate_hz = 1000
//! i2c_timeout = "50ms"
//! sensors = [
//!     { label = "A", address = 0x19 },
//!     { label = "B", address = 0x18 },
//! ]
//!
//! [storage]
//! raw_dir = "/dev/shm/raw"
//!
//! [processor]
//! event_dir = "/dev/shm"
//! ```

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::format::RECORD_SIZE;

/// Highest sample rate the sensor's output data rate can serve.
pub const MAX_SAMPLE_RATE_HZ: u16 = 1000;

/// Complete configuration for both processes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Sampling loop and recovery tuning
    pub collector: CollectorConfig,
    /// Raw file output
    pub storage: StorageConfig,
    /// Optional TCP mirror of live samples
    pub live_stream: LiveStreamConfig,
    /// External process monitor notifications
    pub heartbeat: HeartbeatConfig,
    /// Event processor polling and output
    pub processor: ProcessorConfig,
    /// Anomaly detection thresholds
    pub detector: DetectorSettings,
    /// Log output
    pub logging: LoggingConfig,
}

/// One configured sensor slot on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Label used in logs
    pub label: String,
    /// 7-bit I2C address
    pub address: u8,
}

/// Collector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// I2C bus number (`/dev/i2c-<bus>`)
    pub bus: u8,
    /// Sensor addresses to probe
    pub sensors: Vec<SensorConfig>,
    /// Sampling frequency in Hz
    pub sample_rate_hz: u16,
    /// Kernel per-transaction timeout set on the bus at open time
    #[serde(with = "humantime_serde")]
    pub i2c_timeout: Duration,
    /// Consecutive failed ticks before a full bus recovery
    pub max_consecutive_errors: u32,
    /// Pause after a failed tick
    #[serde(with = "humantime_serde")]
    pub error_cooldown: Duration,
    /// Pause before (re)initialising the bus
    #[serde(with = "humantime_serde")]
    pub recovery_cooldown: Duration,
    /// How far behind schedule the loop may fall before resynchronising
    #[serde(with = "humantime_serde")]
    pub schedule_slack: Duration,
    /// Interval between status summaries in the log
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,
    /// Ticks between polls for a new live-stream client
    pub accept_every_ticks: u32,
}

impl CollectorConfig {
    /// Time between ticks.
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.sample_rate_hz.max(1)))
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            sensors: vec![
                SensorConfig {
                    label: "A".to_string(),
                    address: 0x19,
                },
                SensorConfig {
                    label: "B".to_string(),
                    address: 0x18,
                },
            ],
            sample_rate_hz: 1000,
            i2c_timeout: Duration::from_millis(50),
            max_consecutive_errors: 50,
            error_cooldown: Duration::from_millis(500),
            recovery_cooldown: Duration::from_secs(3),
            schedule_slack: Duration::from_millis(50),
            status_interval: Duration::from_secs(300),
            accept_every_ticks: 100,
        }
    }
}

/// Raw file output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for raw binary files (shared with the processor)
    pub raw_dir: PathBuf,
    /// Seal and rotate once a file reaches this many bytes
    pub max_file_bytes: u64,
    /// Flush the write buffer every N samples
    pub flush_every: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from("/dev/shm/raw"),
            max_file_bytes: 5 * 1024 * 1024,
            flush_every: 100,
        }
    }
}

/// Live stream configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveStreamConfig {
    /// Whether to open the listening socket at all
    pub enabled: bool,
    /// Listen address
    pub bind: SocketAddr,
}

impl Default for LiveStreamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: SocketAddr::from(([0, 0, 0, 0], 6000)),
        }
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Send notifications at all
    pub enabled: bool,
    /// Ticks between watchdog notifications
    pub every_ticks: u32,
    /// Explicit notify socket; falls back to `$NOTIFY_SOCKET` when unset
    pub socket: Option<PathBuf>,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            every_ticks: 1000,
            socket: None,
        }
    }
}

/// Event processor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Directory for event CSV files (consumed by the uploader)
    pub event_dir: PathBuf,
    /// Pause between directory scans
    #[serde(with = "humantime_serde")]
    pub scan_interval: Duration,
    /// Interval between status summaries in the log
    #[serde(with = "humantime_serde")]
    pub status_interval: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            event_dir: PathBuf::from("/dev/shm"),
            scan_interval: Duration::from_secs(10),
            status_interval: Duration::from_secs(300),
        }
    }
}

/// Detection thresholds, all in physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Absolute magnitude threshold (g)
    pub abs_threshold_g: f64,
    /// Trigger when magnitude exceeds this multiple of the rolling RMS
    pub rel_multiplier: f64,
    /// Rolling RMS window
    #[serde(with = "humantime_serde")]
    pub rms_window: Duration,
    /// Context kept before each trigger
    #[serde(with = "humantime_serde")]
    pub pre_event: Duration,
    /// Context kept after each trigger
    #[serde(with = "humantime_serde")]
    pub post_event: Duration,
    /// Windows closer than this are merged
    #[serde(with = "humantime_serde")]
    pub merge_gap: Duration,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            abs_threshold_g: 10.0,
            rel_multiplier: 4.0,
            rms_window: Duration::from_secs(2),
            pre_event: Duration::from_secs(5),
            post_event: Duration::from_secs(5),
            merge_gap: Duration::from_secs(10),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, coloured (development)
    Pretty,
    /// Single line per event (production)
    #[default]
    Compact,
    /// JSON lines (log aggregation)
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level; `RUST_LOG` overrides it
    pub level: String,
    /// Console output format
    pub format: LogFormat,
    /// Also append to a log file in this directory
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            dir: None,
        }
    }
}

impl AppConfig {
    /// Load defaults, then `path` (if given), then `ACCEL_*` environment
    /// variables, and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        let config: AppConfig = figment
            .merge(Env::prefixed("ACCEL_").split("__"))
            .extract()
            .map_err(Box::new)?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let c = &self.collector;

        if c.sample_rate_hz == 0 {
            errors.push("collector.sample_rate_hz must be > 0".to_string());
        }
        if c.sample_rate_hz > MAX_SAMPLE_RATE_HZ {
            errors.push(format!(
                "collector.sample_rate_hz {} exceeds sensor maximum {MAX_SAMPLE_RATE_HZ}",
                c.sample_rate_hz
            ));
        }
        if c.sensors.is_empty() {
            errors.push("collector.sensors must list at least one sensor".to_string());
        }
        let mut seen = HashSet::new();
        for sensor in &c.sensors {
            if sensor.address > 0x7f {
                errors.push(format!(
                    "sensor '{}' address 0x{:02x} is not a 7-bit address",
                    sensor.label, sensor.address
                ));
            }
            if !seen.insert(sensor.address) {
                errors.push(format!(
                    "sensor address 0x{:02x} configured more than once",
                    sensor.address
                ));
            }
        }
        if c.i2c_timeout.is_zero() {
            errors.push("collector.i2c_timeout must be > 0".to_string());
        }
        if c.max_consecutive_errors == 0 {
            errors.push("collector.max_consecutive_errors must be > 0".to_string());
        }
        if c.accept_every_ticks == 0 {
            errors.push("collector.accept_every_ticks must be > 0".to_string());
        }

        if self.storage.max_file_bytes < RECORD_SIZE as u64 {
            errors.push(format!(
                "storage.max_file_bytes must be at least one record ({RECORD_SIZE} bytes)"
            ));
        }
        if self.storage.flush_every == 0 {
            errors.push("storage.flush_every must be > 0".to_string());
        }
        if self.heartbeat.every_ticks == 0 {
            errors.push("heartbeat.every_ticks must be > 0".to_string());
        }
        if self.processor.event_dir == self.storage.raw_dir {
            errors.push("processor.event_dir must differ from storage.raw_dir".to_string());
        }

        let d = &self.detector;
        if d.abs_threshold_g.is_nan() || d.abs_threshold_g <= 0.0 {
            errors.push("detector.abs_threshold_g must be > 0".to_string());
        }
        if d.rel_multiplier.is_nan() || d.rel_multiplier <= 0.0 {
            errors.push("detector.rel_multiplier must be > 0".to_string());
        }
        if d.rms_window.is_zero() {
            errors.push("detector.rms_window must be > 0".to_string());
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => errors.push(format!(
                "logging.level '{other}' must be one of: trace, debug, info, warn, error"
            )),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("\n")))
        }
    }
}
