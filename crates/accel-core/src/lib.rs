//! Core types for the accelerometer telemetry pipeline.
//!
//! This crate holds everything the collector and the event processor agree
//! on without talking to each other directly:
//!
//! - [`Sample`] / [`SensorIdentity`] - the data model
//! - [`format`] - the `ACLB` binary raw file layout (header + fixed records)
//! - [`line`] - the text line shared by the live stream and event files
//! - [`naming`] - directory/filename conventions, including `.tmp` staging
//! - [`config`] - layered configuration for both processes
//! - [`StopFlag`] - cooperative shutdown shared with signal handlers
//!
//! # Filesystem contract
//!
//! ```text
//! Collector ──write──> accel_bus0_0x19_1770773050.dat.tmp
//!           ──seal───> accel_bus0_0x19_1770773050.dat   (rename)
//! Processor ──list───> *.dat (never *.tmp) ──> accel_bus0_0x19_event_<ts>.dat
//! ```
//!
//! A file is only ever visible under its final name after it was flushed,
//! synced and closed, so the two processes need no locking.

pub mod config;
pub mod error;
pub mod format;
pub mod line;
pub mod naming;
pub mod sample;
pub mod stop;

pub use config::AppConfig;
pub use error::{ConfigError, FormatError};
pub use format::{FileHeader, HEADER_SIZE, MAGIC, RECORD_SIZE, VERSION};
pub use line::SampleLine;
pub use naming::{EventFileName, RawFileName, TMP_SUFFIX};
pub use sample::{unix_timestamp, Sample, SensorIdentity};
pub use stop::StopFlag;
