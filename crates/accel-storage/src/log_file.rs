//! Per-sensor rotating binary writer.
//!
//! ```text
//!   Idle ──write_sample──> Open ──(bytes_written >= max_bytes)──> seal ──> Idle
//!                           │
//!                           └──(any I/O error)──> abandoned ──> Idle
//! ```
//!
//! A file is opened lazily by the first sample after a seal, so its header's
//! start timestamp (and its name) is that sample's timestamp.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use accel_core::config::StorageConfig;
use accel_core::format::{record_bytes, FileHeader, HEADER_SIZE, RECORD_SIZE};
use accel_core::{RawFileName, Sample, SensorIdentity};
use tracing::{debug, info, warn};

use crate::atomic;
use crate::error::{PersistenceError, Result};

/// Sensor calibration fields copied into every header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderTemplate {
    /// Configured full-scale range in g
    pub full_scale_g: u8,
    /// Declared sample rate in Hz
    pub sample_rate_hz: u16,
    /// g per count
    pub sensitivity_g_per_count: f32,
}

impl HeaderTemplate {
    fn header_for(&self, identity: &SensorIdentity, start_timestamp: f64) -> FileHeader {
        FileHeader {
            bus: identity.bus,
            address: identity.address,
            full_scale_g: self.full_scale_g,
            sample_rate_hz: self.sample_rate_hz,
            sensitivity_g_per_count: self.sensitivity_g_per_count,
            start_timestamp,
        }
    }
}

/// Rotation and flush policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFileOptions {
    /// Seal once the file (header included) reaches this many bytes
    pub max_bytes: u64,
    /// Flush the write buffer every N samples
    pub flush_every: u32,
}

impl Default for LogFileOptions {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            flush_every: 100,
        }
    }
}

impl From<&StorageConfig> for LogFileOptions {
    fn from(config: &StorageConfig) -> Self {
        Self {
            max_bytes: config.max_file_bytes,
            flush_every: config.flush_every.max(1),
        }
    }
}

/// Lifetime counters for one [`LogFile`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogFileStats {
    /// Files successfully renamed to their final name
    pub files_sealed: u64,
    /// Records written (including those in abandoned files)
    pub samples_written: u64,
    /// Create/write/flush/seal failures
    pub write_failures: u64,
}

#[derive(Debug)]
struct OpenFile {
    writer: BufWriter<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
    bytes_written: u64,
    samples_in_file: u64,
    since_flush: u32,
    last_timestamp: f64,
}

#[derive(Debug)]
enum FileState {
    Idle,
    Open(OpenFile),
}

/// Rotating binary writer for one sensor.
#[derive(Debug)]
pub struct LogFile {
    dir: PathBuf,
    identity: SensorIdentity,
    template: HeaderTemplate,
    options: LogFileOptions,
    state: FileState,
    stats: LogFileStats,
}

impl LogFile {
    /// Writer for `identity` into `dir`. Nothing is created until the first
    /// sample arrives.
    pub fn new(
        dir: impl Into<PathBuf>,
        identity: SensorIdentity,
        template: HeaderTemplate,
        options: LogFileOptions,
    ) -> Self {
        Self {
            dir: dir.into(),
            identity,
            template,
            options,
            state: FileState::Idle,
            stats: LogFileStats::default(),
        }
    }

    /// Sensor this writer belongs to.
    pub fn identity(&self) -> &SensorIdentity {
        &self.identity
    }

    /// Whether a staging file is currently open.
    pub fn is_open(&self) -> bool {
        matches!(self.state, FileState::Open(_))
    }

    /// Bytes in the open file, header included; 0 when idle.
    pub fn bytes_written(&self) -> u64 {
        match &self.state {
            FileState::Open(f) => f.bytes_written,
            FileState::Idle => 0,
        }
    }

    /// Records in the open file; 0 when idle.
    pub fn samples_in_file(&self) -> u64 {
        match &self.state {
            FileState::Open(f) => f.samples_in_file,
            FileState::Idle => 0,
        }
    }

    /// Lifetime counters.
    pub fn stats(&self) -> LogFileStats {
        self.stats
    }

    /// Append one record, opening a file first if idle and sealing it once
    /// it reaches the size limit.
    ///
    /// Records in one file are strictly increasing in time. A sample that is
    /// not newer than the previous one (wall clock stepped back) seals the
    /// open file and starts a new one named after the sample.
    ///
    /// On error the open file has been abandoned; the next call starts a
    /// fresh one.
    pub fn write_sample(&mut self, sample: &Sample) -> Result<()> {
        if let FileState::Open(file) = &self.state {
            if sample.timestamp <= file.last_timestamp {
                warn!(
                    sensor = %self.identity,
                    last = file.last_timestamp,
                    timestamp = sample.timestamp,
                    "Timestamp went backwards, starting a new file"
                );
                self.seal()?;
            }
        }

        if let FileState::Idle = self.state {
            let opened = self.open(sample.timestamp);
            match opened {
                Ok(file) => self.state = FileState::Open(file),
                Err(e) => {
                    self.stats.write_failures += 1;
                    return Err(e);
                }
            }
        }

        let flush_every = self.options.flush_every;
        let FileState::Open(file) = &mut self.state else {
            return Ok(());
        };

        if let Err(source) = file.writer.write_all(&record_bytes(sample)) {
            let path = file.tmp_path.clone();
            self.abandon();
            return Err(PersistenceError::Write { path, source });
        }
        file.bytes_written += RECORD_SIZE as u64;
        file.samples_in_file += 1;
        file.since_flush += 1;
        file.last_timestamp = sample.timestamp;
        self.stats.samples_written += 1;

        if file.since_flush >= flush_every {
            file.since_flush = 0;
            if let Err(source) = file.writer.flush() {
                let path = file.tmp_path.clone();
                self.abandon();
                return Err(PersistenceError::Flush { path, source });
            }
        }

        if file.bytes_written >= self.options.max_bytes {
            self.seal()?;
        }
        Ok(())
    }

    /// Flush, sync, close and rename the open file.
    ///
    /// Returns the final path, or `None` if no file was open. A failure at
    /// any step abandons the file; sealing is never retried.
    ///
    /// The abandoned staging file is removed even though its records may
    /// already be synced: the raw directory is RAM-backed and a `.tmp` name
    /// is never picked up by the processor, so keeping it would only leak
    /// memory until the next reboot.
    pub fn seal(&mut self) -> Result<Option<PathBuf>> {
        let FileState::Open(file) = std::mem::replace(&mut self.state, FileState::Idle) else {
            return Ok(None);
        };
        let OpenFile {
            writer,
            tmp_path,
            final_path,
            bytes_written,
            samples_in_file,
            ..
        } = file;

        if let Err(e) = atomic::seal(writer, &tmp_path, &final_path) {
            self.stats.write_failures += 1;
            warn!(sensor = %self.identity, error = %e, "Seal failed, file abandoned");
            atomic::discard(&tmp_path);
            return Err(e);
        }

        self.stats.files_sealed += 1;
        info!(
            sensor = %self.identity,
            path = %final_path.display(),
            samples = samples_in_file,
            bytes = bytes_written,
            "Sealed raw file"
        );
        Ok(Some(final_path))
    }

    fn open(&self, start_timestamp: f64) -> Result<OpenFile> {
        let id = &self.identity;
        let name = RawFileName::new(id.bus, id.address, start_timestamp);
        let final_path = atomic::available_path(&self.dir, |seq| name.with_sequence(seq).file_name());
        let (tmp_path, mut writer) = atomic::create_staging(&final_path)?;

        let header = self.template.header_for(id, start_timestamp);
        if let Err(source) = writer.write_all(&header.to_bytes()) {
            drop(writer);
            atomic::discard(&tmp_path);
            return Err(PersistenceError::Write {
                path: tmp_path,
                source,
            });
        }

        debug!(sensor = %id, path = %tmp_path.display(), "Opened raw file");
        Ok(OpenFile {
            writer,
            tmp_path,
            final_path,
            bytes_written: HEADER_SIZE as u64,
            samples_in_file: 0,
            since_flush: 0,
            last_timestamp: f64::NEG_INFINITY,
        })
    }

    /// Drop the open file without sealing it.
    fn abandon(&mut self) {
        if let FileState::Open(file) = std::mem::replace(&mut self.state, FileState::Idle) {
            self.stats.write_failures += 1;
            warn!(
                sensor = %self.identity,
                path = %file.tmp_path.display(),
                samples = file.samples_in_file,
                "Raw file abandoned after write failure"
            );
            let tmp_path = file.tmp_path;
            drop(file.writer);
            atomic::discard(&tmp_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> HeaderTemplate {
        HeaderTemplate {
            full_scale_g: 100,
            sample_rate_hz: 1000,
            sensitivity_g_per_count: 0.049,
        }
    }

    #[test]
    fn test_lazy_open_and_idle_seal() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LogFile::new(
            dir.path(),
            SensorIdentity::new(0, 0x19, "A"),
            template(),
            LogFileOptions::default(),
        );
        assert!(!log.is_open());
        assert_eq!(log.seal().unwrap(), None);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        log.write_sample(&Sample::new(1_770_773_050.5, 0.0, 0.0, 1.0))
            .unwrap();
        assert!(log.is_open());
        assert_eq!(log.bytes_written(), 42);
        assert_eq!(log.samples_in_file(), 1);
        assert!(dir
            .path()
            .join("accel_bus0_0x19_1770773050.dat.tmp")
            .exists());

        let sealed = log.seal().unwrap().unwrap();
        assert_eq!(
            sealed.file_name().unwrap(),
            "accel_bus0_0x19_1770773050.dat"
        );
        assert_eq!(std::fs::metadata(&sealed).unwrap().len(), 42);
        assert!(!log.is_open());
        assert_eq!(log.stats().files_sealed, 1);
    }

    #[test]
    fn test_options_from_storage_config() {
        let config = StorageConfig::default();
        let options = LogFileOptions::from(&config);
        assert_eq!(options, LogFileOptions::default());
    }
}
