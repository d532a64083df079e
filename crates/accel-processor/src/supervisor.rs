//! Polling loop over the raw directory.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use accel_core::{AppConfig, RawFileName, StopFlag};
use accel_storage::{EventWriter, RawFile};
use tracing::{debug, error, info, warn};

use crate::detector::{detect_events, DetectorConfig};
use crate::error::ProcessorError;

/// Counters returned by [`ProcessorSupervisor::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Raw files read, analysed and deleted
    pub files_processed: u64,
    /// Raw files that failed validation and were deleted unprocessed
    pub files_rejected: u64,
    /// Event files sealed
    pub events_written: u64,
    /// Events lost to a failed write
    pub events_failed: u64,
}

/// What happened to one raw file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Analysed; the counts refer to this file only
    Processed {
        /// Events sealed
        events_written: usize,
        /// Events whose write failed
        events_failed: usize,
    },
    /// Failed validation
    Rejected {
        /// Why the file was unreadable
        reason: String,
    },
}

/// Scans the raw directory and turns every sealed file into event files.
#[derive(Debug)]
pub struct ProcessorSupervisor {
    raw_dir: PathBuf,
    event_dir: PathBuf,
    scan_interval: Duration,
    status_interval: Duration,
    detector: DetectorConfig,
    writer: EventWriter,
    stop: StopFlag,
    stats: ProcessorStats,
    /// Consumed files whose delete failed; never processed again.
    undeletable: HashSet<PathBuf>,
}

impl ProcessorSupervisor {
    /// Processor reading `storage.raw_dir` and writing `processor.event_dir`.
    pub fn new(config: &AppConfig, stop: StopFlag) -> Self {
        let event_dir = config.processor.event_dir.clone();
        Self {
            raw_dir: config.storage.raw_dir.clone(),
            writer: EventWriter::new(&event_dir),
            event_dir,
            scan_interval: config.processor.scan_interval,
            status_interval: config.processor.status_interval,
            detector: DetectorConfig::from(&config.detector),
            stop,
            stats: ProcessorStats::default(),
            undeletable: HashSet::new(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    /// Scan every `scan_interval` until the stop flag is set.
    pub fn run(&mut self) -> Result<ProcessorStats, ProcessorError> {
        let d = &self.detector;
        info!(
            abs_g = d.abs_threshold_g,
            rel = d.rel_multiplier,
            rms_window = ?d.rms_window,
            pre = ?d.pre_event,
            post = ?d.post_event,
            merge = ?d.merge_gap,
            "Event processor starting"
        );
        info!(
            input = %self.raw_dir.display(),
            output = %self.event_dir.display(),
            "Directories"
        );

        for dir in [&self.raw_dir, &self.event_dir] {
            fs::create_dir_all(dir).map_err(|source| {
                error!(path = %dir.display(), error = %source, "Cannot create directory");
                ProcessorError::FatalStartup {
                    path: dir.clone(),
                    source,
                }
            })?;
        }

        let mut last_status = Instant::now();
        while !self.stop.is_requested() {
            let handled = self.scan_once();
            if handled > 0 {
                debug!(files = handled, "Scan complete");
            }

            if last_status.elapsed() >= self.status_interval {
                self.log_status();
                last_status = Instant::now();
            }
            self.stop.sleep(self.scan_interval);
        }

        info!(
            files_processed = self.stats.files_processed,
            files_rejected = self.stats.files_rejected,
            events_written = self.stats.events_written,
            events_failed = self.stats.events_failed,
            "Event processor stopped"
        );
        Ok(self.stats)
    }

    /// Process every sealed file currently in the raw directory, oldest
    /// first. Returns how many files were handled.
    pub fn scan_once(&mut self) -> usize {
        self.undeletable.retain(|path| path.exists());
        let mut handled = 0;
        for path in self.sealed_files() {
            if self.stop.is_requested() {
                break;
            }
            self.process_file(&path);
            handled += 1;
        }
        handled
    }

    /// Sealed raw files, oldest first per sensor.
    ///
    /// Staging files, event files, files already consumed and anything else
    /// are ignored.
    pub fn sealed_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.raw_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                error!(path = %self.raw_dir.display(), error = %e, "Failed to list raw directory");
                return Vec::new();
            }
        };

        // Sort on the parsed name: "-1" sorts before ".dat" as text
        let mut files: Vec<(RawFileName, PathBuf)> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = RawFileName::parse(entry.file_name().to_str()?)?;
                Some((name, entry.path()))
            })
            .filter(|(_, path)| !self.undeletable.contains(path))
            .collect();
        files.sort();
        files.into_iter().map(|(_, path)| path).collect()
    }

    /// Detect events in one file, write them, then delete the file.
    ///
    /// The file is deleted whatever happens; events whose write fails are
    /// lost.
    pub fn process_file(&mut self, path: &Path) -> FileOutcome {
        let outcome = match RawFile::open(path) {
            Ok(raw) => self.write_events(&raw),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Skipping unreadable file");
                self.stats.files_rejected += 1;
                FileOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        };

        if let Err(e) = fs::remove_file(path) {
            error!(path = %path.display(), error = %e, "Failed to delete raw file, it will be skipped");
            self.undeletable.insert(path.to_path_buf());
        }
        outcome
    }

    fn write_events(&mut self, raw: &RawFile) -> FileOutcome {
        let header = &raw.header;
        let windows = detect_events(&raw.samples, f64::from(header.sample_rate_hz), &self.detector);
        debug!(
            path = %raw.path.display(),
            samples = raw.samples.len(),
            events = windows.len(),
            "File analysed"
        );

        let mut events_written = 0;
        let mut events_failed = 0;
        for window in &windows {
            let slice = window.slice(&raw.samples);
            match self
                .writer
                .write_event(header.bus, header.address, window.trigger_timestamp, slice)
            {
                Ok(event_path) => {
                    events_written += 1;
                    let duration = slice[slice.len() - 1].timestamp - slice[0].timestamp;
                    info!(
                        bus = header.bus,
                        address = %format_args!("0x{:02x}", header.address),
                        trigger = window.trigger_timestamp.trunc() as i64,
                        samples = window.len(),
                        duration = %format_args!("{duration:.1}s"),
                        path = %event_path.display(),
                        "Event written"
                    );
                }
                Err(e) => {
                    events_failed += 1;
                    warn!(
                        bus = header.bus,
                        address = %format_args!("0x{:02x}", header.address),
                        trigger = window.trigger_timestamp.trunc() as i64,
                        error = %e,
                        "Event lost, write failed"
                    );
                }
            }
        }

        self.stats.files_processed += 1;
        self.stats.events_written += events_written as u64;
        self.stats.events_failed += events_failed as u64;
        FileOutcome::Processed {
            events_written,
            events_failed,
        }
    }

    fn log_status(&self) {
        info!(
            files_processed = self.stats.files_processed,
            files_rejected = self.stats.files_rejected,
            events_written = self.stats.events_written,
            "Processor status"
        );
    }
}
