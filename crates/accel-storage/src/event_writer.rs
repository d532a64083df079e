//! Event CSV writer.
//!
//! One file per event window, each line in the live-stream line format.

use std::io::Write;
use std::path::PathBuf;

use accel_core::{EventFileName, Sample, SampleLine};
use tracing::debug;

use crate::atomic;
use crate::error::{PersistenceError, Result};

/// Writes event files into one directory.
#[derive(Debug, Clone)]
pub struct EventWriter {
    dir: PathBuf,
}

impl EventWriter {
    /// Writer for `dir`. The directory must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `samples` as one sealed event file and return its path.
    ///
    /// On failure the staging file is removed and nothing appears under a
    /// final name.
    pub fn write_event(
        &self,
        bus: u8,
        address: u8,
        trigger_timestamp: f64,
        samples: &[Sample],
    ) -> Result<PathBuf> {
        let name = EventFileName::new(bus, address, trigger_timestamp);
        let final_path = atomic::available_path(&self.dir, |seq| name.with_sequence(seq).file_name());
        let (tmp_path, mut writer) = atomic::create_staging(&final_path)?;

        let mut line = String::with_capacity(64);
        for sample in samples {
            line.clear();
            SampleLine::new(bus, address, *sample).write_to(&mut line);
            if let Err(source) = writer.write_all(line.as_bytes()) {
                drop(writer);
                atomic::discard(&tmp_path);
                return Err(PersistenceError::Write {
                    path: tmp_path,
                    source,
                });
            }
        }

        if let Err(e) = atomic::seal(writer, &tmp_path, &final_path) {
            atomic::discard(&tmp_path);
            return Err(e);
        }
        debug!(path = %final_path.display(), lines = samples.len(), "Event file sealed");
        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = EventWriter::new(dir.path().join("missing"));
        let err = writer
            .write_event(0, 0x19, 1.0, &[Sample::new(1.0, 0.0, 0.0, 1.0)])
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Create { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
