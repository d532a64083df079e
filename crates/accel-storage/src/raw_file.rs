//! Validating reader for sealed raw files.

use std::fs;
use std::path::{Path, PathBuf};

use accel_core::error::FormatResult;
use accel_core::format::{decode_records, FileHeader};
use accel_core::{FormatError, Sample};
use tracing::debug;

/// A fully decoded raw file.
#[derive(Debug, Clone)]
pub struct RawFile {
    /// Where it was read from
    pub path: PathBuf,
    /// Decoded header
    pub header: FileHeader,
    /// Every complete record, in file order
    pub samples: Vec<Sample>,
    /// Bytes of a trailing partial record that were ignored
    pub truncated_bytes: usize,
}

impl RawFile {
    /// Read and validate `path`.
    ///
    /// A trailing partial record is dropped; a file with no complete record
    /// is [`FormatError::Empty`].
    pub fn open(path: impl AsRef<Path>) -> FormatResult<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| FormatError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut buf = &bytes[..];
        let header = FileHeader::decode(&mut buf)?;
        let (samples, truncated_bytes) = decode_records(&mut buf);

        if truncated_bytes > 0 {
            debug!(
                path = %path.display(),
                truncated_bytes,
                "Ignoring trailing partial record"
            );
        }
        if samples.is_empty() {
            return Err(FormatError::Empty);
        }

        Ok(Self {
            path: path.to_path_buf(),
            header,
            samples,
            truncated_bytes,
        })
    }

    /// Seconds between the first and last record.
    pub fn duration_secs(&self) -> f64 {
        match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}
