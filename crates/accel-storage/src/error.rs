//! Persistence errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for file persistence.
pub type Result<T> = std::result::Result<T, PersistenceError>;

/// A filesystem step of writing or sealing a file failed.
///
/// The file involved has already been abandoned when one of these is
/// returned; the caller decides whether to carry on.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Staging file could not be created
    #[error("Failed to create '{}': {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Write to the staging file failed (disk full, I/O error)
    #[error("Failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Flushing buffered data failed
    #[error("Failed to flush '{}': {source}", path.display())]
    Flush {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `fsync` failed
    #[error("Failed to sync '{}': {source}", path.display())]
    Sync {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Rename to the final name failed
    #[error("Failed to rename '{}' to '{}': {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}
