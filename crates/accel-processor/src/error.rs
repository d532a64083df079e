//! Processor error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the processor.
///
/// Unreadable files and failed event writes are logged and skipped.
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// The raw or event directory could not be created
    #[error("Cannot create directory '{}': {source}", path.display())]
    FatalStartup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
