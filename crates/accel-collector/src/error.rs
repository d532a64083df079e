//! Collector error types.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that end the collector.
///
/// Everything else (bus faults, missing sensors, storage faults, live client
/// faults) is handled inside the supervisor loop.
#[derive(Error, Debug)]
pub enum CollectorError {
    /// The raw output directory could not be created
    #[error("Cannot create output directory '{}': {source}", path.display())]
    FatalStartup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to deliver a line to the live client. The client is dropped.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The socket buffer is full; the client is not keeping up
    #[error("Live client is not keeping up (send buffer full)")]
    Backpressure,

    /// Only part of the line fit into the socket buffer
    #[error("Partial write to live client ({written} of {expected} bytes)")]
    PartialWrite { written: usize, expected: usize },

    /// Reset, broken pipe or any other socket error
    #[error("Live client disconnected: {0}")]
    Disconnected(#[source] io::Error),
}
