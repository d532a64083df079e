//! File persistence for the telemetry pipeline.
//!
//! - [`LogFile`] - per-sensor rotating binary writer (collector side)
//! - [`RawFile`] - validating reader for sealed raw files (processor side)
//! - [`EventWriter`] - event CSV writer (processor side)
//!
//! Every file is written under a `.tmp` name and only renamed to its final
//! name after flush, `fsync` and close ("sealing"). Readers list final names
//! only, so they never see a partially written file.

mod atomic;
pub mod error;
pub mod event_writer;
pub mod log_file;
pub mod raw_file;

pub use error::PersistenceError;
pub use event_writer::EventWriter;
pub use log_file::{HeaderTemplate, LogFile, LogFileOptions, LogFileStats};
pub use raw_file::RawFile;
