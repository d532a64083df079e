//! Event processor: turns sealed raw files into event CSV files.
//!
//! ```text
//! raw dir ──list sealed──> RawFile ──detect_events──> EventWindow* ──EventWriter──> event dir
//!                             │
//!                             └──────────────── delete (always) ────────────────────┘
//! ```
//!
//! Each raw file is processed exactly once and then deleted, whether or not
//! its events could be written.

pub mod detector;
pub mod error;
pub mod supervisor;

pub use detector::{detect_events, DetectorConfig, EventWindow, SampleCounts};
pub use error::ProcessorError;
pub use supervisor::{FileOutcome, ProcessorStats, ProcessorSupervisor};
