//! Collector process: samples every sensor on one I2C bus at a fixed rate.
//!
//! # Architecture
//!
//! ```text
//!                      ┌──────────────────────────┐
//!   BusProvider ──────>│   CollectorSupervisor    │──> LogFile per sensor ──> raw dir
//!   (open / reopen)    │  Initializing → Running  │
//!                      │     ↑          ↓         │──> LiveStreamServer ──> one TCP client
//!                      │     └─ Recovering        │
//!                      └──────────────────────────┘──> Heartbeat ──> process monitor
//! ```
//!
//! Everything runs on one thread. The supervisor owns the bus, the sensors,
//! their files and the live stream; nothing is shared except the stop flag.

pub mod error;
pub mod heartbeat;
pub mod live_stream;
pub mod schedule;
pub mod supervisor;

pub use error::{CollectorError, ProtocolError};
pub use heartbeat::Heartbeat;
pub use live_stream::{LiveStreamServer, LiveStreamStats, REJECTION_LINE};
pub use schedule::TickSchedule;
pub use supervisor::{CollectorState, CollectorStats, CollectorSupervisor};
