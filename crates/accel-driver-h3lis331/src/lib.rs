//! H3LIS331DL ±100 g accelerometer driver.
//!
//! The driver is written against [`embedded_hal::i2c::I2c`], so the same
//! code talks to real hardware through [`LinuxI2cBus`] (`/dev/i2c-N`) and to
//! the register-level [`mock::MockI2cBus`] in tests.
//!
//! Several sensors share one bus. The bus is owned by the caller and lent to
//! each [`H3lis331`] per operation:
//!
//! ```rust,ignore
//! use accel_driver_h3lis331::{H3lis331, LinuxI2cBus};
//! use std::time::Duration;
//!
//! let mut bus = LinuxI2cBus::open(0, Duration::from_millis(50))?;
//! let sensor = H3lis331::new(0x19);
//! sensor.probe(&mut bus)?;
//! sensor.configure(&mut bus, 1000)?;
//! let sample = sensor.read(&mut bus, accel_core::unix_timestamp())?;
//! ```
//!
//! # Bus lifecycle
//!
//! [`BusProvider`] opens (and, during recovery, re-opens) the bus. Dropping
//! the bus closes it.

pub mod error;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod mock;
pub mod registers;
pub mod sensor;

pub use error::{I2cBusError, SensorError};
#[cfg(target_os = "linux")]
pub use linux::{LinuxBusProvider, LinuxI2cBus};
pub use registers::OutputDataRate;
pub use sensor::{decode_axes, H3lis331};

use embedded_hal::i2c::I2c;

/// Opens the shared I2C bus.
///
/// Called once at startup and again on every recovery; the previous bus
/// handle is dropped before the new one is requested.
pub trait BusProvider {
    /// The bus type handed to the sensors.
    type Bus: I2c;

    /// Open the bus, applying any mandatory transport settings.
    fn open(&mut self) -> Result<Self::Bus, SensorError>;

    /// Human readable bus description for logs.
    fn describe(&self) -> String;
}
