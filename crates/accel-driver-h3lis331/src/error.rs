//! Error types for the sensor link.

use std::io;
use std::path::PathBuf;

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
use thiserror::Error;

/// Errors raised by bus setup and sensor operations.
#[derive(Error, Debug)]
pub enum SensorError {
    /// The bus device node could not be opened
    #[error("Failed to open I2C bus '{}': {source}", path.display())]
    BusOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The bus opened but a mandatory transport setting was refused
    #[error("I2C bus '{}' rejected {setting}: {source}", path.display())]
    BusSetup {
        path: PathBuf,
        setting: &'static str,
        #[source]
        source: io::Error,
    },

    /// A transfer to the sensor failed (NACK, timeout, bus error)
    #[error("I2C transfer to 0x{address:02x} failed ({kind}): {message}")]
    Transport {
        address: u8,
        kind: ErrorKind,
        message: String,
    },

    /// Something answered but it is not an H3LIS331DL
    #[error("Device at 0x{address:02x} reported WHO_AM_I 0x{found:02x}, expected 0x32")]
    IdentityMismatch { address: u8, found: u8 },
}

impl SensorError {
    /// Whether this is a failed transfer on an otherwise open bus.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub(crate) fn transport<E: embedded_hal::i2c::Error>(address: u8, err: E) -> Self {
        Self::Transport {
            address,
            kind: err.kind(),
            message: format!("{err:?}"),
        }
    }
}

/// Error type of the concrete buses in this crate.
///
/// Wraps the OS error and classifies it into an
/// [`embedded_hal::i2c::ErrorKind`].
#[derive(Error, Debug)]
#[error("{source}")]
pub struct I2cBusError {
    kind: ErrorKind,
    source: io::Error,
}

impl I2cBusError {
    /// Classify an OS error returned by an i2c-dev transfer.
    pub fn from_io(source: io::Error) -> Self {
        let kind = match source.raw_os_error() {
            Some(libc::ENXIO) | Some(libc::EREMOTEIO) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            Some(libc::EAGAIN) => ErrorKind::ArbitrationLoss,
            Some(libc::EIO) => ErrorKind::Bus,
            _ => ErrorKind::Other,
        };
        Self { kind, source }
    }
}

impl embedded_hal::i2c::Error for I2cBusError {
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}
