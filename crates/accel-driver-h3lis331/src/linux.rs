//! Linux `/dev/i2c-N` transport.
//!
//! Transfers go through the `I2C_RDWR` ioctl so a register write followed by
//! a read is one combined transaction with a repeated start. The kernel
//! per-transfer timeout is set when the bus is opened and refusing it fails
//! the open: without it a wedged sensor can block a transfer indefinitely.

#![allow(unsafe_code)]

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::Duration;

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};
use tracing::{debug, info};

use crate::error::{I2cBusError, SensorError};
use crate::BusProvider;

// linux/i2c-dev.h
const I2C_RETRIES: libc::c_ulong = 0x0701;
const I2C_TIMEOUT: libc::c_ulong = 0x0702;
const I2C_RDWR: libc::c_ulong = 0x0707;
const I2C_RDWR_IOCTL_MAX_MSGS: usize = 42;

// linux/i2c.h
const I2C_M_RD: u16 = 0x0001;

#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

/// Convert a timeout to the kernel's 10 ms ticks, never less than one tick.
pub fn timeout_ticks(timeout: Duration) -> libc::c_ulong {
    let ticks = timeout.as_millis().div_ceil(10).max(1);
    libc::c_ulong::try_from(ticks).unwrap_or(libc::c_ulong::MAX)
}

/// An open `/dev/i2c-N` adapter.
#[derive(Debug)]
pub struct LinuxI2cBus {
    file: File,
    path: PathBuf,
}

impl LinuxI2cBus {
    /// Open `/dev/i2c-<bus>` and apply the transfer timeout.
    ///
    /// Retries are disabled so a failing transfer surfaces immediately.
    pub fn open(bus: u8, timeout: Duration) -> Result<Self, SensorError> {
        let path = PathBuf::from(format!("/dev/i2c-{bus}"));
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|source| SensorError::BusOpen {
                path: path.clone(),
                source,
            })?;

        let ticks = timeout_ticks(timeout);
        set_param(&file, I2C_TIMEOUT, ticks).map_err(|source| SensorError::BusSetup {
            path: path.clone(),
            setting: "I2C_TIMEOUT",
            source,
        })?;
        set_param(&file, I2C_RETRIES, 0).map_err(|source| SensorError::BusSetup {
            path: path.clone(),
            setting: "I2C_RETRIES",
            source,
        })?;

        info!(path = %path.display(), timeout_ms = ticks * 10, "I2C bus opened");
        Ok(Self { file, path })
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn set_param(file: &File, request: libc::c_ulong, value: libc::c_ulong) -> io::Result<()> {
    // SAFETY: I2C_TIMEOUT and I2C_RETRIES take an unsigned long by value and
    // the descriptor stays open for the duration of the call.
    let ret = unsafe { libc::ioctl(file.as_raw_fd(), request as _, value) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

impl ErrorType for LinuxI2cBus {
    type Error = I2cBusError;
}

impl I2c<SevenBitAddress> for LinuxI2cBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if operations.is_empty() {
            return Ok(());
        }
        if operations.len() > I2C_RDWR_IOCTL_MAX_MSGS {
            return Err(I2cBusError::from_io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "too many messages in one I2C transaction",
            )));
        }

        let mut msgs = Vec::with_capacity(operations.len());
        for op in operations.iter_mut() {
            let (flags, buf, len) = match op {
                Operation::Read(buf) => (I2C_M_RD, buf.as_mut_ptr(), buf.len()),
                // The kernel only reads from write buffers.
                Operation::Write(bytes) => (0, bytes.as_ptr().cast_mut(), bytes.len()),
            };
            let len = u16::try_from(len).map_err(|_| {
                I2cBusError::from_io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "I2C message longer than 65535 bytes",
                ))
            })?;
            msgs.push(I2cMsg {
                addr: u16::from(address),
                flags,
                len,
                buf,
            });
        }

        let mut data = I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            // Bounded by I2C_RDWR_IOCTL_MAX_MSGS above.
            nmsgs: msgs.len() as u32,
        };

        // SAFETY: every message points into a buffer borrowed from
        // `operations`, which outlives the call; read buffers are exclusively
        // borrowed and sized by `len`.
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                I2C_RDWR as _,
                &mut data as *mut I2cRdwrIoctlData,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            debug!(path = %self.path.display(), address, error = %err, "I2C transfer failed");
            return Err(I2cBusError::from_io(err));
        }
        Ok(())
    }
}

/// Opens `/dev/i2c-<bus>` with a fixed transfer timeout.
#[derive(Debug, Clone)]
pub struct LinuxBusProvider {
    bus: u8,
    timeout: Duration,
}

impl LinuxBusProvider {
    /// Provider for bus number `bus`.
    pub fn new(bus: u8, timeout: Duration) -> Self {
        Self { bus, timeout }
    }
}

impl BusProvider for LinuxBusProvider {
    type Bus = LinuxI2cBus;

    fn open(&mut self) -> Result<Self::Bus, SensorError> {
        LinuxI2cBus::open(self.bus, self.timeout)
    }

    fn describe(&self) -> String {
        format!("/dev/i2c-{}", self.bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_ticks() {
        assert_eq!(timeout_ticks(Duration::from_millis(50)), 5);
        assert_eq!(timeout_ticks(Duration::from_millis(55)), 6);
        assert_eq!(timeout_ticks(Duration::from_millis(1)), 1);
        assert_eq!(timeout_ticks(Duration::ZERO), 1);
    }

    #[test]
    fn test_open_missing_bus() {
        let err = LinuxI2cBus::open(250, Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, SensorError::BusOpen { .. }));
        assert!(err.to_string().contains("/dev/i2c-250"));
    }

    #[test]
    fn test_provider_describe() {
        let provider = LinuxBusProvider::new(3, Duration::from_millis(50));
        assert_eq!(provider.describe(), "/dev/i2c-3");
    }
}
