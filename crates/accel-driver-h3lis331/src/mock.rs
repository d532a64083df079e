//! Register-level mock of H3LIS331DL sensors on a shared bus.
//!
//! [`MockI2cBus`] is cheap to clone; clones share state, so a test can keep
//! a handle to inject failures or change readings while the collector owns
//! the bus it was given.
//!
//! Failure injection:
//! - [`MockI2cBus::fail_next`]: the next N transactions fail (transient glitch)
//! - [`MockI2cBus::set_fail_always`]: every transaction fails until cleared
//! - [`MockBusProvider::fail_next_opens`]: the next N bus opens fail

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

use crate::error::{I2cBusError, SensorError};
use crate::registers::{
    AUTO_INCREMENT, OUT_X_L, SENSITIVITY_G_PER_COUNT, WHO_AM_I, WHO_AM_I_VALUE,
};
use crate::BusProvider;

const REGISTER_FILE_LEN: usize = 0x40;

#[derive(Debug)]
struct MockDevice {
    registers: [u8; REGISTER_FILE_LEN],
    pointer: u8,
    writes: Vec<(u8, u8)>,
}

impl MockDevice {
    fn new() -> Self {
        let mut registers = [0u8; REGISTER_FILE_LEN];
        registers[WHO_AM_I as usize] = WHO_AM_I_VALUE;
        Self {
            registers,
            pointer: 0,
            writes: Vec::new(),
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&reg, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = reg & !AUTO_INCREMENT;
        for &value in data {
            let idx = self.pointer as usize % REGISTER_FILE_LEN;
            self.registers[idx] = value;
            self.writes.push((self.pointer, value));
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        for byte in buf {
            *byte = self.registers[self.pointer as usize % REGISTER_FILE_LEN];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    devices: HashMap<u8, MockDevice>,
    fail_next: u32,
    fail_always: bool,
    transactions: u64,
    failures: u64,
    fail_next_opens: u32,
    opens: u32,
}

fn injected(errno: i32) -> I2cBusError {
    I2cBusError::from_io(io::Error::from_raw_os_error(errno))
}

/// Shared-state mock bus.
#[derive(Debug, Clone, Default)]
pub struct MockI2cBus {
    state: Arc<Mutex<MockState>>,
}

impl MockI2cBus {
    /// Empty bus; every address NACKs until a sensor is added.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a sensor at `address` with power-on register values.
    pub fn add_sensor(&self, address: u8) {
        self.state().devices.insert(address, MockDevice::new());
    }

    /// Detach the sensor at `address`; it NACKs from now on.
    pub fn remove_sensor(&self, address: u8) {
        self.state().devices.remove(&address);
    }

    /// Override the identification register.
    pub fn set_who_am_i(&self, address: u8, value: u8) {
        if let Some(dev) = self.state().devices.get_mut(&address) {
            dev.registers[WHO_AM_I as usize] = value;
        }
    }

    /// Set the output registers to raw 12-bit counts per axis.
    pub fn set_axes_counts(&self, address: u8, counts: [i16; 3]) {
        if let Some(dev) = self.state().devices.get_mut(&address) {
            for (i, count) in counts.into_iter().enumerate() {
                let [lo, hi] = (count << 4).to_le_bytes();
                let base = OUT_X_L as usize + i * 2;
                dev.registers[base] = lo;
                dev.registers[base + 1] = hi;
            }
        }
    }

    /// Set the output registers to the counts nearest `g` per axis.
    pub fn set_axes_g(&self, address: u8, g: [f32; 3]) {
        let counts = g.map(|v| (v / SENSITIVITY_G_PER_COUNT).round().clamp(-2048.0, 2047.0) as i16);
        self.set_axes_counts(address, counts);
    }

    /// Current value of one register, `None` if no sensor is attached.
    pub fn register(&self, address: u8, register: u8) -> Option<u8> {
        self.state()
            .devices
            .get(&address)
            .map(|dev| dev.registers[register as usize % REGISTER_FILE_LEN])
    }

    /// Every `(register, value)` written to `address`, in order.
    pub fn writes(&self, address: u8) -> Vec<(u8, u8)> {
        self.state()
            .devices
            .get(&address)
            .map(|dev| dev.writes.clone())
            .unwrap_or_default()
    }

    /// Fail the next `n` transactions with a bus timeout.
    pub fn fail_next(&self, n: u32) {
        self.state().fail_next = n;
    }

    /// Fail every transaction until called with `false`.
    pub fn set_fail_always(&self, fail: bool) {
        self.state().fail_always = fail;
    }

    /// Transactions attempted so far, including failed ones.
    pub fn transactions(&self) -> u64 {
        self.state().transactions
    }

    /// Transactions failed by injection or a missing device.
    pub fn failures(&self) -> u64 {
        self.state().failures
    }
}

impl ErrorType for MockI2cBus {
    type Error = I2cBusError;
}

impl I2c<SevenBitAddress> for MockI2cBus {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state();
        state.transactions += 1;

        if state.fail_always {
            state.failures += 1;
            return Err(injected(libc::ETIMEDOUT));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            state.failures += 1;
            return Err(injected(libc::ETIMEDOUT));
        }

        if !state.devices.contains_key(&address) {
            state.failures += 1;
            return Err(injected(libc::EREMOTEIO));
        }
        let Some(dev) = state.devices.get_mut(&address) else {
            return Err(injected(libc::EREMOTEIO));
        };
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => dev.write(bytes),
                Operation::Read(buf) => dev.read(buf),
            }
        }
        Ok(())
    }
}

/// Hands out clones of one [`MockI2cBus`].
#[derive(Debug, Clone)]
pub struct MockBusProvider {
    bus: MockI2cBus,
}

impl MockBusProvider {
    /// Provider for `bus`.
    pub fn new(bus: MockI2cBus) -> Self {
        Self { bus }
    }

    /// Fail the next `n` calls to [`BusProvider::open`].
    pub fn fail_next_opens(&self, n: u32) {
        self.bus.state().fail_next_opens = n;
    }

    /// Successful and failed opens so far.
    pub fn opens(&self) -> u32 {
        self.bus.state().opens
    }
}

impl BusProvider for MockBusProvider {
    type Bus = MockI2cBus;

    fn open(&mut self) -> Result<Self::Bus, SensorError> {
        let mut state = self.bus.state();
        state.opens += 1;
        if state.fail_next_opens > 0 {
            state.fail_next_opens -= 1;
            return Err(SensorError::BusOpen {
                path: PathBuf::from("mock"),
                source: io::Error::from_raw_os_error(libc::ENOENT),
            });
        }
        drop(state);
        Ok(self.bus.clone())
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_increment_block_read() {
        let mut bus = MockI2cBus::new();
        bus.add_sensor(0x19);
        bus.set_axes_counts(0x19, [1, -1, 2047]);

        let mut raw = [0u8; 6];
        bus.write_read(0x19, &[OUT_X_L | AUTO_INCREMENT], &mut raw)
            .unwrap();
        assert_eq!(raw, [0x10, 0x00, 0xF0, 0xFF, 0xF0, 0x7F]);
    }

    #[test]
    fn test_clones_share_state() {
        let bus = MockI2cBus::new();
        let mut other = bus.clone();
        bus.add_sensor(0x18);
        other.write(0x18, &[0x20, 0x3F]).unwrap();
        assert_eq!(bus.register(0x18, 0x20), Some(0x3F));
        assert_eq!(bus.transactions(), 1);
    }

    #[test]
    fn test_fail_next_then_recover() {
        let mut bus = MockI2cBus::new();
        bus.add_sensor(0x19);
        bus.fail_next(2);
        let mut b = [0u8; 1];
        assert!(bus.write_read(0x19, &[WHO_AM_I], &mut b).is_err());
        assert!(bus.write_read(0x19, &[WHO_AM_I], &mut b).is_err());
        bus.write_read(0x19, &[WHO_AM_I], &mut b).unwrap();
        assert_eq!(b[0], WHO_AM_I_VALUE);
        assert_eq!(bus.failures(), 2);
    }

    #[test]
    fn test_provider_open_failures() {
        let mut provider = MockBusProvider::new(MockI2cBus::new());
        provider.fail_next_opens(1);
        assert!(matches!(
            provider.open(),
            Err(SensorError::BusOpen { .. })
        ));
        assert!(provider.open().is_ok());
        assert_eq!(provider.opens(), 2);
    }
}
