//! Per-address H3LIS331DL operations.

use std::thread;
use std::time::Duration;

use accel_core::Sample;
use embedded_hal::i2c::I2c;
use tracing::{debug, warn};

use crate::error::SensorError;
use crate::registers::{
    OutputDataRate, AUTO_INCREMENT, CTRL1_POWER_DOWN, CTRL4_BDU_100G, CTRL_REG1, CTRL_REG2,
    CTRL_REG3, CTRL_REG4, OUTPUT_BLOCK_LEN, OUT_X_L, SENSITIVITY_G_PER_COUNT, WHO_AM_I,
    WHO_AM_I_VALUE,
};

/// Time the sensor needs after configuration before data is valid.
pub const SETTLE_TIME: Duration = Duration::from_millis(5);

/// Decode the 6-byte X/Y/Z block into g.
///
/// Each axis is a little-endian `i16` holding 12-bit left-justified data.
pub fn decode_axes(raw: &[u8; OUTPUT_BLOCK_LEN]) -> [f32; 3] {
    let axis = |lo: u8, hi: u8| f32::from(i16::from_le_bytes([lo, hi]) >> 4) * SENSITIVITY_G_PER_COUNT;
    [
        axis(raw[0], raw[1]),
        axis(raw[2], raw[3]),
        axis(raw[4], raw[5]),
    ]
}

/// One H3LIS331DL at a fixed address.
///
/// Holds no bus handle; every operation borrows the shared bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct H3lis331 {
    address: u8,
}

impl H3lis331 {
    /// Sensor at 7-bit `address`.
    pub fn new(address: u8) -> Self {
        Self { address }
    }

    /// 7-bit address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// Read `WHO_AM_I` and check it.
    pub fn probe<B: I2c>(&self, bus: &mut B) -> Result<(), SensorError> {
        let found = self.read_register(bus, WHO_AM_I)?;
        if found != WHO_AM_I_VALUE {
            return Err(SensorError::IdentityMismatch {
                address: self.address,
                found,
            });
        }
        debug!(address = self.address, "WHO_AM_I ok");
        Ok(())
    }

    /// Whether a genuine sensor answers at this address.
    ///
    /// Absence is expected on partially populated buses and only logged.
    pub fn identify<B: I2c>(&self, bus: &mut B) -> bool {
        match self.probe(bus) {
            Ok(()) => true,
            Err(e) => {
                warn!(address = self.address, error = %e, "Sensor not detected");
                false
            }
        }
    }

    /// Normal mode at the data rate matching `sample_rate_hz`, ±100 g with
    /// block data update, filters and interrupts off.
    pub fn configure<B: I2c>(&self, bus: &mut B, sample_rate_hz: u16) -> Result<(), SensorError> {
        let odr = OutputDataRate::for_sample_rate(sample_rate_hz);
        self.write_register(bus, CTRL_REG1, odr.ctrl_reg1())?;
        self.write_register(bus, CTRL_REG4, CTRL4_BDU_100G)?;
        self.write_register(bus, CTRL_REG2, 0x00)?;
        self.write_register(bus, CTRL_REG3, 0x00)?;
        thread::sleep(SETTLE_TIME);
        debug!(address = self.address, odr_hz = odr.hz(), "Sensor configured");
        Ok(())
    }

    /// One X/Y/Z reading stamped with `timestamp`.
    pub fn read<B: I2c>(&self, bus: &mut B, timestamp: f64) -> Result<Sample, SensorError> {
        let mut raw = [0u8; OUTPUT_BLOCK_LEN];
        bus.write_read(self.address, &[OUT_X_L | AUTO_INCREMENT], &mut raw)
            .map_err(|e| SensorError::transport(self.address, e))?;
        let [ax, ay, az] = decode_axes(&raw);
        Ok(Sample::new(timestamp, ax, ay, az))
    }

    /// Put the sensor in power-down mode.
    pub fn power_down<B: I2c>(&self, bus: &mut B) -> Result<(), SensorError> {
        self.write_register(bus, CTRL_REG1, CTRL1_POWER_DOWN)
    }

    fn read_register<B: I2c>(&self, bus: &mut B, register: u8) -> Result<u8, SensorError> {
        let mut value = [0u8; 1];
        bus.write_read(self.address, &[register], &mut value)
            .map_err(|e| SensorError::transport(self.address, e))?;
        Ok(value[0])
    }

    fn write_register<B: I2c>(&self, bus: &mut B, register: u8, value: u8) -> Result<(), SensorError> {
        bus.write(self.address, &[register, value])
            .map_err(|e| SensorError::transport(self.address, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockI2cBus;
    use crate::registers::{CTRL_REG1, CTRL_REG4};

    #[test]
    fn test_decode_axes() {
        // 16 counts << 4 = 0x0100 -> 16 * 0.049 g
        let raw = [0x00, 0x01, 0xF0, 0xFF, 0x00, 0x00];
        let [x, y, z] = decode_axes(&raw);
        assert!((x - 0.784).abs() < 1e-5);
        assert!((y + 0.049).abs() < 1e-6);
        assert_eq!(z, 0.0);
    }

    #[test]
    fn test_decode_full_scale() {
        // 0x7FF0 >> 4 = 2047 counts
        let raw = [0xF0, 0x7F, 0x00, 0x80, 0x00, 0x00];
        let [x, y, _] = decode_axes(&raw);
        assert!((x - 100.303).abs() < 1e-3);
        assert!((y + 100.352).abs() < 1e-3);
    }

    #[test]
    fn test_probe_and_mismatch() {
        let mut bus = MockI2cBus::new();
        bus.add_sensor(0x19);
        bus.add_sensor(0x18);
        bus.set_who_am_i(0x18, 0x33);

        H3lis331::new(0x19).probe(&mut bus).unwrap();
        let err = H3lis331::new(0x18).probe(&mut bus).unwrap_err();
        assert!(matches!(
            err,
            SensorError::IdentityMismatch {
                address: 0x18,
                found: 0x33
            }
        ));

        let absent = H3lis331::new(0x20).probe(&mut bus).unwrap_err();
        assert!(absent.is_transport());
    }

    #[test]
    fn test_identify_never_fails() {
        let mut bus = MockI2cBus::new();
        assert!(!H3lis331::new(0x19).identify(&mut bus));
        bus.add_sensor(0x19);
        assert!(H3lis331::new(0x19).identify(&mut bus));
    }

    #[test]
    fn test_configure_writes() {
        let mut bus = MockI2cBus::new();
        bus.add_sensor(0x19);
        H3lis331::new(0x19).configure(&mut bus, 1000).unwrap();

        assert_eq!(bus.register(0x19, CTRL_REG1), Some(0x3F));
        assert_eq!(bus.register(0x19, CTRL_REG4), Some(0x80));
        assert_eq!(bus.writes(0x19).len(), 4);
    }

    #[test]
    fn test_read_and_power_down() {
        let mut bus = MockI2cBus::new();
        bus.add_sensor(0x19);
        bus.set_axes_g(0x19, [0.0, 0.0, 1.0]);

        let sensor = H3lis331::new(0x19);
        let sample = sensor.read(&mut bus, 42.5).unwrap();
        assert_eq!(sample.timestamp, 42.5);
        assert!((sample.az - 0.98).abs() < 0.05);

        sensor.power_down(&mut bus).unwrap();
        assert_eq!(bus.register(0x19, CTRL_REG1), Some(0x07));
    }

    #[test]
    fn test_read_failure_is_transport() {
        let mut bus = MockI2cBus::new();
        bus.add_sensor(0x19);
        bus.fail_next(1);
        let sensor = H3lis331::new(0x19);
        assert!(sensor.read(&mut bus, 0.0).unwrap_err().is_transport());
        assert!(sensor.read(&mut bus, 0.0).is_ok());
    }
}
