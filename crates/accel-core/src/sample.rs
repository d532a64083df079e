//! Sample and sensor identity types.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// One calibrated 3-axis acceleration reading.
///
/// Timestamps are unix seconds; acceleration is in g.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Unix timestamp in seconds
    pub timestamp: f64,
    /// X-axis acceleration (g)
    pub ax: f32,
    /// Y-axis acceleration (g)
    pub ay: f32,
    /// Z-axis acceleration (g)
    pub az: f32,
}

impl Sample {
    /// Create a new sample.
    pub fn new(timestamp: f64, ax: f32, ay: f32, az: f32) -> Self {
        Self {
            timestamp,
            ax,
            ay,
            az,
        }
    }

    /// Vector magnitude `sqrt(ax² + ay² + az²)` in g.
    pub fn magnitude(&self) -> f64 {
        let (x, y, z) = (self.ax as f64, self.ay as f64, self.az as f64);
        (x * x + y * y + z * z).sqrt()
    }
}

/// A physical sensor: one address on one I2C bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorIdentity {
    /// I2C bus number (`/dev/i2c-<bus>`)
    pub bus: u8,
    /// 7-bit I2C address
    pub address: u8,
    /// Human label used in logs (e.g. "A")
    pub label: String,
}

impl SensorIdentity {
    /// Create a new identity.
    pub fn new(bus: u8, address: u8, label: impl Into<String>) -> Self {
        Self {
            bus,
            address,
            label: label.into(),
        }
    }
}

impl fmt::Display for SensorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] bus{} 0x{:02x}", self.label, self.bus, self.address)
    }
}

/// Current wall-clock time as unix seconds.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude() {
        let s = Sample::new(0.0, 3.0, 4.0, 0.0);
        assert!((s.magnitude() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_identity_display() {
        let id = SensorIdentity::new(3, 0x18, "B");
        assert_eq!(id.to_string(), "[B] bus3 0x18");
    }
}
