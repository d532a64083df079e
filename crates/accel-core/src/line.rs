//! Text line format shared by the live stream and event files.
//!
//! `timestamp,bus,address,ax,ay,az` with the timestamp to 4 decimals, the
//! address as `0x` + two hex digits and each axis to 3 decimals:
//!
//! ```text
//! 1770778924.1234,0,0x19,0.049,-0.098,1.029
//! ```

use std::fmt::Write as _;

use crate::error::{FormatError, FormatResult};
use crate::sample::Sample;

/// One sample tagged with its sensor's bus and address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleLine {
    /// I2C bus number
    pub bus: u8,
    /// Sensor address
    pub address: u8,
    /// The reading
    pub sample: Sample,
}

impl SampleLine {
    /// Tag a sample with its origin.
    pub fn new(bus: u8, address: u8, sample: Sample) -> Self {
        Self {
            bus,
            address,
            sample,
        }
    }

    /// Append the line, including the trailing newline, to `out`.
    pub fn write_to(&self, out: &mut String) {
        let s = &self.sample;
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{:.4},{},0x{:02x},{:.3},{:.3},{:.3}",
            s.timestamp, self.bus, self.address, s.ax, s.ay, s.az
        );
    }

    /// Format the line, including the trailing newline.
    pub fn to_line(&self) -> String {
        let mut out = String::with_capacity(48);
        self.write_to(&mut out);
        out
    }

    /// Parse one line (with or without the trailing newline).
    ///
    /// The address accepts `0x19`, `0x019` or plain hex digits.
    pub fn parse(line: &str) -> FormatResult<Self> {
        let malformed = |message: String| FormatError::MalformedLine { message };

        let fields: Vec<&str> = line.trim_end().split(',').collect();
        if fields.len() != 6 {
            return Err(malformed(format!("expected 6 fields, got {}", fields.len())));
        }

        let timestamp: f64 = fields[0]
            .parse()
            .map_err(|e| malformed(format!("timestamp '{}': {e}", fields[0])))?;
        let bus: u8 = fields[1]
            .parse()
            .map_err(|e| malformed(format!("bus '{}': {e}", fields[1])))?;
        let addr_digits = fields[2].trim_start_matches("0x");
        let address = u8::from_str_radix(addr_digits, 16)
            .map_err(|e| malformed(format!("address '{}': {e}", fields[2])))?;

        let mut axes = [0f32; 3];
        for (axis, field) in axes.iter_mut().zip(&fields[3..]) {
            *axis = field
                .parse()
                .map_err(|e| malformed(format!("axis '{field}': {e}")))?;
        }

        Ok(Self::new(
            bus,
            address,
            Sample::new(timestamp, axes[0], axes[1], axes[2]),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let line = SampleLine::new(0, 0x19, Sample::new(1_770_778_924.123_4, 0.049, -0.098, 15.0));
        assert_eq!(line.to_line(), "1770778924.1234,0,0x19,0.049,-0.098,15.000\n");
    }

    #[test]
    fn test_address_zero_padded() {
        let line = SampleLine::new(3, 0x08, Sample::new(1.0, 0.0, 0.0, 0.0));
        assert!(line.to_line().contains(",3,0x08,"));
    }

    #[test]
    fn test_parse_round_trips_to_declared_precision() {
        let original = SampleLine::new(0, 0x18, Sample::new(1_770_778_924.5, 1.234, -9.876, 0.5));
        let parsed = SampleLine::parse(&original.to_line()).unwrap();
        assert_eq!(parsed.bus, 0);
        assert_eq!(parsed.address, 0x18);
        assert!((parsed.sample.timestamp - 1_770_778_924.5).abs() < 1e-4);
        assert!((parsed.sample.ax - 1.234).abs() < 1e-3);
        assert!((parsed.sample.ay + 9.876).abs() < 1e-3);
        assert_eq!(parsed.to_line(), original.to_line());
    }

    #[test]
    fn test_parse_rejects_short_line() {
        assert!(SampleLine::parse("1.0,0,0x19,1.0").is_err());
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        assert!(SampleLine::parse("1.0,0,0xzz,1.0,1.0,1.0").is_err());
    }
}
