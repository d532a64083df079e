//! `ACLB` binary raw file layout.
//!
//! All fields are little-endian.
//!
//! ```text
//! Header (22 bytes)
//!   4B  magic         "ACLB"
//!   1B  version       1
//!   1B  bus           i2c bus number
//!   1B  address       sensor address
//!   1B  full_scale_g  100 (±100 g)
//!   2B  sample_rate   u16, Hz
//!   4B  sensitivity   f32, g per count
//!   8B  start_ts      f64, timestamp of the first record
//!
//! Record (20 bytes)
//!   8B  timestamp     f64
//!   4B  ax            f32
//!   4B  ay            f32
//!   4B  az            f32
//! ```
//!
//! A complete file is always `HEADER_SIZE + RECORD_SIZE * n` bytes.

use bytes::{Buf, BufMut};

use crate::error::{FormatError, FormatResult};
use crate::sample::Sample;

/// File magic.
pub const MAGIC: [u8; 4] = *b"ACLB";
/// Current format version.
pub const VERSION: u8 = 1;
/// Header length in bytes.
pub const HEADER_SIZE: usize = 22;
/// Record length in bytes.
pub const RECORD_SIZE: usize = 20;

/// Decoded raw file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    /// I2C bus number
    pub bus: u8,
    /// Sensor address
    pub address: u8,
    /// Configured full-scale range in g
    pub full_scale_g: u8,
    /// Declared sample rate in Hz
    pub sample_rate_hz: u16,
    /// Calibration factor (g per count)
    pub sensitivity_g_per_count: f32,
    /// Timestamp of the first record in this file
    pub start_timestamp: f64,
}

impl FileHeader {
    /// Append the 22-byte header to `buf`.
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_slice(&MAGIC);
        buf.put_u8(VERSION);
        buf.put_u8(self.bus);
        buf.put_u8(self.address);
        buf.put_u8(self.full_scale_g);
        buf.put_u16_le(self.sample_rate_hz);
        buf.put_f32_le(self.sensitivity_g_per_count);
        buf.put_f64_le(self.start_timestamp);
    }

    /// Encode to a fixed array.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        self.encode(&mut &mut out[..]);
        out
    }

    /// Decode and validate a header, consuming 22 bytes from `buf`.
    pub fn decode<B: Buf>(buf: &mut B) -> FormatResult<Self> {
        if buf.remaining() < HEADER_SIZE {
            return Err(FormatError::TooSmall {
                size: buf.remaining(),
                expected: HEADER_SIZE,
            });
        }

        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(FormatError::BadMagic { found: magic });
        }

        let version = buf.get_u8();
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion { version });
        }

        Ok(Self {
            bus: buf.get_u8(),
            address: buf.get_u8(),
            full_scale_g: buf.get_u8(),
            sample_rate_hz: buf.get_u16_le(),
            sensitivity_g_per_count: buf.get_f32_le(),
            start_timestamp: buf.get_f64_le(),
        })
    }
}

/// Append one 20-byte record to `buf`.
pub fn encode_record<B: BufMut>(sample: &Sample, buf: &mut B) {
    buf.put_f64_le(sample.timestamp);
    buf.put_f32_le(sample.ax);
    buf.put_f32_le(sample.ay);
    buf.put_f32_le(sample.az);
}

/// Encode one record to a fixed array.
pub fn record_bytes(sample: &Sample) -> [u8; RECORD_SIZE] {
    let mut out = [0u8; RECORD_SIZE];
    encode_record(sample, &mut &mut out[..]);
    out
}

/// Decode every complete record in `buf`.
///
/// Trailing bytes that do not form a whole record are ignored; the number of
/// ignored bytes is returned alongside the samples.
pub fn decode_records<B: Buf>(buf: &mut B) -> (Vec<Sample>, usize) {
    let n = buf.remaining() / RECORD_SIZE;
    let mut samples = Vec::with_capacity(n);
    for _ in 0..n {
        let timestamp = buf.get_f64_le();
        let ax = buf.get_f32_le();
        let ay = buf.get_f32_le();
        let az = buf.get_f32_le();
        samples.push(Sample::new(timestamp, ax, ay, az));
    }
    (samples, buf.remaining())
}

/// Whether `len` is a size a complete (sealed) raw file can have.
pub fn is_complete_length(len: u64) -> bool {
    len >= HEADER_SIZE as u64 && (len - HEADER_SIZE as u64) % RECORD_SIZE as u64 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> FileHeader {
        FileHeader {
            bus: 3,
            address: 0x19,
            full_scale_g: 100,
            sample_rate_hz: 1000,
            sensitivity_g_per_count: 0.049,
            start_timestamp: 1_770_773_050.123_4,
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = header().to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"ACLB");
        assert_eq!(bytes[4], 1);
        assert_eq!(bytes[5], 3);
        assert_eq!(bytes[6], 0x19);
        assert_eq!(bytes[7], 100);
        assert_eq!(u16::from_le_bytes([bytes[8], bytes[9]]), 1000);
    }

    #[test]
    fn test_file_round_trip() {
        let samples = vec![
            Sample::new(1_770_773_050.0, 0.049, -0.098, 1.0),
            Sample::new(1_770_773_050.001, 15.5, 0.0, -99.9),
            Sample::new(1_770_773_050.002, f32::MIN_POSITIVE, 0.0, 0.0),
        ];
        let mut buf = Vec::new();
        header().encode(&mut buf);
        for s in &samples {
            encode_record(s, &mut buf);
        }
        assert_eq!(buf.len(), HEADER_SIZE + RECORD_SIZE * samples.len());
        assert!(is_complete_length(buf.len() as u64));

        let mut cursor = &buf[..];
        let decoded = FileHeader::decode(&mut cursor).unwrap();
        assert_eq!(decoded, header());
        let (records, leftover) = decode_records(&mut cursor);
        assert_eq!(leftover, 0);
        assert_eq!(records, samples);
    }

    #[test]
    fn test_partial_record_is_ignored() {
        let mut buf = Vec::new();
        encode_record(&Sample::new(1.0, 1.0, 2.0, 3.0), &mut buf);
        buf.extend_from_slice(&[0u8; 7]);
        let (records, leftover) = decode_records(&mut &buf[..]);
        assert_eq!(records.len(), 1);
        assert_eq!(leftover, 7);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = header().to_bytes();
        bytes[0] = b'X';
        let err = FileHeader::decode(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, FormatError::BadMagic { .. }));
    }

    #[test]
    fn test_bad_version() {
        let mut bytes = header().to_bytes();
        bytes[4] = 2;
        let err = FileHeader::decode(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, FormatError::UnsupportedVersion { version: 2 }));
    }

    #[test]
    fn test_too_small() {
        let bytes = [0u8; 10];
        let err = FileHeader::decode(&mut &bytes[..]).unwrap_err();
        assert!(matches!(err, FormatError::TooSmall { size: 10, .. }));
    }

    #[test]
    fn test_complete_length() {
        assert!(!is_complete_length(0));
        assert!(is_complete_length(22));
        assert!(is_complete_length(42));
        assert!(!is_complete_length(43));
    }
}
