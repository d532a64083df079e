//! File naming conventions.
//!
//! | Kind  | Final name                                   |
//! |-------|----------------------------------------------|
//! | Raw   | `accel_bus0_0x19_1770773050.dat`             |
//! | Event | `accel_bus0_0x19_event_1770778924.dat`       |
//!
//! Both are staged as `<final>.tmp` while being written. Names that would
//! collide with an existing sealed file get a `-<n>` sequence suffix on the
//! timestamp (`accel_bus0_0x19_1770773050-1.dat`). As text the suffixed name
//! sorts before the base name; order parsed names instead.

use std::fmt;
use std::path::{Path, PathBuf};

/// Suffix appended to a final name while the file is still being written.
pub const TMP_SUFFIX: &str = ".tmp";

const PREFIX: &str = "accel";
const EXTENSION: &str = ".dat";

/// Integer part of a unix timestamp, as used in file names.
fn ts_int(timestamp: f64) -> u64 {
    if timestamp.is_finite() && timestamp > 0.0 {
        timestamp.trunc() as u64
    } else {
        0
    }
}

fn parse_bus(field: &str) -> Option<u8> {
    field.strip_prefix("bus")?.parse().ok()
}

fn parse_address(field: &str) -> Option<u8> {
    let digits = field.strip_prefix("0x")?;
    if digits.len() != 2 {
        return None;
    }
    u8::from_str_radix(digits, 16).ok()
}

/// `1770773050` or `1770773050-2`
fn parse_ts_and_sequence(field: &str) -> Option<(u64, u32)> {
    match field.split_once('-') {
        Some((ts, seq)) => Some((ts.parse().ok()?, seq.parse().ok()?)),
        None => Some((field.parse().ok()?, 0)),
    }
}

fn stem_of(name: &str) -> Option<&str> {
    name.strip_suffix(EXTENSION)
}

/// Staging path for a final path (`<final>.tmp`).
pub fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut os = final_path.as_os_str().to_owned();
    os.push(TMP_SUFFIX);
    PathBuf::from(os)
}

/// Name of a sealed raw sample file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawFileName {
    /// I2C bus number
    pub bus: u8,
    /// Sensor address
    pub address: u8,
    /// Integer part of the first sample's timestamp
    pub start_ts: u64,
    /// Collision sequence (0 = no suffix)
    pub sequence: u32,
}

impl RawFileName {
    /// Name for a file whose first sample has `start_timestamp`.
    pub fn new(bus: u8, address: u8, start_timestamp: f64) -> Self {
        Self {
            bus,
            address,
            start_ts: ts_int(start_timestamp),
            sequence: 0,
        }
    }

    /// Same name with a collision sequence suffix.
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Parse a sealed raw file name.
    ///
    /// Returns `None` for staging (`.tmp`) names, event files and anything
    /// else that does not follow the convention.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = stem_of(name)?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 4 || parts[0] != PREFIX {
            return None;
        }
        let (start_ts, sequence) = parse_ts_and_sequence(parts[3])?;
        Some(Self {
            bus: parse_bus(parts[1])?,
            address: parse_address(parts[2])?,
            start_ts,
            sequence,
        })
    }

    /// Final file name.
    pub fn file_name(&self) -> String {
        self.to_string()
    }

    /// Staging file name.
    pub fn tmp_file_name(&self) -> String {
        format!("{self}{TMP_SUFFIX}")
    }
}

impl fmt::Display for RawFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}_bus{}_0x{:02x}_{}",
            self.bus, self.address, self.start_ts
        )?;
        if self.sequence > 0 {
            write!(f, "-{}", self.sequence)?;
        }
        f.write_str(EXTENSION)
    }
}

/// Name of a sealed event CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EventFileName {
    /// I2C bus number
    pub bus: u8,
    /// Sensor address
    pub address: u8,
    /// Integer part of the first trigger's timestamp
    pub trigger_ts: u64,
    /// Collision sequence (0 = no suffix)
    pub sequence: u32,
}

impl EventFileName {
    /// Name for an event first triggered at `trigger_timestamp`.
    pub fn new(bus: u8, address: u8, trigger_timestamp: f64) -> Self {
        Self {
            bus,
            address,
            trigger_ts: ts_int(trigger_timestamp),
            sequence: 0,
        }
    }

    /// Same name with a collision sequence suffix.
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Parse a sealed event file name.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = stem_of(name)?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 5 || parts[0] != PREFIX || parts[3] != "event" {
            return None;
        }
        let (trigger_ts, sequence) = parse_ts_and_sequence(parts[4])?;
        Some(Self {
            bus: parse_bus(parts[1])?,
            address: parse_address(parts[2])?,
            trigger_ts,
            sequence,
        })
    }

    /// Final file name.
    pub fn file_name(&self) -> String {
        self.to_string()
    }

    /// Staging file name.
    pub fn tmp_file_name(&self) -> String {
        format!("{self}{TMP_SUFFIX}")
    }
}

impl fmt::Display for EventFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}_bus{}_0x{:02x}_event_{}",
            self.bus, self.address, self.trigger_ts
        )?;
        if self.sequence > 0 {
            write!(f, "-{}", self.sequence)?;
        }
        f.write_str(EXTENSION)
    }
}
