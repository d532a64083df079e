//! Register map and fixed settings.

/// Device identification register.
pub const WHO_AM_I: u8 = 0x0F;
/// Value `WHO_AM_I` returns on a genuine H3LIS331DL.
pub const WHO_AM_I_VALUE: u8 = 0x32;

/// Power mode, data rate and axis enables.
pub const CTRL_REG1: u8 = 0x20;
/// High-pass filter configuration.
pub const CTRL_REG2: u8 = 0x21;
/// Interrupt configuration.
pub const CTRL_REG3: u8 = 0x22;
/// Block data update and full-scale selection.
pub const CTRL_REG4: u8 = 0x23;

/// First output register (X low byte); X/Y/Z follow as L/H pairs.
pub const OUT_X_L: u8 = 0x28;
/// Set on the register address to auto-increment through a block read.
pub const AUTO_INCREMENT: u8 = 0x80;
/// Bytes in one X/Y/Z block.
pub const OUTPUT_BLOCK_LEN: usize = 6;

/// CTRL_REG1 power-mode bits for normal mode.
pub const CTRL1_NORMAL_MODE: u8 = 0x20;
/// CTRL_REG1 X, Y and Z enable bits.
pub const CTRL1_XYZ_ENABLE: u8 = 0x07;
/// CTRL_REG1 value that powers the sensor down (axes left enabled).
pub const CTRL1_POWER_DOWN: u8 = CTRL1_XYZ_ENABLE;

/// CTRL_REG4: block data update on, ±100 g full scale.
pub const CTRL4_BDU_100G: u8 = 0x80;

/// Configured full-scale range in g.
pub const FULL_SCALE_G: u8 = 100;
/// Calibration at ±100 g: 49 mg per count (12-bit left-justified data).
pub const SENSITIVITY_G_PER_COUNT: f32 = 0.049;

/// Output data rate selected in CTRL_REG1 (DR1:DR0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OutputDataRate {
    /// 50 Hz
    Hz50 = 0b00,
    /// 100 Hz
    Hz100 = 0b01,
    /// 400 Hz
    Hz400 = 0b10,
    /// 1000 Hz
    Hz1000 = 0b11,
}

impl OutputDataRate {
    const ALL: [Self; 4] = [Self::Hz50, Self::Hz100, Self::Hz400, Self::Hz1000];

    /// Slowest data rate that still keeps up with `sample_rate_hz`.
    ///
    /// Rates above 1000 Hz saturate at [`OutputDataRate::Hz1000`].
    pub fn for_sample_rate(sample_rate_hz: u16) -> Self {
        Self::ALL
            .into_iter()
            .find(|odr| odr.hz() >= sample_rate_hz)
            .unwrap_or(Self::Hz1000)
    }

    /// Rate in Hz.
    pub fn hz(self) -> u16 {
        match self {
            Self::Hz50 => 50,
            Self::Hz100 => 100,
            Self::Hz400 => 400,
            Self::Hz1000 => 1000,
        }
    }

    /// CTRL_REG1 value: normal mode, this data rate, all axes enabled.
    pub fn ctrl_reg1(self) -> u8 {
        CTRL1_NORMAL_MODE | ((self as u8) << 3) | CTRL1_XYZ_ENABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_selection() {
        assert_eq!(OutputDataRate::for_sample_rate(1), OutputDataRate::Hz50);
        assert_eq!(OutputDataRate::for_sample_rate(50), OutputDataRate::Hz50);
        assert_eq!(OutputDataRate::for_sample_rate(51), OutputDataRate::Hz100);
        assert_eq!(OutputDataRate::for_sample_rate(400), OutputDataRate::Hz400);
        assert_eq!(OutputDataRate::for_sample_rate(500), OutputDataRate::Hz1000);
        assert_eq!(OutputDataRate::for_sample_rate(5000), OutputDataRate::Hz1000);
    }

    #[test]
    fn test_ctrl_reg1_values() {
        assert_eq!(OutputDataRate::Hz1000.ctrl_reg1(), 0x3F);
        assert_eq!(OutputDataRate::Hz50.ctrl_reg1(), 0x27);
        assert_eq!(CTRL1_POWER_DOWN, 0x07);
    }
}
