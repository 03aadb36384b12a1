//! Gas sensor variants and their static compensation tables
//!
//! Every electrochemical sensor variant needs its own potentiostat front-end
//! configuration and its own temperature compensation coefficients. Both are
//! looked up from the [`GasType`] so a missing variant is a compile error
//! rather than an out-of-bounds table read.

use serde::{Deserialize, Serialize};

use crate::concentration::{TEMPERATURE_THRESHOLD_SPAN, TEMPERATURE_THRESHOLD_ZERO};

/// Electrochemical sensor variant fitted to the device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum GasType {
    /// Carbon monoxide
    #[default]
    Co = 0,
    /// Ethanol
    EtOh = 1,
    /// Hydrogen sulfide
    H2s = 2,
    /// Sulfur dioxide
    So2 = 3,
    /// Nitrogen dioxide
    No2 = 4,
    /// Ozone
    O3 = 5,
    /// Indoor air quality
    Iaq = 6,
    /// Respiratory irritants
    Resp = 7,
    /// Ozone / nitrogen dioxide
    O3No2 = 8,
}

impl GasType {
    pub const ALL: [GasType; 9] = [
        Self::Co,
        Self::EtOh,
        Self::H2s,
        Self::So2,
        Self::No2,
        Self::O3,
        Self::Iaq,
        Self::Resp,
        Self::O3No2,
    ];

    /// Wire code of this variant.
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Co),
            1 => Some(Self::EtOh),
            2 => Some(Self::H2s),
            3 => Some(Self::So2),
            4 => Some(Self::No2),
            5 => Some(Self::O3),
            6 => Some(Self::Iaq),
            7 => Some(Self::Resp),
            8 => Some(Self::O3No2),
            _ => None,
        }
    }

    /// Temperature compensation coefficients of this sensor variant.
    pub const fn compensation(self) -> Compensation {
        match self {
            Self::Co => Compensation::new(0.0, 2.375, 0.6, 0.4),
            Self::EtOh => Compensation::new(1.7, 22.5, 1.2, 0.0),
            Self::H2s => Compensation::new(0.0, 0.0, 0.3, 0.0),
            Self::So2 => Compensation::new(0.0, 15.0, 1.2, 0.5),
            Self::No2 => Compensation::new(0.0, -1.6, 0.0, 0.4),
            Self::O3 => Compensation::new(0.0, 0.0, 0.0, 0.5),
            Self::Iaq | Self::Resp | Self::O3No2 => Compensation::new(0.0, 0.0, 0.0, 0.0),
        }
    }

    /// LMP91000 register values for this sensor variant.
    pub const fn front_end(self) -> FrontEndConfig {
        match self {
            Self::Co => FrontEndConfig::new(0x0F, 145, 3),
            Self::EtOh => FrontEndConfig::new(27, 147, 3),
            Self::H2s => FrontEndConfig::new(0x0F, 144, 3),
            Self::So2 => FrontEndConfig::new(0x0F, 182, 3),
            Self::No2 => FrontEndConfig::new(0x0F, 166, 3),
            Self::O3 => FrontEndConfig::new(0x0F, 161, 3),
            Self::Iaq => FrontEndConfig::new(0x0F, 149, 3),
            Self::Resp => FrontEndConfig::new(0x0F, 166, 3),
            Self::O3No2 => FrontEndConfig::new(0x0F, 161, 3),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Co => "CO",
            Self::EtOh => "EtOH",
            Self::H2s => "H2S",
            Self::So2 => "SO2",
            Self::No2 => "NO2",
            Self::O3 => "O3",
            Self::Iaq => "IAQ",
            Self::Resp => "RESP",
            Self::O3No2 => "O3/NO2",
        }
    }
}

impl TryFrom<u8> for GasType {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or(code)
    }
}

/// Two-segment temperature compensation coefficients.
///
/// The low segment applies below 25.0 °C, the high segment at or above it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensation {
    pub zero_low: f64,
    pub zero_high: f64,
    pub span_low: f64,
    pub span_high: f64,
}

impl Compensation {
    pub const fn new(zero_low: f64, zero_high: f64, span_low: f64, span_high: f64) -> Self {
        Self {
            zero_low,
            zero_high,
            span_low,
            span_high,
        }
    }

    /// Zero and span coefficients in effect at `temperature`, given in
    /// hundredths of a degree Celsius.
    pub fn select(&self, temperature: i16) -> (f64, f64) {
        let t = f64::from(temperature) / 100.0;
        let zero = if t < TEMPERATURE_THRESHOLD_ZERO {
            self.zero_low
        } else {
            self.zero_high
        };
        let span = if t < TEMPERATURE_THRESHOLD_SPAN {
            self.span_low
        } else {
            self.span_high
        };
        (zero, span)
    }
}

/// LMP91000 configuration row: TIACN, REFCN and MODECN register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontEndConfig {
    pub tiacn: u8,
    pub refcn: u8,
    pub modecn: u8,
}

impl FrontEndConfig {
    pub const fn new(tiacn: u8, refcn: u8, modecn: u8) -> Self {
        Self {
            tiacn,
            refcn,
            modecn,
        }
    }

    /// TIA gain selected by bits 4:2 of TIACN.
    pub const fn tia_gain(&self) -> TiaGain {
        TiaGain::from_code((self.tiacn & 0b0001_1100) >> 2)
    }
}

/// Transimpedance amplifier gain setting of the potentiostat.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TiaGain {
    /// External feedback resistor
    #[default]
    External = 0,
    R2k75 = 1,
    R3k5 = 2,
    R7k = 3,
    R14k = 4,
    R35k = 5,
    R120k = 6,
    R350k = 7,
}

impl TiaGain {
    /// Gain code, 0 to 7.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes the low three bits of `code`.
    pub const fn from_code(code: u8) -> Self {
        match code & 0x07 {
            0 => Self::External,
            1 => Self::R2k75,
            2 => Self::R3k5,
            3 => Self::R7k,
            4 => Self::R14k,
            5 => Self::R35k,
            6 => Self::R120k,
            _ => Self::R350k,
        }
    }

    /// Measured feedback resistance in ohms.
    pub const fn resistance_ohms(self) -> u32 {
        match self {
            Self::External => 499_000,
            Self::R2k75 => 2735,
            Self::R3k5 => 3476,
            Self::R7k => 6903,
            Self::R14k => 13618,
            Self::R35k => 32706,
            Self::R120k => 96737,
            Self::R350k => 205713,
        }
    }
}
