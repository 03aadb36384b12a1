//! Calibration record and its page layout
//!
//! | word | content                                             |
//! |------|-----------------------------------------------------|
//! | 0    | magic marker                                        |
//! | 1    | adc_count_zero                                      |
//! | 2    | temperature_zero                                    |
//! | 3    | humidity_zero                                       |
//! | 4    | compensation_zero_low                               |
//! | 5    | compensation_zero_high                              |
//! | 6    | ppm_span                                            |
//! | 7    | adc_count_span                                      |
//! | 8    | temperature_span                                    |
//! | 9    | humidity_span                                       |
//! | 10   | compensation_span_low                               |
//! | 11   | compensation_span_high                              |
//! | 12   | temperature_offset                                  |
//! | 13   | humidity_offset (bits 0-15), gas type (bits 16-23)  |
//! | 14   | sensitivity                                         |
//! | 15   | XOR of words 0 to 14                                |
//!
//! 16-bit signed fields are stored sign-extended. Any change to this table
//! is a new format and needs a new [`CALIBRATION_MAGIC`].

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use super::{PAGE_WORDS, Page, StorageError};
use crate::app_state::RequestError;
use crate::gas::GasType;

pub const CALIBRATION_MAGIC: u32 = 0x1234_5679;

const MAGIC_WORD: usize = 0;
const CHECKSUM_WORD: usize = PAGE_WORDS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CalibrationError {
    #[error("Bad calibration magic 0x{found:08x} (expected 0x{expected:08x})")]
    BadMagic { found: u32, expected: u32 },

    #[error("Bad calibration checksum 0x{stored:08x} (computed 0x{computed:08x})")]
    BadChecksum { stored: u32, computed: u32 },

    #[error("Unknown gas type code {0} in calibration record")]
    UnknownGasType(u8),

    /// A 16-bit field is not sign-extended or unused bits are set.
    #[error("Calibration page is not in canonical form")]
    NonCanonical,

    #[error("Calibration storage failed: {0}")]
    Storage(#[from] StorageError),
}

/// XOR-fold of `words`.
pub fn checksum(words: &[u32]) -> u32 {
    words.iter().fold(0, |acc, word| acc ^ word)
}

/// Zero and span reference points plus sensitivity of the fitted sensor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationRecord {
    pub adc_count_zero: u32,
    pub temperature_zero: i16,
    pub humidity_zero: i16,
    pub compensation_zero_low: i32,
    pub compensation_zero_high: i32,
    pub ppm_span: u32,
    pub adc_count_span: u32,
    pub temperature_span: i16,
    pub humidity_span: i16,
    pub compensation_span_low: i32,
    pub compensation_span_high: i32,
    pub temperature_offset: i16,
    pub humidity_offset: i16,
    pub gas_type: GasType,
    /// nA per ppm
    pub sensitivity: i32,
}

const fn from_i16(value: i16) -> u32 {
    value as i32 as u32
}

const fn to_i16(word: u32) -> i16 {
    word as i16
}

impl CalibrationRecord {
    /// Serialize into a page, magic and checksum included.
    pub fn to_page(&self) -> Page {
        let mut words = [0u32; PAGE_WORDS];
        words[MAGIC_WORD] = CALIBRATION_MAGIC;
        words[1] = self.adc_count_zero;
        words[2] = from_i16(self.temperature_zero);
        words[3] = from_i16(self.humidity_zero);
        words[4] = self.compensation_zero_low as u32;
        words[5] = self.compensation_zero_high as u32;
        words[6] = self.ppm_span;
        words[7] = self.adc_count_span;
        words[8] = from_i16(self.temperature_span);
        words[9] = from_i16(self.humidity_span);
        words[10] = self.compensation_span_low as u32;
        words[11] = self.compensation_span_high as u32;
        words[12] = from_i16(self.temperature_offset);
        words[13] = u32::from(self.humidity_offset as u16) | (u32::from(self.gas_type.code()) << 16);
        words[14] = self.sensitivity as u32;
        words[CHECKSUM_WORD] = checksum(&words[..CHECKSUM_WORD]);
        words
    }

    /// Validate and decode a page.
    pub fn from_page(words: &Page) -> Result<Self, CalibrationError> {
        if words[MAGIC_WORD] != CALIBRATION_MAGIC {
            return Err(CalibrationError::BadMagic {
                found: words[MAGIC_WORD],
                expected: CALIBRATION_MAGIC,
            });
        }

        let computed = checksum(&words[..CHECKSUM_WORD]);
        if words[CHECKSUM_WORD] != computed {
            return Err(CalibrationError::BadChecksum {
                stored: words[CHECKSUM_WORD],
                computed,
            });
        }

        let gas_code = ((words[13] >> 16) & 0xFF) as u8;
        let gas_type = GasType::from_code(gas_code).ok_or(CalibrationError::UnknownGasType(gas_code))?;

        let record = Self {
            adc_count_zero: words[1],
            temperature_zero: to_i16(words[2]),
            humidity_zero: to_i16(words[3]),
            compensation_zero_low: words[4] as i32,
            compensation_zero_high: words[5] as i32,
            ppm_span: words[6],
            adc_count_span: words[7],
            temperature_span: to_i16(words[8]),
            humidity_span: to_i16(words[9]),
            compensation_span_low: words[10] as i32,
            compensation_span_high: words[11] as i32,
            temperature_offset: to_i16(words[12]),
            humidity_offset: to_i16(words[13]),
            gas_type,
            sensitivity: words[14] as i32,
        };

        // Every accepted page is exactly what saving the record would write
        if record.to_page() != *words {
            return Err(CalibrationError::NonCanonical);
        }
        Ok(record)
    }
}

/// Calibration update as received from the transport layer.
///
/// Identical to [`CalibrationRecord`] except that the gas type is still the
/// raw wire code and has not been validated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationRequest {
    pub adc_count_zero: u32,
    pub temperature_zero: i16,
    pub humidity_zero: i16,
    pub compensation_zero_low: i32,
    pub compensation_zero_high: i32,
    pub ppm_span: u32,
    pub adc_count_span: u32,
    pub temperature_span: i16,
    pub humidity_span: i16,
    pub compensation_span_low: i32,
    pub compensation_span_high: i32,
    pub temperature_offset: i16,
    pub humidity_offset: i16,
    pub gas_type: u8,
    pub sensitivity: i32,
}

impl TryFrom<CalibrationRequest> for CalibrationRecord {
    type Error = RequestError;

    fn try_from(request: CalibrationRequest) -> Result<Self, Self::Error> {
        let gas_type = GasType::try_from(request.gas_type).map_err(RequestError::InvalidGasType)?;

        Ok(Self {
            adc_count_zero: request.adc_count_zero,
            temperature_zero: request.temperature_zero,
            humidity_zero: request.humidity_zero,
            compensation_zero_low: request.compensation_zero_low,
            compensation_zero_high: request.compensation_zero_high,
            ppm_span: request.ppm_span,
            adc_count_span: request.adc_count_span,
            temperature_span: request.temperature_span,
            humidity_span: request.humidity_span,
            compensation_span_low: request.compensation_span_low,
            compensation_span_high: request.compensation_span_high,
            temperature_offset: request.temperature_offset,
            humidity_offset: request.humidity_offset,
            gas_type,
            sensitivity: request.sensitivity,
        })
    }
}

impl From<CalibrationRecord> for CalibrationRequest {
    fn from(record: CalibrationRecord) -> Self {
        Self {
            adc_count_zero: record.adc_count_zero,
            temperature_zero: record.temperature_zero,
            humidity_zero: record.humidity_zero,
            compensation_zero_low: record.compensation_zero_low,
            compensation_zero_high: record.compensation_zero_high,
            ppm_span: record.ppm_span,
            adc_count_span: record.adc_count_span,
            temperature_span: record.temperature_span,
            humidity_span: record.humidity_span,
            compensation_span_low: record.compensation_span_low,
            compensation_span_high: record.compensation_span_high,
            temperature_offset: record.temperature_offset,
            humidity_offset: record.humidity_offset,
            gas_type: record.gas_type.code(),
            sensitivity: record.sensitivity,
        }
    }
}
