//! MCP3423 18-bit delta-sigma ADC
//!
//! The ADC runs in continuous conversion mode on channel 0. Every read
//! returns three data bytes followed by the configuration byte, whose top bit
//! is the not-ready flag: a set flag means the value was already read once
//! and is discarded.

use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c;
use log::{info, trace};

use super::{PollOutcome, Sensor, SensorError};
use crate::app_state::LiveState;
use crate::time::Cadence;

/// Channel 1, continuous conversion, 18 bit (3.75 SPS), PGA gain x1.
const CONFIGURATION: u8 = 0x1C;

/// Not-ready flag in the configuration byte.
const NOT_READY: u8 = 0x80;

/// Full scale of an 18-bit conversion.
pub const FULL_SCALE: u32 = (1 << 18) - 1;

/// Map an 18-bit register value onto the stored count.
///
/// The sensor current drives the input negative, so the count is inverted
/// against full scale: `(2^18 - 1) - raw`.
pub fn invert_count(raw: u32) -> i32 {
    (FULL_SCALE - (raw & FULL_SCALE)) as i32
}

pub struct Mcp3423<I> {
    i2c: I,
    address: u8,
    cadence: Cadence,
}

impl<I: I2c> Mcp3423<I> {
    pub fn new(i2c: I, address: u8, interval: Duration) -> Self {
        Self {
            i2c,
            address,
            cadence: Cadence::new(interval),
        }
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> Sensor for Mcp3423<I> {
    const NAME: &'static str = "MCP3423";

    fn init(&mut self, _state: &mut LiveState) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[CONFIGURATION])
            .map_err(|e| SensorError::i2c(Self::NAME, "configure", e))?;

        info!("{}: configured", Self::NAME);
        Ok(())
    }

    fn poll(&mut self, now: Instant, state: &mut LiveState) -> Result<PollOutcome, SensorError> {
        if !self.cadence.is_due(now) {
            return Ok(PollOutcome::NotDue);
        }
        self.cadence.mark(now);

        let mut data = [0u8; 4];
        self.i2c
            .read(self.address, &mut data)
            .map_err(|e| SensorError::i2c(Self::NAME, "read", e))?;

        if data[3] & NOT_READY != 0 {
            trace!("{}: sample not ready", Self::NAME);
            return Ok(PollOutcome::Stale);
        }

        let raw = (u32::from(data[0] & 0x03) << 16) | (u32::from(data[1]) << 8) | u32::from(data[2]);
        state.raw_adc_count = invert_count(raw);

        trace!("{}: raw 0x{:05x}, count {}", Self::NAME, raw, state.raw_adc_count);
        Ok(PollOutcome::Updated)
    }
}
