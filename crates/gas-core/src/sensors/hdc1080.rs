//! HDC1080 humidity and temperature sensor
//!
//! Measurements are two-phase. Writing the temperature register pointer
//! starts a combined temperature and humidity conversion; four bytes can be
//! read once the conversion time has passed. The driver never waits for the
//! conversion itself: it returns [`PollOutcome::Pending`] and collects the
//! result on a later tick.

use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c;
use log::{debug, info};

use super::{PollOutcome, Sensor, SensorError};
use crate::app_state::LiveState;
use crate::time::{Cadence, is_elapsed};

pub const REG_TEMPERATURE: u8 = 0x00;
pub const REG_CONFIGURATION: u8 = 0x02;

/// Temperature and humidity acquired in sequence, 14-bit resolution each.
const CONFIGURATION: u16 = 0x1000;

/// Convert a raw temperature word to degrees Celsius scaled by 100.
///
/// `raw * 165 / 65536 - 40`, evaluated in hundredths and truncated.
pub fn raw_to_centidegrees(raw: u16) -> i16 {
    (i32::from(raw) * 16500 / 65536 - 4000) as i16
}

/// Convert a raw humidity word to percent relative humidity scaled by 100.
///
/// `raw * 100 / 65536`, evaluated in hundredths and truncated.
pub fn raw_to_centipercent(raw: u16) -> u16 {
    (u32::from(raw) * 10000 / 65536) as u16
}

pub struct Hdc1080<I> {
    i2c: I,
    address: u8,
    cadence: Cadence,
    conversion_time: Duration,
    conversion_started: Option<Instant>,
}

impl<I: I2c> Hdc1080<I> {
    pub fn new(i2c: I, address: u8, interval: Duration, conversion_time: Duration) -> Self {
        Self {
            i2c,
            address,
            cadence: Cadence::new(interval),
            conversion_time,
            conversion_started: None,
        }
    }

    /// Whether a triggered conversion has not been collected yet.
    pub fn is_converting(&self) -> bool {
        self.conversion_started.is_some()
    }

    fn trigger(&mut self, now: Instant) -> Result<PollOutcome, SensorError> {
        self.cadence.mark(now);
        self.i2c
            .write(self.address, &[REG_TEMPERATURE])
            .map_err(|e| SensorError::i2c(Self::NAME, "trigger", e))?;
        self.conversion_started = Some(now);
        Ok(PollOutcome::Pending)
    }

    fn collect(&mut self, state: &mut LiveState) -> Result<PollOutcome, SensorError> {
        self.conversion_started = None;

        let mut data = [0u8; 4];
        self.i2c
            .read(self.address, &mut data)
            .map_err(|e| SensorError::i2c(Self::NAME, "read", e))?;

        let raw_temperature = u16::from_be_bytes([data[0], data[1]]);
        let raw_humidity = u16::from_be_bytes([data[2], data[3]]);
        state.temperature = raw_to_centidegrees(raw_temperature);
        state.humidity = raw_to_centipercent(raw_humidity);

        debug!(
            "{}: temperature {} cC, humidity {} c%",
            Self::NAME,
            state.temperature,
            state.humidity
        );
        Ok(PollOutcome::Updated)
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> Sensor for Hdc1080<I> {
    const NAME: &'static str = "HDC1080";

    fn init(&mut self, _state: &mut LiveState) -> Result<(), SensorError> {
        let [high, low] = CONFIGURATION.to_be_bytes();
        self.i2c
            .write(self.address, &[REG_CONFIGURATION, high, low])
            .map_err(|e| SensorError::i2c(Self::NAME, "configure", e))?;
        self.conversion_started = None;

        info!("{}: configured", Self::NAME);
        Ok(())
    }

    fn poll(&mut self, now: Instant, state: &mut LiveState) -> Result<PollOutcome, SensorError> {
        match self.conversion_started {
            Some(started) if is_elapsed(started, now, self.conversion_time) => self.collect(state),
            Some(_) => Ok(PollOutcome::Pending),
            None if self.cadence.is_due(now) => self.trigger(now),
            None => Ok(PollOutcome::NotDue),
        }
    }
}
