//! Peripheral drivers for the three devices on the measurement bus
//!
//! Every driver follows the same contract: [`Sensor::init`] writes the fixed
//! configuration sequence once, and [`Sensor::poll`] is called on every
//! scheduler tick but only talks to the bus once its own interval has
//! elapsed. A failed transaction leaves [`LiveState`] untouched and is
//! retried on the next eligible tick.

mod hdc1080;
mod lmp91000;
mod mcp3423;

pub use hdc1080::*;
pub use lmp91000::*;
pub use mcp3423::*;

use embassy_time::Instant;
use embedded_hal::i2c::ErrorKind;
use log::warn;
use thiserror_no_std::Error;

use crate::app_state::LiveState;

/// Failure of a single driver transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("{sensor}: I2C {operation} failed ({kind})")]
    I2c {
        sensor: &'static str,
        operation: &'static str,
        kind: ErrorKind,
    },
}

impl SensorError {
    /// Wrap a bus error, logging it with the sensor and operation that hit it.
    pub fn i2c<E: embedded_hal::i2c::Error>(
        sensor: &'static str,
        operation: &'static str,
        error: E,
    ) -> Self {
        let kind = error.kind();
        warn!("{}: I2C {} failed: {:?}", sensor, operation, kind);
        Self::I2c {
            sensor,
            operation,
            kind,
        }
    }

    pub const fn sensor(&self) -> &'static str {
        match self {
            Self::I2c { sensor, .. } => *sensor,
        }
    }
}

/// Result of one [`Sensor::poll`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The sensor interval has not elapsed yet
    NotDue,
    /// A conversion is in progress; the result is collected on a later tick
    Pending,
    /// LiveState was updated with a fresh sample
    Updated,
    /// The device had no new sample; LiveState is unchanged
    Stale,
}

/// A peripheral driver polled by the scheduler.
pub trait Sensor {
    /// Short device name used in log messages and errors.
    const NAME: &'static str;

    /// Write the configuration sequence of the device.
    fn init(&mut self, state: &mut LiveState) -> Result<(), SensorError>;

    /// Run one rate-limited measurement step.
    fn poll(&mut self, now: Instant, state: &mut LiveState) -> Result<PollOutcome, SensorError>;
}
