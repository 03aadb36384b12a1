//! Live device state and scheduler-level error types

mod sensors_state;

pub use sensors_state::*;

use thiserror_no_std::Error;

use crate::gas::{GasType, TiaGain};

/// Latest readings and the value derived from them.
///
/// There is exactly one instance, owned by the
/// [`PollScheduler`](crate::PollScheduler) and lent to each driver and to the
/// concentration engine in turn.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveState {
    pub gas_type: GasType,
    /// Latest 18-bit ADC count, already inverted into the positive range
    pub raw_adc_count: i32,
    /// Degrees Celsius scaled by 100
    pub temperature: i16,
    /// Relative humidity in percent scaled by 100
    pub humidity: u16,
    pub tia_gain: TiaGain,
    pub concentration_ppb: f64,
}

/// Progress of the [`PollScheduler`](crate::PollScheduler) state machine.
///
/// The scheduler moves strictly forward and stays in `Running` until reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the slowest peripheral to power up
    PowerupWait,
    /// Writing the configuration sequence of every driver
    DriverInit,
    /// Waiting for the configuration to take effect
    SettleWait,
    /// Polling the drivers every tick
    Running,
}

impl SchedulerState {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PowerupWait => "powerup wait",
            Self::DriverInit => "driver init",
            Self::SettleWait => "settle wait",
            Self::Running => "running",
        }
    }
}

/// Rejection of a request from the transport layer.
///
/// A rejected request never mutates any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Invalid gas type code {0}")]
    InvalidGasType(u8),
}
