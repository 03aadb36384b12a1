//! Driver container polled by the scheduler

use embassy_time::Instant;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app_state::LiveState;
use crate::config::DeviceConfig;
use crate::sensors::{Hdc1080, Lmp91000, Mcp3423, PollOutcome, Sensor, SensorError};

/// Outcome of one pass over all drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRound {
    pub potentiostat: Result<PollOutcome, SensorError>,
    pub climate: Result<PollOutcome, SensorError>,
    pub adc: Result<PollOutcome, SensorError>,
}

impl PollRound {
    pub fn failures(&self) -> usize {
        [&self.potentiostat, &self.climate, &self.adc]
            .into_iter()
            .filter(|result| result.is_err())
            .count()
    }
}

/// Drivers whose configuration sequence has not completed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Unconfigured {
    potentiostat: bool,
    climate: bool,
    adc: bool,
}

/// The three peripheral drivers, each with its own handle on the shared bus.
///
/// Drivers are always visited in the same order: potentiostat, then the
/// humidity/temperature sensor, then the ADC. The potentiostat goes first
/// because its gain setup must precede any measurement.
///
/// A driver whose configuration failed is not polled; its configuration is
/// retried on every pass instead until it succeeds.
pub struct SensorsState<I> {
    pub potentiostat: Lmp91000<I>,
    pub climate: Hdc1080<I>,
    pub adc: Mcp3423<I>,
    unconfigured: Unconfigured,
}

impl<I: I2c> SensorsState<I> {
    pub fn new(potentiostat_i2c: I, climate_i2c: I, adc_i2c: I, config: &DeviceConfig) -> Self {
        let timing = &config.timing;
        Self {
            potentiostat: Lmp91000::new(
                potentiostat_i2c,
                config.potentiostat_address,
                timing.diagnostics_interval(),
            ),
            climate: Hdc1080::new(
                climate_i2c,
                config.climate_address,
                timing.climate_interval(),
                timing.climate_conversion(),
            ),
            adc: Mcp3423::new(adc_i2c, config.adc_address, timing.adc_interval()),
            unconfigured: Unconfigured::default(),
        }
    }

    /// Run every driver's configuration sequence.
    ///
    /// A driver that fails to initialise is logged and left for
    /// [`poll_all`](Self::poll_all) to retry; the others are still
    /// configured. Returns the number of failures.
    pub fn init_all(&mut self, state: &mut LiveState) -> usize {
        self.unconfigured = Unconfigured {
            potentiostat: !contain(self.potentiostat.init(state)),
            climate: !contain(self.climate.init(state)),
            adc: !contain(self.adc.init(state)),
        };
        self.unconfigured_count()
    }

    /// Re-run the potentiostat configuration, e.g. after a gas type change.
    ///
    /// On failure the potentiostat is retried by the next
    /// [`poll_all`](Self::poll_all).
    pub fn reinit_potentiostat(&mut self, state: &mut LiveState) -> Result<(), SensorError> {
        let result = self.potentiostat.init(state);
        self.unconfigured.potentiostat = result.is_err();
        result
    }

    /// Number of drivers still waiting for a successful configuration.
    pub fn unconfigured_count(&self) -> usize {
        let Unconfigured {
            potentiostat,
            climate,
            adc,
        } = self.unconfigured;
        [potentiostat, climate, adc]
            .into_iter()
            .filter(|pending| *pending)
            .count()
    }

    /// Poll every driver once, configuring any that still need it first.
    pub fn poll_all(&mut self, now: Instant, state: &mut LiveState) -> PollRound {
        let pending = &mut self.unconfigured;
        PollRound {
            potentiostat: service(&mut self.potentiostat, &mut pending.potentiostat, now, state),
            climate: service(&mut self.climate, &mut pending.climate, now, state),
            adc: service(&mut self.adc, &mut pending.adc, now, state),
        }
    }
}

fn service<S: Sensor>(
    sensor: &mut S,
    unconfigured: &mut bool,
    now: Instant,
    state: &mut LiveState,
) -> Result<PollOutcome, SensorError> {
    if *unconfigured {
        sensor.init(state)?;
        *unconfigured = false;
        info!("{}: configured on retry", S::NAME);
    }
    sensor.poll(now, state)
}

fn contain(result: Result<(), SensorError>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{} init failed: {}", e.sensor(), e);
            false
        }
    }
}
