//! Cooperative poll scheduler
//!
//! [`PollScheduler::step`] advances the device by one tick and returns
//! without blocking. While waiting for power-up or settling it simply makes
//! no progress; once running, every tick polls the three drivers in a fixed
//! order, applies a pending calibration update and recomputes the
//! concentration if the ADC count moved.
//!
//! ```text
//! PowerupWait --(powerup elapsed)--> DriverInit --> SettleWait --(settle elapsed)--> Running
//! ```

use embassy_time::Instant;
use embedded_hal::i2c::I2c;
use log::{debug, info, warn};

use crate::app_state::{LiveState, PollRound, RequestError, SchedulerState, SensorsState};
use crate::concentration::ConcentrationEngine;
use crate::config::DeviceConfig;
use crate::reporting::{ReportConfig, Values, ValuesReporter};
use crate::storage::{CalibrationRecord, CalibrationRequest, CalibrationStore, PageStore};
use crate::time::{TimeSource, is_elapsed};

pub struct PollScheduler<I, S, C> {
    sensors: SensorsState<I>,
    calibration: CalibrationStore<S>,
    engine: ConcentrationEngine,
    clock: C,
    config: DeviceConfig,
    live: LiveState,
    state: SchedulerState,
    entered_at: Instant,
    pending: Option<CalibrationRecord>,
    last_adc_count: i32,
    reporter: ValuesReporter,
}

impl<I, S, C> PollScheduler<I, S, C>
where
    I: I2c,
    S: PageStore,
    C: TimeSource,
{
    /// Create the scheduler and load the stored calibration.
    ///
    /// An invalid calibration page is not an error here: the device starts
    /// with zero calibration and the default gas type.
    pub fn new(sensors: SensorsState<I>, store: S, clock: C, config: DeviceConfig) -> Self {
        let mut calibration = CalibrationStore::new(store, config.calibration_page);
        let mut live = LiveState::default();
        if let Ok(active) = calibration.load() {
            live.gas_type = active.record.gas_type;
        }

        let entered_at = clock.now();
        info!("Scheduler: {} for {}", SchedulerState::PowerupWait.label(), live.gas_type.label());

        Self {
            sensors,
            calibration,
            engine: ConcentrationEngine,
            clock,
            config,
            live,
            state: SchedulerState::PowerupWait,
            entered_at,
            pending: None,
            last_adc_count: 0,
            reporter: ValuesReporter::default(),
        }
    }

    fn enter(&mut self, state: SchedulerState, now: Instant) {
        info!("Scheduler: {} -> {}", self.state.label(), state.label());
        self.state = state;
        self.entered_at = now;
    }

    /// Advance by one tick.
    pub fn step(&mut self) -> SchedulerState {
        let now = self.clock.now();
        let timing = self.config.timing;

        match self.state {
            SchedulerState::PowerupWait => {
                if is_elapsed(self.entered_at, now, timing.powerup()) {
                    self.enter(SchedulerState::DriverInit, now);
                }
            }
            SchedulerState::DriverInit => {
                let failures = self.sensors.init_all(&mut self.live);
                if failures > 0 {
                    warn!("Scheduler: {} driver(s) failed to initialise", failures);
                }
                self.enter(SchedulerState::SettleWait, now);
            }
            SchedulerState::SettleWait => {
                if is_elapsed(self.entered_at, now, timing.settle()) {
                    self.enter(SchedulerState::Running, now);
                }
            }
            SchedulerState::Running => {
                let round = self.run_tick(now);
                if round.failures() > 0 {
                    debug!("Scheduler: {} driver(s) failed this tick", round.failures());
                }
            }
        }

        self.state
    }

    /// Advance by one tick, then yield to the executor.
    pub async fn tick(&mut self) -> SchedulerState {
        let state = self.step();
        embassy_futures::yield_now().await;
        state
    }

    fn run_tick(&mut self, now: Instant) -> PollRound {
        let round = self.sensors.poll_all(now, &mut self.live);

        if let Some(record) = self.pending.take() {
            self.apply_calibration(&record);
        }

        if self.live.raw_adc_count != self.last_adc_count {
            self.last_adc_count = self.live.raw_adc_count;
            self.engine
                .recompute(&mut self.live, self.calibration.active());
        }

        round
    }

    fn apply_calibration(&mut self, record: &CalibrationRecord) {
        let gas_type = match self.calibration.save_and_reload(record) {
            Ok(active) => active.record.gas_type,
            Err(e) => {
                warn!("Scheduler: calibration update dropped: {}", e);
                return;
            }
        };

        if gas_type != self.live.gas_type {
            info!(
                "Scheduler: gas type {} -> {}",
                self.live.gas_type.label(),
                gas_type.label()
            );
            self.live.gas_type = gas_type;
            if let Err(e) = self.sensors.reinit_potentiostat(&mut self.live) {
                warn!("Scheduler: potentiostat re-init failed: {}", e);
            }
        }
    }

    /// Queue a calibration update for the next running tick.
    ///
    /// The request is validated first; a rejected request changes nothing.
    /// A later request replaces one that has not been applied yet.
    pub fn request_calibration(&mut self, request: CalibrationRequest) -> Result<(), RequestError> {
        let record = CalibrationRecord::try_from(request)?;
        if self.pending.replace(record).is_some() {
            debug!("Scheduler: pending calibration replaced");
        }
        Ok(())
    }

    /// Whether a calibration update is waiting for the next running tick.
    pub fn has_pending_calibration(&self) -> bool {
        self.pending.is_some()
    }

    /// The active calibration record.
    pub fn calibration(&self) -> CalibrationRecord {
        self.calibration.active().record
    }

    pub fn values(&self) -> Values {
        Values::from(&self.live)
    }

    pub fn adc_count(&self) -> i32 {
        self.live.raw_adc_count
    }

    pub fn set_report_config(&mut self, config: ReportConfig) {
        self.reporter.set_config(config);
    }

    pub fn report_config(&self) -> ReportConfig {
        self.reporter.config()
    }

    /// Values to send to the host now, if a report is due.
    pub fn poll_report(&mut self) -> Option<Values> {
        let now = self.clock.now();
        self.reporter.poll(now, &self.live)
    }

    pub fn live_state(&self) -> &LiveState {
        &self.live
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn store(&self) -> &S {
        self.calibration.store()
    }
}
