//! Desktop simulator for the gas measurement core.
//!
//! Drives the real poll scheduler against simulated peripherals on a virtual
//! clock, applies a reference calibration on first start and logs the
//! periodic value reports. Calibration and configuration survive restarts
//! through a postcard-encoded state file.
//!
//! # Environment
//!
//! | Variable          | Meaning                                  | Default          |
//! |-------------------|------------------------------------------|------------------|
//! | `GAS_SIM_SECONDS` | Simulated run time in seconds            | `10`             |
//! | `GAS_SIM_STATE`   | State file path                          | `gas-sim.state`  |
//! | `RUST_LOG`        | Log filter                               | `info`           |
//!
//! Variables may also be set in a `.env` file.

mod devices;
mod persistence;

use std::env;
use std::path::PathBuf;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use gas_core::app_state::SensorsState;
use gas_core::gas::GasType;
use gas_core::i2c_bus::BusArbiter;
use gas_core::reporting::ReportConfig;
use gas_core::storage::CalibrationRequest;
use gas_core::time::{ManualClock, TimeSource};
use gas_core::{PollScheduler, SchedulerState};
use log::{error, info, warn};

use devices::SimulatedBus;

/// Virtual time per scheduler tick.
const TICK_MS: u64 = 10;

/// Calibration applied to a fresh device.
const REFERENCE_CALIBRATION: CalibrationRequest = CalibrationRequest {
    adc_count_zero: 107_292,
    temperature_zero: 2500,
    humidity_zero: 5000,
    compensation_zero_low: 0,
    compensation_zero_high: 0,
    ppm_span: 0,
    adc_count_span: 0,
    temperature_span: 0,
    humidity_span: 0,
    compensation_span_low: 0,
    compensation_span_high: 0,
    temperature_offset: 0,
    humidity_offset: 0,
    gas_type: GasType::Co.code(),
    sensitivity: 290,
};

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", name, value);
            default
        }),
        Err(_) => default,
    }
}

fn main() {
    let dotenv = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let seconds: u64 = env_or("GAS_SIM_SECONDS", 10);
    let state_path: PathBuf = env_or("GAS_SIM_STATE", PathBuf::from("gas-sim.state"));
    info!("Starting gas simulator for {} s of virtual time", seconds);

    let state = persistence::load(&state_path);
    let config = state.config;

    let clock = ManualClock::new();
    let arbiter = BusArbiter::<CriticalSectionRawMutex, _>::new(SimulatedBus::new(config));
    let sensors = SensorsState::new(arbiter.device(), arbiter.device(), arbiter.device(), &config);
    let mut scheduler = PollScheduler::new(sensors, state.eeprom(), &clock, config);

    scheduler.set_report_config(ReportConfig {
        period_ms: 1000,
        value_has_to_change: false,
    });

    let mut calibration_requested = false;
    let ticks = seconds * 1000 / TICK_MS;
    for _ in 0..ticks {
        clock.advance_ms(TICK_MS);
        match arbiter.try_acquire(0x00) {
            Ok(guard) => {
                guard.bus().advance(TICK_MS as f64 / 1000.0);
            }
            Err(_) => warn!("Bus busy between ticks"),
        }

        if scheduler.step() != SchedulerState::Running {
            continue;
        }

        if !calibration_requested && scheduler.calibration().sensitivity == 0 {
            calibration_requested = true;
            match scheduler.request_calibration(REFERENCE_CALIBRATION) {
                Ok(()) => info!("Requested reference calibration"),
                Err(e) => error!("Reference calibration rejected: {}", e),
            }
        }

        if let Some(values) = scheduler.poll_report() {
            info!(
                "[{:>6} ms] {}: {} ppb, {:.2} °C, {:.2} %RH (ADC {})",
                clock.now().as_millis(),
                values.gas_type.label(),
                values.gas_concentration,
                f64::from(values.temperature) / 100.0,
                f64::from(values.humidity) / 100.0,
                scheduler.adc_count()
            );
        }
    }

    if let Err(e) = persistence::save(&state_path, *scheduler.config(), scheduler.store()) {
        error!("{}", e);
    }
    info!("Simulator exiting");
}
