//! Hardware-independent core library for the gas measurement device
//!
//! This crate contains the platform-agnostic logic of the device: the
//! cooperative poll scheduler that time-multiplexes the potentiostat, the
//! humidity/temperature sensor and the ADC over one shared I2C bus, the
//! calibration-aware concentration computation, and calibration persistence
//! with integrity checking.
//!
//! It is `#![no_std]` so it compiles on embedded targets as well as on
//! desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod app_state;
pub mod concentration;
pub mod config;
pub mod gas;
pub mod i2c_bus;
pub mod reporting;
pub mod scheduler;
pub mod sensors;
pub mod storage;
pub mod time;

pub use app_state::{LiveState, SchedulerState};
pub use config::{DeviceConfig, TimingConfig};
pub use gas::{GasType, TiaGain};
pub use scheduler::PollScheduler;
