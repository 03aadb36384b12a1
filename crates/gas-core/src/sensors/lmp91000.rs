//! LMP91000 potentiostat front-end
//!
//! The potentiostat biases the electrochemical cell and converts its current
//! into a voltage for the ADC. It has no data of its own: after
//! [`Sensor::init`] has written the front-end row of the fitted gas type, the
//! only periodic work is an optional register read-back for diagnostics.

use embassy_time::{Duration, Instant};
use embedded_hal::i2c::I2c;
use heapless::Vec;
#[cfg(feature = "diagnostics")]
use log::debug;
use log::info;

use super::{PollOutcome, Sensor, SensorError};
use crate::app_state::LiveState;
use crate::time::Cadence;

pub const REG_STATUS: u8 = 0x00;
pub const REG_LOCK: u8 = 0x01;
pub const REG_TIACN: u8 = 0x10;
pub const REG_REFCN: u8 = 0x11;
pub const REG_MODECN: u8 = 0x12;

/// LOCK value that makes TIACN and REFCN writable.
const LOCK_UNLOCKED: u8 = 0x00;

/// Registers covered by [`Lmp91000::read_configuration`], in read order.
pub const DIAGNOSTIC_REGISTERS: [u8; 5] = [REG_LOCK, REG_MODECN, REG_REFCN, REG_STATUS, REG_TIACN];

/// Register address and value pairs read back from the device.
pub type RegisterDump = Vec<(u8, u8), 5>;

pub struct Lmp91000<I> {
    i2c: I,
    address: u8,
    #[cfg_attr(not(feature = "diagnostics"), allow(dead_code))]
    diagnostics: Cadence,
}

impl<I: I2c> Lmp91000<I> {
    /// `diagnostics_interval` only matters with the `diagnostics` feature.
    pub fn new(i2c: I, address: u8, diagnostics_interval: Duration) -> Self {
        Self {
            i2c,
            address,
            diagnostics: Cadence::new(diagnostics_interval),
        }
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| SensorError::i2c(Self::NAME, "register write", e))
    }

    /// Read back every configuration register.
    pub fn read_configuration(&mut self) -> Result<RegisterDump, SensorError> {
        let mut dump = RegisterDump::new();
        for register in DIAGNOSTIC_REGISTERS {
            let mut value = [0u8; 1];
            self.i2c
                .write_read(self.address, &[register], &mut value)
                .map_err(|e| SensorError::i2c(Self::NAME, "register read", e))?;
            // Capacity equals DIAGNOSTIC_REGISTERS.len()
            let _ = dump.push((register, value[0]));
        }
        Ok(dump)
    }

    pub fn release(self) -> I {
        self.i2c
    }
}

impl<I: I2c> Sensor for Lmp91000<I> {
    const NAME: &'static str = "LMP91000";

    fn init(&mut self, state: &mut LiveState) -> Result<(), SensorError> {
        let row = state.gas_type.front_end();

        self.write_register(REG_LOCK, LOCK_UNLOCKED)?;
        self.write_register(REG_TIACN, row.tiacn)?;
        self.write_register(REG_REFCN, row.refcn)?;
        self.write_register(REG_MODECN, row.modecn)?;

        // Only a completed sequence changes the gain the engine works with
        state.tia_gain = row.tia_gain();

        info!(
            "{}: configured for {} (TIA gain code {}, {} ohm)",
            Self::NAME,
            state.gas_type.label(),
            state.tia_gain.code(),
            state.tia_gain.resistance_ohms()
        );
        Ok(())
    }

    #[cfg(feature = "diagnostics")]
    fn poll(&mut self, now: Instant, _state: &mut LiveState) -> Result<PollOutcome, SensorError> {
        if !self.diagnostics.is_due(now) {
            return Ok(PollOutcome::NotDue);
        }
        self.diagnostics.mark(now);

        for (register, value) in self.read_configuration()? {
            debug!("{}: reg 0x{:02x} = 0x{:02x}", Self::NAME, register, value);
        }
        Ok(PollOutcome::Stale)
    }

    #[cfg(not(feature = "diagnostics"))]
    fn poll(&mut self, _now: Instant, _state: &mut LiveState) -> Result<PollOutcome, SensorError> {
        Ok(PollOutcome::NotDue)
    }
}
