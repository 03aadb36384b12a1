//! Temperature-compensated gas concentration
//!
//! The ADC measures the voltage across the potentiostat's feedback resistor.
//! Converting it to a concentration takes four steps:
//!
//! 1. Sensor current in nA from the count above the zero point, the 2.048 V
//!    reference of the ADC and the feedback resistance of the TIA gain.
//! 2. Zero compensation: subtract the temperature-dependent baseline drift.
//! 3. Span compensation: scale by the temperature-dependent sensitivity
//!    drift.
//! 4. Divide by the calibrated sensitivity (nA per ppm) and scale to ppb.
//!
//! Steps 2 and 3 use the low coefficients below 25.0 °C and the high ones at
//! or above it.

use log::trace;

use crate::app_state::LiveState;
use crate::gas::{GasType, TiaGain};
use crate::storage::WorkingCalibration;

/// Full scale of the 18-bit ADC.
pub const ADC_FULL_SCALE: f64 = 262143.0;
/// ADC reference voltage in volts.
pub const ADC_REFERENCE_VOLTS: f64 = 2.048;
/// Temperature at which the zero compensation switches branch, in °C.
pub const TEMPERATURE_THRESHOLD_ZERO: f64 = 25.0;
/// Temperature at which the span compensation switches branch, in °C.
pub const TEMPERATURE_THRESHOLD_SPAN: f64 = 25.0;

/// Compute the concentration in ppb.
///
/// `temperature` is in hundredths of a degree Celsius. A zero sensitivity
/// yields an infinite or NaN result rather than an error; that is what an
/// uncalibrated device reports.
pub fn concentration_ppb(
    raw_adc_count: i32,
    temperature: i16,
    gas_type: GasType,
    tia_gain: TiaGain,
    adc_count_zero: i32,
    sensitivity: i32,
) -> f64 {
    let rgain = f64::from(tia_gain.resistance_ohms());
    let (zero, span) = gas_type.compensation().select(temperature);
    let t = f64::from(temperature) / 100.0;

    let na = (f64::from(raw_adc_count) - f64::from(adc_count_zero)) / ADC_FULL_SCALE
        * ADC_REFERENCE_VOLTS
        / rgain
        * 1e9;
    let zero_compensated = na - zero * (t - TEMPERATURE_THRESHOLD_ZERO);
    let span_compensated = 1.0 - (span / 1000.0) * (t - TEMPERATURE_THRESHOLD_SPAN);

    zero_compensated * span_compensated / f64::from(sensitivity) * 1e5
}

/// Applies [`concentration_ppb`] to the live state.
///
/// The engine is stateless; deciding when to recompute is up to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcentrationEngine;

impl ConcentrationEngine {
    pub fn recompute(&self, state: &mut LiveState, calibration: &WorkingCalibration) -> f64 {
        state.concentration_ppb = concentration_ppb(
            state.raw_adc_count,
            state.temperature,
            state.gas_type,
            state.tia_gain,
            calibration.adc_count_zero,
            calibration.sensitivity,
        );
        trace!(
            "Concentration: count {} at {} cC -> {} ppb",
            state.raw_adc_count, state.temperature, state.concentration_ppb
        );
        state.concentration_ppb
    }
}
