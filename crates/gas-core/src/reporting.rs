//! Periodic value reports for the transport layer

use embassy_time::{Duration, Instant};
use serde::{Deserialize, Serialize};

use crate::app_state::LiveState;
use crate::gas::GasType;
use crate::time::is_elapsed;

/// Snapshot of the values exposed to the host.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Values {
    /// Concentration in ppb, truncated and saturated to `i32`; NaN reads as 0
    pub gas_concentration: i32,
    /// Degrees Celsius scaled by 100
    pub temperature: i16,
    /// Relative humidity in percent scaled by 100
    pub humidity: u16,
    pub gas_type: GasType,
}

impl From<&LiveState> for Values {
    fn from(state: &LiveState) -> Self {
        Self {
            gas_concentration: state.concentration_ppb as i32,
            temperature: state.temperature,
            humidity: state.humidity,
            gas_type: state.gas_type,
        }
    }
}

/// Report configuration set by the host.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportConfig {
    /// Report period in milliseconds, 0 disables reporting
    pub period_ms: u32,
    /// Only report when the values differ from the last report
    pub value_has_to_change: bool,
}

impl ReportConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.into())
    }
}

/// Decides when the next [`Values`] report is due.
#[derive(Debug, Clone, Default)]
pub struct ValuesReporter {
    config: ReportConfig,
    last_sent: Option<Instant>,
    last_values: Option<Values>,
}

impl ValuesReporter {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            last_sent: None,
            last_values: None,
        }
    }

    pub fn config(&self) -> ReportConfig {
        self.config
    }

    /// Replace the configuration. The first report under the new
    /// configuration is due immediately.
    pub fn set_config(&mut self, config: ReportConfig) {
        self.config = config;
        self.last_sent = None;
    }

    /// Returns the values to report at `now`, if any.
    ///
    /// With `value_has_to_change` set, an unchanged snapshot is held back and
    /// the next change is reported as soon as it is seen.
    pub fn poll(&mut self, now: Instant, state: &LiveState) -> Option<Values> {
        if self.config.period_ms == 0 {
            return None;
        }
        if let Some(last) = self.last_sent {
            if !is_elapsed(last, now, self.config.period()) {
                return None;
            }
        }

        let values = Values::from(state);
        if self.config.value_has_to_change && self.last_values == Some(values) {
            return None;
        }

        self.last_sent = Some(now);
        self.last_values = Some(values);
        Some(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(temperature: i16) -> LiveState {
        LiveState {
            temperature,
            humidity: 4500,
            concentration_ppb: 1234.9,
            ..LiveState::default()
        }
    }

    #[test]
    fn test_values_truncate_concentration() {
        let mut live = state(2000);
        assert_eq!(Values::from(&live).gas_concentration, 1234);

        live.concentration_ppb = -0.7;
        assert_eq!(Values::from(&live).gas_concentration, 0);

        live.concentration_ppb = f64::INFINITY;
        assert_eq!(Values::from(&live).gas_concentration, i32::MAX);

        live.concentration_ppb = f64::NAN;
        assert_eq!(Values::from(&live).gas_concentration, 0);
    }

    #[test]
    fn test_zero_period_disables_reports() {
        let mut reporter = ValuesReporter::default();
        assert_eq!(reporter.poll(Instant::from_millis(0), &state(2000)), None);
        assert_eq!(reporter.poll(Instant::from_millis(60_000), &state(2000)), None);
    }

    #[test]
    fn test_periodic_reports() {
        let mut reporter = ValuesReporter::new(ReportConfig {
            period_ms: 1000,
            value_has_to_change: false,
        });

        assert!(reporter.poll(Instant::from_millis(0), &state(2000)).is_some());
        assert!(reporter.poll(Instant::from_millis(999), &state(2000)).is_none());
        assert!(reporter.poll(Instant::from_millis(1000), &state(2000)).is_some());
    }

    #[test]
    fn test_unchanged_values_are_held_back() {
        let mut reporter = ValuesReporter::new(ReportConfig {
            period_ms: 1000,
            value_has_to_change: true,
        });

        assert!(reporter.poll(Instant::from_millis(0), &state(2000)).is_some());
        assert!(reporter.poll(Instant::from_millis(1000), &state(2000)).is_none());
        assert!(reporter.poll(Instant::from_millis(1500), &state(2000)).is_none());

        let report = reporter.poll(Instant::from_millis(1600), &state(2001));
        assert_eq!(report.map(|values| values.temperature), Some(2001));
        assert!(reporter.poll(Instant::from_millis(2000), &state(2002)).is_none());
    }

    #[test]
    fn test_new_config_reports_immediately() {
        let mut reporter = ValuesReporter::new(ReportConfig {
            period_ms: 10_000,
            value_has_to_change: false,
        });
        assert!(reporter.poll(Instant::from_millis(0), &state(2000)).is_some());

        reporter.set_config(ReportConfig {
            period_ms: 500,
            value_has_to_change: false,
        });
        assert!(reporter.poll(Instant::from_millis(10), &state(2000)).is_some());
    }
}
