use embassy_time::Duration;
use serde::{Deserialize, Serialize};

/// Fixed 7-bit address of the LMP91000 potentiostat.
pub const LMP91000_ADDRESS: u8 = 0b100_1000;
/// 7-bit address of the HDC1080 humidity/temperature sensor.
pub const HDC1080_ADDRESS: u8 = 0b100_0000;
/// 7-bit address of the MCP3423 ADC with both address pins floating.
pub const MCP3423_ADDRESS: u8 = 0b110_1000;

/// EEPROM page reserved for the calibration record.
pub const CALIBRATION_PAGE: u16 = 1;

/// Board-level configuration of the measurement core.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub potentiostat_address: u8,
    pub climate_address: u8,
    pub adc_address: u8,
    pub calibration_page: u16,
    pub timing: TimingConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            potentiostat_address: LMP91000_ADDRESS,
            climate_address: HDC1080_ADDRESS,
            adc_address: MCP3423_ADDRESS,
            calibration_page: CALIBRATION_PAGE,
            timing: TimingConfig::default(),
        }
    }
}

/// Settling times and sample intervals, in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Power-up settling time of the slowest device (HDC1080: 15 ms + margin)
    pub powerup_ms: u32,
    /// Delay between driver initialisation and the first poll
    pub settle_ms: u32,
    /// MCP3423 sample interval (4 samples per second)
    pub adc_interval_ms: u32,
    /// HDC1080 sample interval
    pub climate_interval_ms: u32,
    /// HDC1080 conversion time (7 ms typical + margin)
    pub climate_conversion_ms: u32,
    /// LMP91000 register read-back interval when diagnostics are enabled
    pub diagnostics_interval_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            powerup_ms: 25,
            settle_ms: 300,
            adc_interval_ms: 250,
            climate_interval_ms: 1000,
            climate_conversion_ms: 20,
            diagnostics_interval_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn powerup(&self) -> Duration {
        Duration::from_millis(self.powerup_ms.into())
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms.into())
    }

    pub fn adc_interval(&self) -> Duration {
        Duration::from_millis(self.adc_interval_ms.into())
    }

    pub fn climate_interval(&self) -> Duration {
        Duration::from_millis(self.climate_interval_ms.into())
    }

    pub fn climate_conversion(&self) -> Duration {
        Duration::from_millis(self.climate_conversion_ms.into())
    }

    pub fn diagnostics_interval(&self) -> Duration {
        Duration::from_millis(self.diagnostics_interval_ms.into())
    }
}
