//! Node configuration.
//!
//! Everything that differs between deployments lives in [`NodeConfig`]; the
//! firmware builds it once at boot and hands the relevant parts to the tasks.

use crate::bme68x::{Filter, HeaterProfile, Oversampling};
use crate::hal::BME68X_I2C_ADDR_HIGH;

/// Identifier published with every report.
pub const DEFAULT_SENSOR_ID: &str = "air-node-01";

// ── timing ───────────────────────────────────────────────────────────────────
pub const REPORT_PERIOD_MS: u64 = 3_000;
pub const DISPLAY_PERIOD_MS: u64 = 1_000;

// ── BME68x ───────────────────────────────────────────────────────────────────
pub const HEATER_TEMPERATURE_C: u16 = 300;
pub const HEATER_DURATION_MS: u16 = 100;
pub const AMBIENT_TEMPERATURE_C: i8 = 25;

// ── MH-Z19C ──────────────────────────────────────────────────────────────────
pub const CO2_BAUD_RATE: u32 = 9_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSettings {
    pub os_temp: Oversampling,
    pub os_pres: Oversampling,
    pub os_hum: Oversampling,
    pub filter: Filter,
    pub heater_temperature: u16,
    pub heater_duration_ms: u16,
    pub ambient_temperature: i8,
    pub i2c_address: u8,
}

impl SensorSettings {
    pub fn heater_profile(&self) -> HeaterProfile {
        HeaterProfile::Forced {
            temperature: self.heater_temperature,
            duration_ms: self.heater_duration_ms,
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            os_temp: Oversampling::X8,
            os_pres: Oversampling::X8,
            os_hum: Oversampling::X8,
            filter: Filter::Size7,
            heater_temperature: HEATER_TEMPERATURE_C,
            heater_duration_ms: HEATER_DURATION_MS,
            ambient_temperature: AMBIENT_TEMPERATURE_C,
            i2c_address: BME68X_I2C_ADDR_HIGH,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeConfig {
    pub sensor_id: &'static str,
    pub report_period_ms: u64,
    pub display_period_ms: u64,
    /// Automatic baseline correction of the CO2 sensor.
    pub co2_self_calibration: bool,
    pub sensor: SensorSettings,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            sensor_id: DEFAULT_SENSOR_ID,
            report_period_ms: REPORT_PERIOD_MS,
            display_period_ms: DISPLAY_PERIOD_MS,
            co2_self_calibration: true,
            sensor: SensorSettings::default(),
        }
    }
}
