#![cfg_attr(not(test), no_std)]

// must come first, the logging macros are textually scoped
#[macro_use]
mod fmt;

pub mod average;
pub mod bme68x;
pub mod co2;
pub mod config;
pub mod hal;
pub mod iaq;
pub mod payload;
pub mod report;
pub mod shared;
#[cfg(feature = "esp32c6")]
pub mod tasks;

#[cfg(test)]
mod testing;

pub use average::RollingAverage;
pub use bme68x::{SensorDriver, SensorError, SensorWarning, Status};
pub use co2::{Co2Error, Mhz19c};
pub use config::NodeConfig;
pub use hal::{CommError, RegisterTransport};
pub use iaq::IaqEstimator;
pub use report::{LocalDisplay, ReportSink, Reporter};
pub use shared::{FusedSample, SharedSensorState};
