//! Embassy tasks of the ESP32-C6 firmware.
//!
//! Tasks cannot be generic, so the concrete peripheral stack is pinned here.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Delay;
use esp_hal::uart::Uart;
use esp_hal::Async;

use crate::co2::Mhz19c;
use crate::hal::{BusyWaitDelay, EspClock, I2cCompat, I2cTransport};
use crate::shared::SharedSensorState;

pub mod display;
pub mod reporting;

pub type SensorTransport = I2cTransport<I2cCompat<'static>, BusyWaitDelay<EspClock>>;
pub type SensorState = SharedSensorState<CriticalSectionRawMutex, SensorTransport>;
pub type Co2Sensor = Mhz19c<Uart<'static, Async>, Delay>;
