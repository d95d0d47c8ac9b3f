//! The one gas sensor of the node, shared between the periodic tasks.
//!
//! Two independent locks: an async mutex around the driver, held only while
//! talking to the device, and the estimator's own blocking lock around the
//! gas ceiling. A reader never holds the driver lock while it waits for the
//! measurement to finish, so the other task can use the sensor meanwhile.
//! A reader arriving while a forced measurement is pending joins it instead
//! of restarting the conversion underneath the first reader.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal_async::delay::DelayNs;

use crate::bme68x::{OperatingMode, SensorDriver};
use crate::hal::RegisterTransport;
use crate::iaq::{IaqEstimator, IAQ_UNAVAILABLE};

/// Value published for readings that are not available.
pub const SENTINEL: f32 = -1.0;

/// One fused reading, created fresh per cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FusedSample {
    /// °C
    pub temperature: f32,
    /// %RH
    pub humidity: f32,
    /// Pa
    pub pressure: f32,
    /// Ω
    pub gas_resistance: f32,
    /// 0..=100, or −1 during burn-in and when no fresh field was read.
    pub iaq: f32,
    /// ppm, or −1 when the CO2 sensor did not answer.
    pub co2_ppm: i32,
    /// µg/m³, always −1: there is no particulate sensor on this node.
    pub pm25: f32,
}

pub struct SharedSensorState<M: RawMutex, T> {
    driver: Mutex<M, SensorDriver<T>>,
    /// Readers waiting on the forced measurement currently in flight.
    waiting: BlockingMutex<M, Cell<u8>>,
    iaq: IaqEstimator<M>,
}

impl<M: RawMutex, T: RegisterTransport> SharedSensorState<M, T> {
    pub fn new(driver: SensorDriver<T>) -> Self {
        Self {
            driver: Mutex::new(driver),
            waiting: BlockingMutex::new(Cell::new(0)),
            iaq: IaqEstimator::new(),
        }
    }

    /// Exclusive access to the driver, e.g. to change its configuration.
    pub async fn lock_driver(&self) -> MutexGuard<'_, M, SensorDriver<T>> {
        self.driver.lock().await
    }

    pub fn iaq(&self) -> &IaqEstimator<M> {
        &self.iaq
    }

    /// Runs one forced measurement and scores it.
    ///
    /// Sensor failures do not surface as errors: the sample then carries the
    /// previous field values with `iaq` set to −1, and the failure is logged.
    ///
    /// Only the first of several overlapping readers starts the measurement,
    /// the others wait for and fetch that same field.
    pub async fn read_fused_sample<D: DelayNs>(&self, delay: &mut D) -> FusedSample {
        let (wait_us, pending) = {
            let mut driver = self.driver.lock().await;
            let (pending, joined) = PendingReader::enter(&self.waiting);
            if joined {
                debug!("Joining pending forced measurement");
            } else if let Err(e) = driver.set_operating_mode(OperatingMode::Forced) {
                warn!("Could not start forced measurement: {:?}", e);
            }
            let wait_us = driver.measurement_duration_us(OperatingMode::Forced)
                + driver.heater_duration_ms() * 1000;
            (wait_us, pending)
        };

        delay.delay_us(wait_us).await;

        let (field, fresh) = {
            let mut driver = self.driver.lock().await;
            drop(pending);
            match driver.fetch_fields() {
                Ok(n) if n > 0 => (driver.get_field().0, true),
                Ok(_) => {
                    error!("No new BME68x data, reusing previous values");
                    (driver.fields()[0], false)
                }
                Err(e) => {
                    error!("BME68x fetch failed: {:?}", e);
                    (driver.fields()[0], false)
                }
            }
        };

        let iaq = if fresh {
            self.iaq
                .score(field.gas_resistance, field.humidity, field.temperature)
        } else {
            IAQ_UNAVAILABLE
        };

        FusedSample {
            temperature: field.temperature,
            humidity: field.humidity,
            pressure: field.pressure,
            gas_resistance: field.gas_resistance,
            iaq,
            co2_ppm: -1,
            pm25: SENTINEL,
        }
    }
}

/// Registration of one reader in the pending-measurement count, undone on
/// drop so a cancelled read does not leave the count raised.
struct PendingReader<'a, M: RawMutex> {
    waiting: &'a BlockingMutex<M, Cell<u8>>,
}

impl<'a, M: RawMutex> PendingReader<'a, M> {
    /// Returns the registration and whether a measurement was already pending.
    fn enter(waiting: &'a BlockingMutex<M, Cell<u8>>) -> (Self, bool) {
        let joined = waiting.lock(|n| {
            let before = n.get();
            n.set(before.saturating_add(1));
            before > 0
        });
        (Self { waiting }, joined)
    }
}

impl<M: RawMutex> Drop for PendingReader<'_, M> {
    fn drop(&mut self) {
        self.waiting.lock(|n| n.set(n.get().saturating_sub(1)));
    }
}
