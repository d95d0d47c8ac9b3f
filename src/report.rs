//! The two periodic consumers of the shared sensor: the network reporter and
//! the local display. Both only implement one cycle; the timing loop lives in
//! the firmware tasks.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};

use crate::average::RollingAverage;
use crate::co2::Mhz19c;
use crate::hal::RegisterTransport;
use crate::payload::format_payload;
use crate::shared::{FusedSample, SharedSensorState};

/// Samples averaged by the local display.
pub const DISPLAY_WINDOW: usize = 5;

/// Destination of the JSON reports, e.g. a CoAP client on the mesh network.
#[allow(async_fn_in_trait)]
pub trait ReportSink {
    type Error;

    async fn send(&mut self, payload: &str) -> Result<(), Self::Error>;
}

/// Anything that can produce a CO2 concentration in ppm, −1 when it cannot.
#[allow(async_fn_in_trait)]
pub trait Co2Source {
    async fn co2_ppm(&mut self) -> i32;
}

impl<U, D> Co2Source for Mhz19c<U, D>
where
    U: Read + Write,
    D: DelayNs,
{
    async fn co2_ppm(&mut self) -> i32 {
        Mhz19c::co2_ppm(self).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportError {
    /// The payload did not fit its buffer.
    Format,
    /// The sink refused the payload.
    Send,
}

pub struct Reporter<'a, M: RawMutex, T, C, S> {
    sensor: &'a SharedSensorState<M, T>,
    co2: C,
    sink: S,
    sensor_id: &'a str,
}

impl<'a, M, T, C, S> Reporter<'a, M, T, C, S>
where
    M: RawMutex,
    T: RegisterTransport,
    C: Co2Source,
    S: ReportSink,
{
    pub fn new(sensor: &'a SharedSensorState<M, T>, co2: C, sink: S, sensor_id: &'a str) -> Self {
        Self {
            sensor,
            co2,
            sink,
            sensor_id,
        }
    }

    /// Reads a fused sample plus CO2 and ships it.
    ///
    /// The sample is returned even when shipping failed, so the caller can
    /// still log it.
    pub async fn report_once<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> (FusedSample, Result<(), ReportError>) {
        let mut sample = self.sensor.read_fused_sample(delay).await;
        sample.co2_ppm = self.co2.co2_ppm().await;

        let payload = match format_payload(self.sensor_id, &sample) {
            Ok(payload) => payload,
            Err(_) => {
                error!("Report payload does not fit");
                return (sample, Err(ReportError::Format));
            }
        };

        if self.sink.send(&payload).await.is_err() {
            warn!("Report could not be sent");
            return (sample, Err(ReportError::Send));
        }

        debug!("Report sent: {}", payload.as_str());
        (sample, Ok(()))
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

/// Logs every reading together with a short moving average of the IAQ.
pub struct LocalDisplay<'a, M: RawMutex, T> {
    sensor: &'a SharedSensorState<M, T>,
    iaq_history: RollingAverage<DISPLAY_WINDOW>,
}

impl<'a, M: RawMutex, T: RegisterTransport> LocalDisplay<'a, M, T> {
    pub fn new(sensor: &'a SharedSensorState<M, T>) -> Self {
        Self {
            sensor,
            iaq_history: RollingAverage::new(),
        }
    }

    pub async fn refresh<D: DelayNs>(&mut self, delay: &mut D) -> FusedSample {
        let sample = self.sensor.read_fused_sample(delay).await;

        // burn-in and failed reads carry no score
        if sample.iaq >= 0.0 {
            self.iaq_history.push(sample.iaq);
        }

        info!(
            "T {} C | RH {} % | P {} Pa | gas {} Ohm",
            sample.temperature, sample.humidity, sample.pressure, sample.gas_resistance
        );
        if self.sensor.iaq().is_calibrated() {
            info!(
                "IAQ {} (avg of last {}: {})",
                sample.iaq,
                self.iaq_history.len(),
                self.iaq_average()
            );
        } else {
            info!("IAQ calibrating");
        }

        sample
    }

    pub fn iaq_average(&self) -> f32 {
        self.iaq_history.average()
    }
}
