use embassy_time::{Delay, Duration, Timer};

use crate::report::{ReportSink, Reporter};
use crate::tasks::{Co2Sensor, SensorState};

/// Stand-in for the mesh client: prints each report over RTT.
pub struct LogSink;

impl ReportSink for LogSink {
    type Error = core::convert::Infallible;

    async fn send(&mut self, payload: &str) -> Result<(), Self::Error> {
        info!("report: {}", payload);
        Ok(())
    }
}

#[embassy_executor::task]
pub async fn reporting_task(
    sensor: &'static SensorState,
    co2: Co2Sensor,
    sensor_id: &'static str,
    period: Duration,
) {
    info!("Reporting as {} every {} ms", sensor_id, period.as_millis());

    let mut reporter = Reporter::new(sensor, co2, LogSink, sensor_id);
    let mut delay = Delay;

    loop {
        let (sample, result) = reporter.report_once(&mut delay).await;
        if result.is_err() {
            warn!("Report cycle failed (iaq {}, co2 {})", sample.iaq, sample.co2_ppm);
        }

        Timer::after(period).await;
    }
}
