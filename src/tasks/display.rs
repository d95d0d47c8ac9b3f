use embassy_time::{Delay, Duration, Timer};

use crate::report::LocalDisplay;
use crate::tasks::SensorState;

#[embassy_executor::task]
pub async fn display_task(sensor: &'static SensorState, period: Duration) {
    info!("Local display running every {} ms", period.as_millis());

    let mut display = LocalDisplay::new(sensor);
    let mut delay = Delay;

    loop {
        display.refresh(&mut delay).await;
        Timer::after(period).await;
    }
}
