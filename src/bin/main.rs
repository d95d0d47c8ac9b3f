#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]

use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Timer};
use esp_air_node::bme68x::SensorDriver;
use esp_air_node::config::{NodeConfig, CO2_BAUD_RATE};
use esp_air_node::hal::{BusyWaitDelay, EspClock, HalI2c, I2cCompat, I2cTransport};
use esp_air_node::tasks::display::display_task;
use esp_air_node::tasks::reporting::reporting_task;
use esp_air_node::tasks::{SensorState, SensorTransport};
use esp_air_node::{Mhz19c, SharedSensorState};
use esp_hal::clock::CpuClock;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::time::Rate;
use esp_hal::timer::systimer::SystemTimer;
use esp_hal::uart::{Config as UartConfig, Uart};
use panic_rtt_target as _;
use static_cell::StaticCell;

static RAW_I2C_CELL: StaticCell<HalI2c<'static>> = StaticCell::new();
static SENSOR_CELL: StaticCell<SensorState> = StaticCell::new();

fn configure(driver: &mut SensorDriver<SensorTransport>, config: &NodeConfig) {
    let settings = &config.sensor;

    driver.set_ambient_temperature(settings.ambient_temperature);
    if let Err(e) = driver.set_oversampling(settings.os_temp, settings.os_pres, settings.os_hum) {
        warn!("Oversampling not applied: {:?}", e);
    }
    if let Err(e) = driver.set_filter(settings.filter) {
        warn!("Filter not applied: {:?}", e);
    }
    if let Err(e) = driver.set_heater_profile(settings.heater_profile()) {
        warn!("Heater profile not applied: {:?}", e);
    }
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    rtt_target::rtt_init_defmt!();

    let hal_config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(hal_config);

    let timer0 = SystemTimer::new(peripherals.SYSTIMER);
    esp_hal_embassy::init(timer0.alarm0);

    info!("Embassy initialized!");

    let config = NodeConfig::default();

    // ── BME68x on GPIO4 (SDA) / GPIO5 (SCL) ──────────────────────────────────
    let i2c_config = I2cConfig::default().with_frequency(Rate::from_khz(400));
    let raw = match I2c::new(peripherals.I2C0, i2c_config) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO4).with_scl(peripherals.GPIO5),
        Err(_) => {
            error!("I2C initialization failed");
            loop {
                Timer::after(Duration::from_millis(1000)).await;
            }
        }
    };
    let raw_i2c = RAW_I2C_CELL.init(raw);

    // wrap esp-hal I²C so it satisfies the driver (eh-0.2) traits
    let transport = I2cTransport::new(
        I2cCompat::new(raw_i2c),
        config.sensor.i2c_address,
        BusyWaitDelay::new(EspClock),
    );

    let mut driver = match SensorDriver::initialize(transport) {
        Ok(driver) => driver,
        Err(e) => {
            error!("BME68x not available: {:?}", e);
            error!("Check connections: SDA=GPIO4, SCL=GPIO5, VCC=3.3V, GND=GND");
            loop {
                Timer::after(Duration::from_millis(1000)).await;
            }
        }
    };
    configure(&mut driver, &config);

    let sensor: &'static SensorState = SENSOR_CELL.init(SharedSensorState::new(driver));

    // ── MH-Z19C on UART1, GPIO6 (TX) / GPIO7 (RX) ────────────────────────────
    let uart_config = UartConfig::default().with_baudrate(CO2_BAUD_RATE);
    let uart = match Uart::new(peripherals.UART1, uart_config) {
        Ok(uart) => uart
            .with_tx(peripherals.GPIO6)
            .with_rx(peripherals.GPIO7)
            .into_async(),
        Err(_) => {
            error!("UART initialization failed");
            loop {
                Timer::after(Duration::from_millis(1000)).await;
            }
        }
    };

    let mut co2 = Mhz19c::new(uart, Delay);
    if let Err(e) = co2.set_self_calibration(config.co2_self_calibration).await {
        warn!("MH-Z19C self calibration not set: {:?}", e);
    }

    // ── periodic tasks ───────────────────────────────────────────────────────
    let report_period = Duration::from_millis(config.report_period_ms);
    let display_period = Duration::from_millis(config.display_period_ms);

    if spawner
        .spawn(reporting_task(sensor, co2, config.sensor_id, report_period))
        .is_err()
    {
        error!("Could not spawn the reporting task");
    }
    if spawner.spawn(display_task(sensor, display_period)).is_err() {
        error!("Could not spawn the display task");
    }

    // Nothing else to do here; park the main task.
    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
