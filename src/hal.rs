// ─────────────────────────────────────────────────────────────────────────────
// Bus plumbing underneath the BME68x driver.
//
// The driver only ever talks to a `RegisterTransport`; the I²C flavour below
// adapts any `embedded-hal 0.2` blocking bus, and on the ESP32-C6 the shim
// from esp-hal's `embedded-hal 1.0` I²C is kept here as well.

use embedded_hal_02::blocking::delay::DelayUs;
use embedded_hal_02::blocking::i2c::{Write, WriteRead};

/// Largest register write the I²C transport can frame (address byte included).
pub const I2C_BUFFER_SIZE: usize = 64;

/// Default BME68x address with SDO pulled high.
pub const BME68X_I2C_ADDR_HIGH: u8 = 0x77;
/// BME68x address with SDO pulled low.
pub const BME68X_I2C_ADDR_LOW: u8 = 0x76;

/// Bus-level failure reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommError {
    /// The bus transaction itself failed (NACK, arbitration, timeout …).
    Bus,
    /// The payload does not fit into the transport's frame buffer.
    BufferOverflow,
}

/// Register-oriented byte transport used by the sensor driver.
///
/// Calls block until the transaction completed or failed.
pub trait RegisterTransport {
    /// Writes `data` starting at `reg_addr`.
    fn write(&mut self, reg_addr: u8, data: &[u8]) -> Result<(), CommError>;

    /// Fills `buf` with consecutive registers starting at `reg_addr`.
    fn read(&mut self, reg_addr: u8, buf: &mut [u8]) -> Result<(), CommError>;

    /// Blocks for at least `period` microseconds.
    fn delay_us(&mut self, period: u32);
}

/// Free-running microsecond counter. Wraps around at `u32::MAX`.
pub trait MonotonicClock {
    fn now_us(&mut self) -> u32;
}

/// Busy-wait delay on top of a [`MonotonicClock`].
///
/// Tolerates the counter wrapping during the wait: only the elapsed time,
/// taken modulo 2^32, is compared against the period.
pub struct BusyWaitDelay<C> {
    clock: C,
}

impl<C: MonotonicClock> BusyWaitDelay<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn wait_us(&mut self, period_us: u32) {
        if period_us == 0 {
            return;
        }

        let start = self.clock.now_us();
        while self.clock.now_us().wrapping_sub(start) < period_us {
            core::hint::spin_loop();
        }
    }

    pub fn release(self) -> C {
        self.clock
    }
}

impl<C: MonotonicClock> DelayUs<u32> for BusyWaitDelay<C> {
    fn delay_us(&mut self, us: u32) {
        self.wait_us(us);
    }
}

/// [`RegisterTransport`] over a blocking `embedded-hal 0.2` I²C bus.
pub struct I2cTransport<I2C, D> {
    i2c: I2C,
    address: u8,
    delay: D,
}

impl<I2C, D, E> I2cTransport<I2C, D>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayUs<u32>,
{
    pub fn new(i2c: I2C, address: u8, delay: D) -> Self {
        Self {
            i2c,
            address,
            delay,
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }
}

impl<I2C, D, E> RegisterTransport for I2cTransport<I2C, D>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
    D: DelayUs<u32>,
{
    fn write(&mut self, reg_addr: u8, data: &[u8]) -> Result<(), CommError> {
        if data.len() >= I2C_BUFFER_SIZE {
            return Err(CommError::BufferOverflow);
        }

        let mut buf = [0u8; I2C_BUFFER_SIZE];
        buf[0] = reg_addr;
        buf[1..=data.len()].copy_from_slice(data);

        self.i2c
            .write(self.address, &buf[..=data.len()])
            .map_err(|_| CommError::Bus)
    }

    fn read(&mut self, reg_addr: u8, buf: &mut [u8]) -> Result<(), CommError> {
        self.i2c
            .write_read(self.address, &[reg_addr], buf)
            .map_err(|_| CommError::Bus)
    }

    fn delay_us(&mut self, period: u32) {
        self.delay.delay_us(period);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ESP32-C6 glue: lets the `embedded-hal 1.0` esp-hal I²C satisfy the blocking
// `embedded-hal 0.2` traits used above, plus the system timer as clock.

#[cfg(feature = "esp32c6")]
pub use esp::{EspClock, HalI2c, I2cCompat};

#[cfg(feature = "esp32c6")]
mod esp {
    use super::MonotonicClock;
    use embedded_hal_02::blocking::i2c::{Write, WriteRead};
    use esp_hal::i2c::master::I2c;

    pub type HalI2c<'a> = I2c<'a, esp_hal::Blocking>;

    pub struct I2cCompat<'a> {
        pub inner: &'a mut HalI2c<'a>,
    }

    impl<'a> I2cCompat<'a> {
        pub fn new(inner: &'a mut HalI2c<'a>) -> Self {
            Self { inner }
        }
    }

    impl<'a> Write for I2cCompat<'a> {
        type Error = esp_hal::i2c::master::Error;
        fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
            self.inner.write(addr, bytes)
        }
    }

    impl<'a> WriteRead for I2cCompat<'a> {
        type Error = esp_hal::i2c::master::Error;
        fn write_read(&mut self, addr: u8, bytes: &[u8], buf: &mut [u8]) -> Result<(), Self::Error> {
            self.inner.write_read(addr, bytes, buf)
        }
    }

    /// Microsecond counter backed by the esp-hal system timer.
    #[derive(Clone, Copy, Default)]
    pub struct EspClock;

    impl MonotonicClock for EspClock {
        fn now_us(&mut self) -> u32 {
            esp_hal::time::Instant::now()
                .duration_since_epoch()
                .as_micros() as u32
        }
    }
}
