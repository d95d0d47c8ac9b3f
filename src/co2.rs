//! # Winsen MH-Z19C CO2 sensor
//!
//! UART protocol, 9600 8N1. Every command is a 9-byte frame
//! `0xFF 0x01 cmd p0 p1 p2 p3 p4 checksum`, the answer to a read is another
//! 9-byte frame with the concentration in bytes 2 and 3.

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Read, Write};

pub const FRAME_LEN: usize = 9;

const START_BYTE: u8 = 0xFF;
const SENSOR_NUMBER: u8 = 0x01;

pub const CMD_READ_CO2: u8 = 0x86;
pub const CMD_SELF_CALIBRATION: u8 = 0x79;

const SELF_CALIBRATION_ON: u8 = 0xA0;
const SELF_CALIBRATION_OFF: u8 = 0x00;

/// How long to wait for the answer to a read command.
pub const RESPONSE_TIMEOUT_MS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Co2Error {
    /// The request could not be sent.
    Write,
    /// The UART failed while receiving.
    Read,
    /// No complete answer within [`RESPONSE_TIMEOUT_MS`].
    Timeout,
    /// The answer arrived but its checksum does not match.
    Checksum,
}

/// Checksum over bytes 1..=7 of a frame: `(0xFF - sum) + 1`, modulo 256.
pub fn checksum(frame: &[u8; FRAME_LEN]) -> u8 {
    let sum = frame[1..8].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    (0xFF - sum).wrapping_add(1)
}

/// Builds a complete request frame.
pub fn command(cmd: u8, payload: [u8; 5]) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0] = START_BYTE;
    frame[1] = SENSOR_NUMBER;
    frame[2] = cmd;
    frame[3..8].copy_from_slice(&payload);
    frame[8] = checksum(&frame);
    frame
}

pub struct Mhz19c<U, D> {
    uart: U,
    delay: D,
}

impl<U, D> Mhz19c<U, D>
where
    U: Read + Write,
    D: DelayNs,
{
    pub fn new(uart: U, delay: D) -> Self {
        Self { uart, delay }
    }

    async fn send(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), Co2Error> {
        self.uart.write_all(frame).await.map_err(|_| Co2Error::Write)?;
        self.uart.flush().await.map_err(|_| Co2Error::Write)
    }

    /// Requests one reading, in ppm.
    pub async fn read_co2(&mut self) -> Result<u16, Co2Error> {
        self.send(&command(CMD_READ_CO2, [0; 5])).await?;

        let mut response = [0u8; FRAME_LEN];
        match select(
            self.uart.read_exact(&mut response),
            self.delay.delay_ms(RESPONSE_TIMEOUT_MS),
        )
        .await
        {
            Either::First(Ok(())) => {}
            Either::First(Err(_)) => return Err(Co2Error::Read),
            Either::Second(()) => return Err(Co2Error::Timeout),
        }

        if response[8] != checksum(&response) {
            return Err(Co2Error::Checksum);
        }

        Ok(u16::from_be_bytes([response[2], response[3]]))
    }

    /// Reading in ppm, or −1 when the sensor could not be read.
    pub async fn co2_ppm(&mut self) -> i32 {
        match self.read_co2().await {
            Ok(ppm) => ppm as i32,
            Err(e) => {
                warn!("MH-Z19C read failed: {:?}", e);
                -1
            }
        }
    }

    /// Turns the automatic baseline correction on or off.
    pub async fn set_self_calibration(&mut self, enable: bool) -> Result<(), Co2Error> {
        let mode = if enable {
            SELF_CALIBRATION_ON
        } else {
            SELF_CALIBRATION_OFF
        };
        self.send(&command(CMD_SELF_CALIBRATION, [mode, 0, 0, 0, 0]))
            .await?;
        info!("MH-Z19C self calibration: {}", enable);
        Ok(())
    }

    pub fn release(self) -> (U, D) {
        (self.uart, self.delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::ErrorKind;
    use futures::executor::block_on;
    use std::collections::VecDeque;
    use std::vec::Vec;

    #[derive(Default)]
    struct FakeUart {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
        fail_write: bool,
        fail_read: bool,
    }

    impl embedded_io_async::ErrorType for FakeUart {
        type Error = ErrorKind;
    }

    impl Write for FakeUart {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, ErrorKind> {
            if self.fail_write {
                return Err(ErrorKind::Other);
            }
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        async fn flush(&mut self) -> Result<(), ErrorKind> {
            Ok(())
        }
    }

    impl Read for FakeUart {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, ErrorKind> {
            if self.fail_read {
                return Err(ErrorKind::Other);
            }
            if self.rx.is_empty() {
                // silent sensor
                core::future::pending::<()>().await;
            }
            let n = buf.len().min(self.rx.len());
            for slot in buf[..n].iter_mut() {
                *slot = self.rx.pop_front().unwrap_or(0);
            }
            Ok(n)
        }
    }

    struct NoDelay;

    impl DelayNs for NoDelay {
        async fn delay_ns(&mut self, _ns: u32) {}
    }

    fn response(ppm: u16) -> [u8; FRAME_LEN] {
        let mut frame = [0xFF, 0x86, (ppm >> 8) as u8, ppm as u8, 0x47, 0, 0, 0, 0];
        frame[8] = checksum(&frame);
        frame
    }

    fn sensor(rx: &[u8]) -> Mhz19c<FakeUart, NoDelay> {
        let uart = FakeUart {
            rx: rx.iter().copied().collect(),
            ..Default::default()
        };
        Mhz19c::new(uart, NoDelay)
    }

    #[test]
    fn read_command_frame() {
        assert_eq!(
            command(CMD_READ_CO2, [0; 5]),
            [0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x79]
        );
    }

    #[test]
    fn reads_concentration() {
        let mut sensor = sensor(&response(608));
        assert_eq!(block_on(sensor.read_co2()), Ok(608));

        let (uart, _) = sensor.release();
        assert_eq!(uart.tx, command(CMD_READ_CO2, [0; 5]));
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let mut frame = response(608);
        frame[8] ^= 0x01;
        let mut sensor = sensor(&frame);
        assert_eq!(block_on(sensor.read_co2()), Err(Co2Error::Checksum));
        assert_eq!(block_on(sensor.co2_ppm()), -1);
    }

    #[test]
    fn silent_sensor_times_out() {
        let mut sensor = sensor(&[]);
        assert_eq!(block_on(sensor.read_co2()), Err(Co2Error::Timeout));
    }

    #[test]
    fn short_answer_times_out() {
        let mut sensor = sensor(&response(400)[..5]);
        assert_eq!(block_on(sensor.co2_ppm()), -1);
    }

    #[test]
    fn uart_failures_map_to_errors() {
        let mut sensor = sensor(&response(400));
        sensor.uart.fail_write = true;
        assert_eq!(block_on(sensor.read_co2()), Err(Co2Error::Write));

        sensor.uart.fail_write = false;
        sensor.uart.fail_read = true;
        assert_eq!(block_on(sensor.read_co2()), Err(Co2Error::Read));
    }

    #[test]
    fn co2_ppm_passes_reading_through() {
        let mut sensor = sensor(&response(1234));
        assert_eq!(block_on(sensor.co2_ppm()), 1234);
    }

    #[test]
    fn self_calibration_frames() {
        let mut sensor = sensor(&[]);
        block_on(sensor.set_self_calibration(true)).unwrap();
        block_on(sensor.set_self_calibration(false)).unwrap();

        let (uart, _) = sensor.release();
        assert_eq!(
            uart.tx[..FRAME_LEN],
            [0xFF, 0x01, 0x79, 0xA0, 0x00, 0x00, 0x00, 0x00, 0xE6]
        );
        assert_eq!(
            uart.tx[FRAME_LEN..],
            [0xFF, 0x01, 0x79, 0x00, 0x00, 0x00, 0x00, 0x00, 0x86]
        );
    }
}
