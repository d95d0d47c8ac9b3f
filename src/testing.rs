//! Register-file model of a BME680 used by the unit tests.

use std::vec::Vec;

use crate::hal::{CommError, RegisterTransport};

const TEMP_ADC_25C: u32 = 490_258;
const HUM_ADC_50PCT: u16 = 24_307;
const PRES_ADC: u32 = 400_000;

pub(crate) struct FakeBme68x {
    pub regs: [u8; 256],
    /// Every register write as `(address, value)`, in bus order.
    pub writes: Vec<(u8, u8)>,
    pub delays: Vec<u32>,
    pub fail_reads: bool,
    pub fail_writes: bool,
    /// Forced measurements complete instantly and the mode bits read back as sleep.
    pub auto_sleep: bool,
}

impl FakeBme68x {
    /// Chip id 0x61, low gas variant and a calibration under which
    /// [`with_field`](Self::with_field) yields 25 °C and 50 %RH.
    pub fn new() -> Self {
        let mut regs = [0u8; 256];
        regs[0xD0] = 0x61;
        regs[0xF0] = 0x00;

        // par_t2 = 26000, par_t3 = 3
        regs[0x8A] = (26_000u16 & 0xFF) as u8;
        regs[0x8B] = (26_000u16 >> 8) as u8;
        regs[0x8C] = 3;
        // par_p1 = 36000
        regs[0x8E] = (36_000u16 & 0xFF) as u8;
        regs[0x8F] = (36_000u16 >> 8) as u8;
        // par_h2 = 1000, par_h1 = 700, sharing the nibbles of 0xE2
        regs[0xE1] = 0x3E;
        regs[0xE2] = 0x8C;
        regs[0xE3] = 0x2B;
        // par_t1 = 25600
        regs[0xE9] = (25_600u16 & 0xFF) as u8;
        regs[0xEA] = (25_600u16 >> 8) as u8;

        Self {
            regs,
            writes: Vec::new(),
            delays: Vec::new(),
            fail_reads: false,
            fail_writes: false,
            auto_sleep: false,
        }
    }

    /// Places a new-data field in `slot` with the given measurement index and
    /// raw gas ADC value (range 4, gas valid, heater stable).
    pub fn with_field(mut self, slot: usize, meas_index: u8, gas_adc: u16) -> Self {
        self.put_field(slot, meas_index, gas_adc);
        self
    }

    pub fn put_field(&mut self, slot: usize, meas_index: u8, gas_adc: u16) {
        let base = 0x1D + 17 * slot;
        let block = &mut self.regs[base..base + 17];

        block[0] = 0x80;
        block[1] = meas_index;
        block[2] = (PRES_ADC >> 12) as u8;
        block[3] = (PRES_ADC >> 4) as u8;
        block[4] = ((PRES_ADC & 0x0F) << 4) as u8;
        block[5] = (TEMP_ADC_25C >> 12) as u8;
        block[6] = (TEMP_ADC_25C >> 4) as u8;
        block[7] = ((TEMP_ADC_25C & 0x0F) << 4) as u8;
        block[8] = (HUM_ADC_50PCT >> 8) as u8;
        block[9] = HUM_ADC_50PCT as u8;
        block[13] = (gas_adc >> 2) as u8;
        block[14] = (((gas_adc & 0x03) as u8) << 6) | 0x20 | 0x10 | 0x04;
    }

    fn store(&mut self, addr: u8, value: u8) {
        self.writes.push((addr, value));

        let value = if addr == 0x74 && self.auto_sleep && value & 0x03 == 0x01 {
            value & !0x03
        } else {
            value
        };
        self.regs[addr as usize] = value;
    }
}

impl RegisterTransport for FakeBme68x {
    fn write(&mut self, reg_addr: u8, data: &[u8]) -> Result<(), CommError> {
        if self.fail_writes {
            return Err(CommError::Bus);
        }
        let Some((first, pairs)) = data.split_first() else {
            return Ok(());
        };

        self.store(reg_addr, *first);
        for pair in pairs.chunks_exact(2) {
            self.store(pair[0], pair[1]);
        }
        Ok(())
    }

    fn read(&mut self, reg_addr: u8, buf: &mut [u8]) -> Result<(), CommError> {
        if self.fail_reads {
            return Err(CommError::Bus);
        }
        let start = reg_addr as usize;
        buf.copy_from_slice(&self.regs[start..start + buf.len()]);
        Ok(())
    }

    fn delay_us(&mut self, period: u32) {
        self.delays.push(period);
    }
}
