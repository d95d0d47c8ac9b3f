use super::calc::CalibData;
use super::regs;

/// One compensated measurement as delivered by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FieldData {
    /// Raw status byte: new-data, gas-valid and heater-stable flags.
    pub status: u8,
    /// Heater profile step used for this field.
    pub gas_index: u8,
    /// Running measurement counter, used to order parallel/sequential fields.
    pub meas_index: u8,
    /// Temperature in °C.
    pub temperature: f32,
    /// Pressure in Pa.
    pub pressure: f32,
    /// Relative humidity in %.
    pub humidity: f32,
    /// Gas resistance in Ω.
    pub gas_resistance: f32,
}

impl FieldData {
    pub fn is_new(&self) -> bool {
        self.status & regs::NEW_DATA_MSK != 0
    }

    pub fn gas_valid(&self) -> bool {
        self.status & regs::GASM_VALID_MSK != 0
    }

    pub fn heater_stable(&self) -> bool {
        self.status & regs::HEAT_STAB_MSK != 0
    }

    /// Decodes and compensates one 17-byte field block.
    pub(crate) fn decode(buf: &[u8], variant_id: u8, calib: &CalibData) -> Self {
        let pres_adc =
            ((buf[2] as u32) << 12) | ((buf[3] as u32) << 4) | ((buf[4] as u32) >> 4);
        let temp_adc =
            ((buf[5] as u32) << 12) | ((buf[6] as u32) << 4) | ((buf[7] as u32) >> 4);
        let hum_adc = ((buf[8] as u16) << 8) | buf[9] as u16;

        let mut status = buf[0] & regs::NEW_DATA_MSK;
        let gas_index = buf[0] & regs::GAS_INDEX_MSK;
        let meas_index = buf[1];

        let (temperature, t_fine) = calib.temperature(temp_adc);
        let pressure = calib.pressure(pres_adc, t_fine);
        let humidity = calib.humidity(hum_adc, t_fine);

        let gas_resistance = if variant_id == regs::VARIANT_GAS_HIGH {
            let gas_adc = ((buf[15] as u16) << 2) | ((buf[16] as u16) >> 6);
            let gas_range = buf[16] & regs::GAS_RANGE_MSK;
            status |= buf[16] & (regs::GASM_VALID_MSK | regs::HEAT_STAB_MSK);
            calib.gas_resistance_high(gas_adc, gas_range)
        } else {
            let gas_adc = ((buf[13] as u16) << 2) | ((buf[14] as u16) >> 6);
            let gas_range = buf[14] & regs::GAS_RANGE_MSK;
            status |= buf[14] & (regs::GASM_VALID_MSK | regs::HEAT_STAB_MSK);
            calib.gas_resistance_low(gas_adc, gas_range)
        };

        Self {
            status,
            gas_index,
            meas_index,
            temperature,
            pressure,
            humidity,
            gas_resistance,
        }
    }
}

/// Fields captured by the last fetch, with the read cursor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldBuffer {
    pub(crate) fields: [FieldData; regs::N_FIELDS],
    /// Number of valid fields after the last fetch (0..=3).
    pub(crate) n_fields: u8,
    /// Read cursor (0..=2).
    pub(crate) i_fields: u8,
}

impl FieldBuffer {
    pub fn n_fields(&self) -> u8 {
        self.n_fields
    }

    pub fn fields(&self) -> &[FieldData; regs::N_FIELDS] {
        &self.fields
    }

    pub(crate) fn reset(&mut self) {
        self.n_fields = 0;
        self.i_fields = 0;
    }

    /// Stores the new fields in measurement order, oldest first.
    ///
    /// The measurement index wraps at 255, so ordering compares the
    /// wrapping distance instead of the raw value.
    pub(crate) fn store(&mut self, decoded: &[FieldData]) {
        let mut n = 0usize;
        for field in decoded.iter().filter(|f| f.is_new()) {
            self.fields[n] = *field;
            n += 1;
        }

        let sorted = &mut self.fields[..n];
        for i in 1..sorted.len() {
            let mut j = i;
            while j > 0 && (sorted[j].meas_index.wrapping_sub(sorted[j - 1].meas_index) as i8) < 0 {
                sorted.swap(j, j - 1);
                j -= 1;
            }
        }

        self.n_fields = n as u8;
    }

    /// Next field in parallel/sequential mode plus how many remain queued.
    ///
    /// Once exhausted the cursor stays on the last field, which keeps being
    /// returned with zero remaining until the next fetch.
    pub(crate) fn next(&mut self) -> (FieldData, u8) {
        if self.n_fields == 0 {
            return (self.fields[self.i_fields as usize], 0);
        }

        let field = self.fields[self.i_fields as usize];
        self.i_fields += 1;

        if self.i_fields >= self.n_fields {
            self.i_fields = self.n_fields - 1;
            return (field, 0);
        }

        (field, self.n_fields - self.i_fields)
    }
}
