//! Factory calibration and the floating-point compensation formulas.

use super::regs;

/// Byte offsets of the coefficients inside the concatenated calibration dump
/// (`0x8A..`, `0xE1..`, `0x00..`).
mod idx {
    pub const T2_LSB: usize = 0;
    pub const T2_MSB: usize = 1;
    pub const T3: usize = 2;
    pub const P1_LSB: usize = 4;
    pub const P1_MSB: usize = 5;
    pub const P2_LSB: usize = 6;
    pub const P2_MSB: usize = 7;
    pub const P3: usize = 8;
    pub const P4_LSB: usize = 10;
    pub const P4_MSB: usize = 11;
    pub const P5_LSB: usize = 12;
    pub const P5_MSB: usize = 13;
    pub const P7: usize = 14;
    pub const P6: usize = 15;
    pub const P8_LSB: usize = 18;
    pub const P8_MSB: usize = 19;
    pub const P9_LSB: usize = 20;
    pub const P9_MSB: usize = 21;
    pub const P10: usize = 22;
    pub const H2_MSB: usize = 23;
    pub const H2_LSB: usize = 24;
    pub const H1_LSB: usize = 24;
    pub const H1_MSB: usize = 25;
    pub const H3: usize = 26;
    pub const H4: usize = 27;
    pub const H5: usize = 28;
    pub const H6: usize = 29;
    pub const H7: usize = 30;
    pub const T1_LSB: usize = 31;
    pub const T1_MSB: usize = 32;
    pub const GH2_LSB: usize = 33;
    pub const GH2_MSB: usize = 34;
    pub const GH1: usize = 35;
    pub const GH3: usize = 36;
    pub const RES_HEAT_VAL: usize = 37;
    pub const RES_HEAT_RANGE: usize = 39;
    pub const RANGE_SW_ERR: usize = 41;
}

/// Per-range correction factors for the BME680 gas ADC.
const LOOKUP_K1_RANGE: [f32; 16] = [
    0.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, -0.8, 0.0, 0.0, -0.2, -0.5, 0.0, -1.0, 0.0, 0.0,
];
const LOOKUP_K2_RANGE: [f32; 16] = [
    0.0, 0.0, 0.0, 0.0, 0.1, 0.7, 0.0, -0.8, -0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
];

/// Factory-fused coefficients, unique to every chip.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CalibData {
    pub par_h1: u16,
    pub par_h2: u16,
    pub par_h3: i8,
    pub par_h4: i8,
    pub par_h5: i8,
    pub par_h6: u8,
    pub par_h7: i8,
    pub par_gh1: i8,
    pub par_gh2: i16,
    pub par_gh3: i8,
    pub par_t1: u16,
    pub par_t2: i16,
    pub par_t3: i8,
    pub par_p1: u16,
    pub par_p2: i16,
    pub par_p3: i8,
    pub par_p4: i16,
    pub par_p5: i16,
    pub par_p6: i8,
    pub par_p7: i8,
    pub par_p8: i16,
    pub par_p9: i16,
    pub par_p10: u8,
    pub res_heat_range: u8,
    pub res_heat_val: i8,
    pub range_sw_err: i8,
}

#[inline]
fn concat_u16(msb: u8, lsb: u8) -> u16 {
    ((msb as u16) << 8) | lsb as u16
}

impl CalibData {
    /// Decodes the 42-byte calibration dump.
    pub fn from_bytes(c: &[u8; regs::LEN_COEFF_ALL]) -> Self {
        Self {
            par_t1: concat_u16(c[idx::T1_MSB], c[idx::T1_LSB]),
            par_t2: concat_u16(c[idx::T2_MSB], c[idx::T2_LSB]) as i16,
            par_t3: c[idx::T3] as i8,
            par_p1: concat_u16(c[idx::P1_MSB], c[idx::P1_LSB]),
            par_p2: concat_u16(c[idx::P2_MSB], c[idx::P2_LSB]) as i16,
            par_p3: c[idx::P3] as i8,
            par_p4: concat_u16(c[idx::P4_MSB], c[idx::P4_LSB]) as i16,
            par_p5: concat_u16(c[idx::P5_MSB], c[idx::P5_LSB]) as i16,
            par_p6: c[idx::P6] as i8,
            par_p7: c[idx::P7] as i8,
            par_p8: concat_u16(c[idx::P8_MSB], c[idx::P8_LSB]) as i16,
            par_p9: concat_u16(c[idx::P9_MSB], c[idx::P9_LSB]) as i16,
            par_p10: c[idx::P10],
            par_h1: ((c[idx::H1_MSB] as u16) << 4) | (c[idx::H1_LSB] & regs::H1_DATA_MSK) as u16,
            par_h2: ((c[idx::H2_MSB] as u16) << 4) | (c[idx::H2_LSB] >> 4) as u16,
            par_h3: c[idx::H3] as i8,
            par_h4: c[idx::H4] as i8,
            par_h5: c[idx::H5] as i8,
            par_h6: c[idx::H6],
            par_h7: c[idx::H7] as i8,
            par_gh1: c[idx::GH1] as i8,
            par_gh2: concat_u16(c[idx::GH2_MSB], c[idx::GH2_LSB]) as i16,
            par_gh3: c[idx::GH3] as i8,
            res_heat_range: (c[idx::RES_HEAT_RANGE] & regs::RHRANGE_MSK) >> 4,
            res_heat_val: c[idx::RES_HEAT_VAL] as i8,
            range_sw_err: ((c[idx::RANGE_SW_ERR] & regs::RSERROR_MSK) as i8) / 16,
        }
    }

    /// Temperature in °C plus the `t_fine` carried into pressure and humidity.
    pub fn temperature(&self, temp_adc: u32) -> (f32, f32) {
        let adc = temp_adc as f32;
        let t1 = self.par_t1 as f32;
        let var1 = ((adc / 16384.0) - (t1 / 1024.0)) * self.par_t2 as f32;
        let var2 = ((adc / 131072.0) - (t1 / 8192.0))
            * ((adc / 131072.0) - (t1 / 8192.0))
            * (self.par_t3 as f32 * 16.0);
        let t_fine = var1 + var2;

        (t_fine / 5120.0, t_fine)
    }

    /// Pressure in Pa.
    pub fn pressure(&self, pres_adc: u32, t_fine: f32) -> f32 {
        let mut var1 = (t_fine / 2.0) - 64000.0;
        let mut var2 = var1 * var1 * (self.par_p6 as f32 / 131072.0);
        var2 += var1 * self.par_p5 as f32 * 2.0;
        var2 = (var2 / 4.0) + (self.par_p4 as f32 * 65536.0);
        var1 = (((self.par_p3 as f32 * var1 * var1) / 16384.0) + (self.par_p2 as f32 * var1))
            / 524288.0;
        var1 = (1.0 + (var1 / 32768.0)) * self.par_p1 as f32;

        // Avoid the division by zero on an all-zero calibration.
        if var1 as i32 == 0 {
            return 0.0;
        }

        let mut pres = 1048576.0 - pres_adc as f32;
        pres = ((pres - (var2 / 4096.0)) * 6250.0) / var1;
        let var1 = (self.par_p9 as f32 * pres * pres) / 2147483648.0;
        let var2 = pres * (self.par_p8 as f32 / 32768.0);
        let var3 = (pres / 256.0) * (pres / 256.0) * (pres / 256.0) * (self.par_p10 as f32 / 131072.0);

        pres + (var1 + var2 + var3 + (self.par_p7 as f32 * 128.0)) / 16.0
    }

    /// Relative humidity in %, clamped to 0..=100.
    pub fn humidity(&self, hum_adc: u16, t_fine: f32) -> f32 {
        let temp_comp = t_fine / 5120.0;
        let var1 = hum_adc as f32
            - ((self.par_h1 as f32 * 16.0) + ((self.par_h3 as f32 / 2.0) * temp_comp));
        let var2 = var1
            * ((self.par_h2 as f32 / 262144.0)
                * (1.0
                    + ((self.par_h4 as f32 / 16384.0) * temp_comp)
                    + ((self.par_h5 as f32 / 1048576.0) * temp_comp * temp_comp)));
        let var3 = self.par_h6 as f32 / 16384.0;
        let var4 = self.par_h7 as f32 / 2097152.0;

        let hum = var2 + ((var3 + (var4 * temp_comp)) * var2 * var2);
        hum.clamp(0.0, 100.0)
    }

    /// Gas resistance in Ω for the BME680 ("low" gas variant).
    pub fn gas_resistance_low(&self, gas_adc: u16, gas_range: u8) -> f32 {
        let range = (gas_range & regs::GAS_RANGE_MSK) as usize;
        let gas_range_f = (1u32 << range) as f32;

        let var1 = 1340.0 + (5.0 * self.range_sw_err as f32);
        let var2 = var1 * (1.0 + LOOKUP_K1_RANGE[range] / 100.0);
        let var3 = 1.0 + (LOOKUP_K2_RANGE[range] / 100.0);

        1.0 / (var3 * 0.000000125 * gas_range_f * (((gas_adc as f32 - 512.0) / var2) + 1.0))
    }

    /// Gas resistance in Ω for the BME688 ("high" gas variant).
    pub fn gas_resistance_high(&self, gas_adc: u16, gas_range: u8) -> f32 {
        let var1 = (262144u32 >> (gas_range & regs::GAS_RANGE_MSK)) as f32;
        let var2 = 4096.0 + (gas_adc as f32 - 512.0) * 3.0;

        1000000.0 * var1 / var2
    }

    /// Heater resistance register value for a target temperature.
    ///
    /// The target is capped at 400 °C to protect the hot plate.
    pub fn res_heat(&self, temperature: u16, ambient: i8) -> u8 {
        let temp = temperature.min(400) as f32;

        let var1 = (self.par_gh1 as f32 / 16.0) + 49.0;
        let var2 = ((self.par_gh2 as f32 / 32768.0) * 0.0005) + 0.00235;
        let var3 = self.par_gh3 as f32 / 1024.0;
        let var4 = var1 * (1.0 + (var2 * temp));
        let var5 = var4 + (var3 * ambient as f32);

        let res_heat = 3.4
            * ((var5
                * (4.0 / (4.0 + self.res_heat_range as f32))
                * (1.0 / (1.0 + (self.res_heat_val as f32 * 0.002))))
                - 25.0);

        res_heat as u8
    }
}

/// Encodes a heating time (ms) as 6-bit mantissa and 2-bit ×4 exponent.
pub fn gas_wait(duration_ms: u16) -> u8 {
    if duration_ms >= 0xFC0 {
        return 0xFF;
    }

    let mut dur = duration_ms;
    let mut factor = 0u8;
    while dur > 0x3F {
        dur /= 4;
        factor += 1;
    }

    dur as u8 + factor * 64
}

/// Encodes the shared heater duration of parallel mode (ms, 0.477 ms steps).
pub fn shared_heater_duration(duration_ms: u16) -> u8 {
    if duration_ms >= 0x783 {
        return 0xFF;
    }

    let mut heatdur = (duration_ms as u32 * 1000) / 477;
    let mut factor = 0u8;
    while heatdur > 0x3F {
        heatdur >>= 2;
        factor += 1;
    }

    heatdur as u8 + factor * 64
}
