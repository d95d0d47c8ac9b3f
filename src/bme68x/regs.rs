//! BME68x register map and bit fields.

pub const CHIP_ID: u8 = 0x61;

pub const ADDR_CHIP_ID: u8 = 0xD0;
pub const ADDR_VARIANT_ID: u8 = 0xF0;
pub const ADDR_SOFT_RESET: u8 = 0xE0;
pub const SOFT_RESET_CMD: u8 = 0xB6;
pub const ADDR_UNIQUE_ID: u8 = 0x83;

/// Calibration coefficients live in three non-contiguous blocks.
pub const ADDR_COEFF_1: u8 = 0x8A;
pub const ADDR_COEFF_2: u8 = 0xE1;
pub const ADDR_COEFF_3: u8 = 0x00;
pub const LEN_COEFF_1: usize = 23;
pub const LEN_COEFF_2: usize = 14;
pub const LEN_COEFF_3: usize = 5;
pub const LEN_COEFF_ALL: usize = LEN_COEFF_1 + LEN_COEFF_2 + LEN_COEFF_3;

pub const ADDR_FIELD_0: u8 = 0x1D;
pub const LEN_FIELD: usize = 17;
pub const N_FIELDS: usize = 3;

/// Largest single transaction: three measurement fields.
pub const MAX_READ_LENGTH: usize = LEN_FIELD * N_FIELDS;
/// Largest register write in one go: ten heater steps, (address, value) each.
pub const MAX_WRITE_PAIRS: usize = 10;

pub const ADDR_RES_HEAT_0: u8 = 0x5A;
pub const ADDR_GAS_WAIT_0: u8 = 0x64;
pub const ADDR_SHD_HEATR_DUR: u8 = 0x6E;
pub const ADDR_CTRL_GAS_0: u8 = 0x70;
pub const ADDR_CTRL_GAS_1: u8 = 0x71;
pub const ADDR_CTRL_MEAS: u8 = 0x74;

/// Number of configuration registers starting at `ADDR_CTRL_GAS_1`.
pub const LEN_CONFIG: usize = 5;

pub const VARIANT_GAS_LOW: u8 = 0x00;
pub const VARIANT_GAS_HIGH: u8 = 0x01;

// ctrl_meas
pub const MODE_MSK: u8 = 0x03;
pub const OST_MSK: u8 = 0xE0;
pub const OST_POS: u8 = 5;
pub const OSP_MSK: u8 = 0x1C;
pub const OSP_POS: u8 = 2;
// ctrl_hum
pub const OSH_MSK: u8 = 0x07;
// config
pub const FILTER_MSK: u8 = 0x1C;
pub const FILTER_POS: u8 = 2;
pub const ODR20_MSK: u8 = 0xE0;
pub const ODR20_POS: u8 = 5;
// ctrl_gas_1
pub const ODR3_MSK: u8 = 0x80;
pub const ODR3_POS: u8 = 7;
pub const NBCONV_MSK: u8 = 0x0F;
pub const RUN_GAS_MSK: u8 = 0x30;
pub const RUN_GAS_POS: u8 = 4;
pub const ENABLE_GAS_MEAS_L: u8 = 0x01;
pub const ENABLE_GAS_MEAS_H: u8 = 0x02;
// ctrl_gas_0
pub const HCTRL_MSK: u8 = 0x08;
pub const HCTRL_POS: u8 = 3;

// field status byte
pub const NEW_DATA_MSK: u8 = 0x80;
pub const GAS_INDEX_MSK: u8 = 0x0F;
pub const GAS_RANGE_MSK: u8 = 0x0F;
pub const GASM_VALID_MSK: u8 = 0x20;
pub const HEAT_STAB_MSK: u8 = 0x10;

// calibration bit fields
pub const H1_DATA_MSK: u8 = 0x0F;
pub const RHRANGE_MSK: u8 = 0x30;
pub const RSERROR_MSK: u8 = 0xF0;

/// Soft reset settle time.
pub const PERIOD_RESET_US: u32 = 10_000;
/// Poll interval while waiting for the device to reach sleep.
pub const PERIOD_POLL_US: u32 = 10_000;

#[inline]
pub fn set_bits(reg: u8, mask: u8, pos: u8, value: u8) -> u8 {
    (reg & !mask) | ((value << pos) & mask)
}

#[inline]
pub fn get_bits(reg: u8, mask: u8, pos: u8) -> u8 {
    (reg & mask) >> pos
}
