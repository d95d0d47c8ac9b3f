//! # BME68x gas sensor driver
//!
//! Register-level driver for the Bosch BME680/BME688 on top of a
//! [`RegisterTransport`]. Besides the usual configuration it keeps the small
//! amount of state the sensor's multi-field modes need:
//!
//! - the last non-sleep operating mode, because the device drops back to
//!   sleep on its own after a forced measurement while duration and fetch
//!   semantics still refer to the mode that was started;
//! - a buffer of up to three measurement fields with a read cursor.
//!
//! Every operation returns a `Result` and also records a signed status code
//! (negative error, positive warning), readable via [`SensorDriver::check_status`].

mod calc;
mod field;
mod regs;
mod settings;

pub use calc::CalibData;
pub use field::{FieldBuffer, FieldData};
pub use settings::{
    Filter, HeaterProfile, HeaterStep, Odr, OperatingMode, Oversampling, SensorConfig,
    MAX_HEATER_STEPS,
};

use crate::hal::RegisterTransport;
use regs::{get_bits, set_bits};

/// Largest register read accepted in one transaction.
pub const MAX_READ_LENGTH: usize = regs::MAX_READ_LENGTH;

const STATUS_OK: i8 = 0;

/// Failures of a driver operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// The transport reported a bus failure.
    CommFailure,
    /// No BME68x answered with the expected chip id.
    DeviceNotFound,
    /// Transaction length outside 1..=51 bytes (or an empty heater profile).
    InvalidLength,
    /// Reading the current configuration failed, nothing was written.
    ConfigWriteSkipped,
}

impl SensorError {
    pub fn code(self) -> i8 {
        match self {
            SensorError::CommFailure | SensorError::ConfigWriteSkipped => -2,
            SensorError::DeviceNotFound => -3,
            SensorError::InvalidLength => -4,
        }
    }
}

/// Non-fatal conditions recorded in the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorWarning {
    /// Data was requested before any measurement mode was started.
    DefineOpMode,
    /// The fetch found no new field.
    NoNewData,
    /// Parallel profile set without a shared heater duration.
    DefineSharedHeaterDuration,
}

impl SensorWarning {
    pub fn code(self) -> i8 {
        match self {
            SensorWarning::DefineOpMode => 1,
            SensorWarning::NoNewData => 2,
            SensorWarning::DefineSharedHeaterDuration => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    Ok,
    Warning,
    Error,
}

impl Status {
    pub fn from_code(code: i8) -> Self {
        match code {
            c if c < STATUS_OK => Status::Error,
            c if c > STATUS_OK => Status::Warning,
            _ => Status::Ok,
        }
    }
}

pub struct SensorDriver<T> {
    transport: T,
    variant_id: u8,
    calib: CalibData,
    conf: SensorConfig,
    heater: Option<HeaterProfile>,
    buffer: FieldBuffer,
    last_op_mode: OperatingMode,
    amb_temp: i8,
    status: i8,
}

impl<T: RegisterTransport> SensorDriver<T> {
    /// Resets the sensor, checks the chip id and loads the calibration.
    ///
    /// # Errors
    /// [`SensorError::CommFailure`] if the bus fails during the handshake,
    /// [`SensorError::DeviceNotFound`] on an unexpected chip id.
    pub fn initialize(transport: T) -> Result<Self, SensorError> {
        info!("Initializing BME68x");

        let mut driver = Self {
            transport,
            variant_id: regs::VARIANT_GAS_LOW,
            calib: CalibData::default(),
            conf: SensorConfig::default(),
            heater: None,
            buffer: FieldBuffer::default(),
            last_op_mode: OperatingMode::Sleep,
            amb_temp: 25,
            status: STATUS_OK,
        };

        let result = driver.handshake();
        driver.track(result)?;

        let uid = driver.unique_id().unwrap_or(0);
        info!("BME68x ready (variant {}, uid {})", driver.variant_id, uid);
        Ok(driver)
    }

    fn handshake(&mut self) -> Result<(), SensorError> {
        self.reset_device()?;

        let mut chip_id = [0u8; 1];
        self.read_regs(regs::ADDR_CHIP_ID, &mut chip_id)?;
        if chip_id[0] != regs::CHIP_ID {
            error!("Unexpected chip id {}", chip_id[0]);
            return Err(SensorError::DeviceNotFound);
        }

        let mut variant = [0u8; 1];
        self.read_regs(regs::ADDR_VARIANT_ID, &mut variant)?;
        self.variant_id = variant[0];

        let mut coeff = [0u8; regs::LEN_COEFF_ALL];
        self.read_regs(regs::ADDR_COEFF_1, &mut coeff[..regs::LEN_COEFF_1])?;
        self.read_regs(
            regs::ADDR_COEFF_2,
            &mut coeff[regs::LEN_COEFF_1..regs::LEN_COEFF_1 + regs::LEN_COEFF_2],
        )?;
        self.read_regs(
            regs::ADDR_COEFF_3,
            &mut coeff[regs::LEN_COEFF_1 + regs::LEN_COEFF_2..],
        )?;
        self.calib = CalibData::from_bytes(&coeff);

        Ok(())
    }

    // ── status ───────────────────────────────────────────────────────────────

    fn track<R>(&mut self, result: Result<R, SensorError>) -> Result<R, SensorError> {
        self.status = match &result {
            Ok(_) => STATUS_OK,
            Err(e) => e.code(),
        };
        result
    }

    fn record_warning(&mut self, warning: SensorWarning) {
        self.status = warning.code();
    }

    /// Outcome of the most recent operation.
    pub fn check_status(&self) -> Status {
        Status::from_code(self.status)
    }

    /// Raw signed status code of the most recent operation.
    pub fn status_code(&self) -> i8 {
        self.status
    }

    // ── raw register access ──────────────────────────────────────────────────

    fn read_regs(&mut self, reg_addr: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        if buf.is_empty() || buf.len() > regs::MAX_READ_LENGTH {
            return Err(SensorError::InvalidLength);
        }
        self.transport
            .read(reg_addr, buf)
            .map_err(|_| SensorError::CommFailure)
    }

    /// Writes `(register, value)` pairs in one transaction.
    ///
    /// On the wire the first register address is followed by its value and
    /// then by the remaining pairs, interleaved.
    fn write_regs(&mut self, pairs: &[(u8, u8)]) -> Result<(), SensorError> {
        if pairs.is_empty() || pairs.len() > regs::MAX_WRITE_PAIRS {
            return Err(SensorError::InvalidLength);
        }

        let mut buf = [0u8; 2 * regs::MAX_WRITE_PAIRS - 1];
        buf[0] = pairs[0].1;
        for (i, (addr, value)) in pairs[1..].iter().enumerate() {
            buf[1 + 2 * i] = *addr;
            buf[2 + 2 * i] = *value;
        }

        self.transport
            .write(pairs[0].0, &buf[..2 * pairs.len() - 1])
            .map_err(|_| SensorError::CommFailure)
    }

    /// Reads up to [`MAX_READ_LENGTH`] consecutive registers.
    pub fn read_registers(&mut self, reg_addr: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        let result = self.read_regs(reg_addr, buf);
        self.track(result)
    }

    /// Writes up to ten `(register, value)` pairs.
    pub fn write_registers(&mut self, pairs: &[(u8, u8)]) -> Result<(), SensorError> {
        let result = self.write_regs(pairs);
        self.track(result)
    }

    // ── device control ───────────────────────────────────────────────────────

    fn reset_device(&mut self) -> Result<(), SensorError> {
        self.write_regs(&[(regs::ADDR_SOFT_RESET, regs::SOFT_RESET_CMD)])?;
        self.transport.delay_us(regs::PERIOD_RESET_US);
        Ok(())
    }

    /// Soft-resets the sensor; all registers return to their defaults.
    pub fn soft_reset(&mut self) -> Result<(), SensorError> {
        let result = self.reset_device();
        self.track(result)
    }

    /// Ambient temperature estimate (°C) used for the heater set-points.
    pub fn set_ambient_temperature(&mut self, celsius: i8) {
        self.amb_temp = celsius;
    }

    /// 24-bit unique chip id.
    pub fn unique_id(&mut self) -> Result<u32, SensorError> {
        let mut id = [0u8; 4];
        let result = self.read_regs(regs::ADDR_UNIQUE_ID, &mut id);
        self.track(result)?;

        let id1 = ((id[3] as u32) + ((id[2] as u32) << 8)) & 0x7FFF;
        Ok((id1 << 16) + ((id[1] as u32) << 8) + id[0] as u32)
    }

    pub fn variant_id(&self) -> u8 {
        self.variant_id
    }

    pub fn calibration(&self) -> &CalibData {
        &self.calib
    }

    // ── operating mode ───────────────────────────────────────────────────────

    fn read_op_mode(&mut self) -> Result<OperatingMode, SensorError> {
        let mut ctrl_meas = [0u8; 1];
        self.read_regs(regs::ADDR_CTRL_MEAS, &mut ctrl_meas)?;
        Ok(OperatingMode::from_bits(ctrl_meas[0] & regs::MODE_MSK))
    }

    /// Puts the device to sleep (polling until it got there), then starts `mode`.
    fn write_op_mode(&mut self, mode: OperatingMode) -> Result<(), SensorError> {
        let mut ctrl_meas = [0u8; 1];
        loop {
            self.read_regs(regs::ADDR_CTRL_MEAS, &mut ctrl_meas)?;
            if ctrl_meas[0] & regs::MODE_MSK == OperatingMode::Sleep as u8 {
                break;
            }
            ctrl_meas[0] &= !regs::MODE_MSK;
            self.write_regs(&[(regs::ADDR_CTRL_MEAS, ctrl_meas[0])])?;
            self.transport.delay_us(regs::PERIOD_POLL_US);
        }

        if mode != OperatingMode::Sleep {
            let value = (ctrl_meas[0] & !regs::MODE_MSK) | mode as u8;
            self.write_regs(&[(regs::ADDR_CTRL_MEAS, value)])?;
        }
        Ok(())
    }

    /// Starts `mode`. A successful non-sleep mode becomes the reference for
    /// [`measurement_duration_us`](Self::measurement_duration_us) and
    /// [`fetch_fields`](Self::fetch_fields).
    pub fn set_operating_mode(&mut self, mode: OperatingMode) -> Result<(), SensorError> {
        let result = self.write_op_mode(mode);
        self.track(result)?;

        if mode != OperatingMode::Sleep {
            self.last_op_mode = mode;
        }
        Ok(())
    }

    /// Mode currently reported by the device.
    pub fn operating_mode(&mut self) -> Result<OperatingMode, SensorError> {
        let result = self.read_op_mode();
        self.track(result)
    }

    pub fn last_operating_mode(&self) -> OperatingMode {
        self.last_op_mode
    }

    // ── configuration ────────────────────────────────────────────────────────

    fn read_conf(&mut self) -> Result<SensorConfig, SensorError> {
        let mut reg = [0u8; regs::LEN_CONFIG];
        self.read_regs(regs::ADDR_CTRL_GAS_1, &mut reg)?;

        let odr = if get_bits(reg[0], regs::ODR3_MSK, regs::ODR3_POS) != 0 {
            Odr::None
        } else {
            Odr::from_bits(get_bits(reg[4], regs::ODR20_MSK, regs::ODR20_POS))
        };

        Ok(SensorConfig {
            os_hum: Oversampling::from_bits(reg[1] & regs::OSH_MSK),
            os_temp: Oversampling::from_bits(get_bits(reg[3], regs::OST_MSK, regs::OST_POS)),
            os_pres: Oversampling::from_bits(get_bits(reg[3], regs::OSP_MSK, regs::OSP_POS)),
            filter: Filter::from_bits(get_bits(reg[4], regs::FILTER_MSK, regs::FILTER_POS)),
            odr,
        })
    }

    /// Writes `conf` with the device parked in sleep, then resumes the
    /// previous mode.
    fn write_conf(&mut self, conf: &SensorConfig) -> Result<(), SensorError> {
        let current_mode = self.read_op_mode()?;
        self.write_op_mode(OperatingMode::Sleep)?;

        let mut reg = [0u8; regs::LEN_CONFIG];
        self.read_regs(regs::ADDR_CTRL_GAS_1, &mut reg)?;

        reg[4] = set_bits(reg[4], regs::FILTER_MSK, regs::FILTER_POS, conf.filter as u8);
        reg[3] = set_bits(reg[3], regs::OST_MSK, regs::OST_POS, conf.os_temp as u8);
        reg[3] = set_bits(reg[3], regs::OSP_MSK, regs::OSP_POS, conf.os_pres as u8);
        reg[1] = set_bits(reg[1], regs::OSH_MSK, 0, conf.os_hum as u8);

        let (odr20, odr3) = match conf.odr {
            Odr::None => (0, 1),
            odr => (odr as u8, 0),
        };
        reg[4] = set_bits(reg[4], regs::ODR20_MSK, regs::ODR20_POS, odr20);
        reg[0] = set_bits(reg[0], regs::ODR3_MSK, regs::ODR3_POS, odr3);

        let pairs: [(u8, u8); regs::LEN_CONFIG] =
            core::array::from_fn(|i| (regs::ADDR_CTRL_GAS_1 + i as u8, reg[i]));
        self.write_regs(&pairs)?;

        if current_mode != OperatingMode::Sleep {
            self.write_op_mode(current_mode)?;
        }
        Ok(())
    }

    /// Read-patch-write of the configuration.
    ///
    /// When the preliminary read fails nothing is written and the cached
    /// configuration is left exactly as it was.
    fn update_conf(&mut self, patch: impl FnOnce(&mut SensorConfig)) -> Result<(), SensorError> {
        let mut conf = match self.read_conf() {
            Ok(conf) => conf,
            Err(e) => {
                self.status = e.code();
                warn!("BME68x config read failed, write skipped");
                return Err(SensorError::ConfigWriteSkipped);
            }
        };
        self.conf = conf;

        patch(&mut conf);
        let result = self.write_conf(&conf);
        self.track(result)?;

        self.conf = conf;
        Ok(())
    }

    /// Reads the configuration back from the device and caches it.
    pub fn read_config(&mut self) -> Result<SensorConfig, SensorError> {
        let result = self.read_conf();
        let conf = self.track(result)?;
        self.conf = conf;
        Ok(conf)
    }

    /// Last configuration read from or written to the device.
    pub fn config(&self) -> &SensorConfig {
        &self.conf
    }

    pub fn set_oversampling(
        &mut self,
        os_temp: Oversampling,
        os_pres: Oversampling,
        os_hum: Oversampling,
    ) -> Result<(), SensorError> {
        self.update_conf(|conf| {
            conf.os_temp = os_temp;
            conf.os_pres = os_pres;
            conf.os_hum = os_hum;
        })
    }

    pub fn set_filter(&mut self, filter: Filter) -> Result<(), SensorError> {
        self.update_conf(|conf| conf.filter = filter)
    }

    /// Standby time between cycles in sequential mode.
    pub fn set_output_data_rate(&mut self, odr: Odr) -> Result<(), SensorError> {
        self.update_conf(|conf| conf.odr = odr)
    }

    /// TPH conversion time of one cycle of `mode`, in microseconds.
    ///
    /// `Sleep` answers for the last mode that was started. Heating time of a
    /// forced profile is not included, see [`heater_duration_ms`](Self::heater_duration_ms).
    pub fn measurement_duration_us(&self, mode: OperatingMode) -> u32 {
        let mode = if mode == OperatingMode::Sleep {
            self.last_op_mode
        } else {
            mode
        };

        let meas_cycles =
            self.conf.os_temp.cycles() + self.conf.os_pres.cycles() + self.conf.os_hum.cycles();

        let mut meas_dur = meas_cycles * 1963;
        meas_dur += 477 * 4; // TPH switching
        meas_dur += 477 * 5; // gas measurement

        if mode != OperatingMode::Parallel {
            meas_dur += 1000; // wake up
        }

        meas_dur
    }

    // ── heater ───────────────────────────────────────────────────────────────

    fn write_heater(&mut self, profile: &HeaterProfile) -> Result<Option<SensorWarning>, SensorError> {
        self.write_op_mode(OperatingMode::Sleep)?;

        let mut warning = None;
        let nb_conv = match profile {
            HeaterProfile::Forced {
                temperature,
                duration_ms,
            } => {
                let res_heat = self.calib.res_heat(*temperature, self.amb_temp);
                self.write_regs(&[
                    (regs::ADDR_RES_HEAT_0, res_heat),
                    (regs::ADDR_GAS_WAIT_0, calc::gas_wait(*duration_ms)),
                ])?;
                0
            }
            HeaterProfile::Sequential { steps } => {
                self.write_heater_steps(steps, |step| calc::gas_wait(step.duration))?;
                steps.len() as u8
            }
            HeaterProfile::Parallel {
                steps,
                shared_duration_ms,
            } => {
                if *shared_duration_ms == 0 {
                    warning = Some(SensorWarning::DefineSharedHeaterDuration);
                }
                // multipliers beyond the register width saturate
                self.write_heater_steps(steps, |step| {
                    u8::try_from(step.duration).unwrap_or(u8::MAX)
                })?;
                self.write_regs(&[(
                    regs::ADDR_SHD_HEATR_DUR,
                    calc::shared_heater_duration(*shared_duration_ms),
                )])?;
                steps.len() as u8
            }
        };

        let mut ctrl_gas = [0u8; 2];
        self.read_regs(regs::ADDR_CTRL_GAS_0, &mut ctrl_gas)?;

        let run_gas = if self.variant_id == regs::VARIANT_GAS_HIGH {
            regs::ENABLE_GAS_MEAS_H
        } else {
            regs::ENABLE_GAS_MEAS_L
        };
        // heater control bit is "heater off"
        ctrl_gas[0] = set_bits(ctrl_gas[0], regs::HCTRL_MSK, regs::HCTRL_POS, 0);
        ctrl_gas[1] = set_bits(ctrl_gas[1], regs::NBCONV_MSK, 0, nb_conv);
        ctrl_gas[1] = set_bits(ctrl_gas[1], regs::RUN_GAS_MSK, regs::RUN_GAS_POS, run_gas);

        self.write_regs(&[
            (regs::ADDR_CTRL_GAS_0, ctrl_gas[0]),
            (regs::ADDR_CTRL_GAS_1, ctrl_gas[1]),
        ])?;

        Ok(warning)
    }

    fn write_heater_steps(
        &mut self,
        steps: &[HeaterStep],
        gas_wait: impl Fn(&HeaterStep) -> u8,
    ) -> Result<(), SensorError> {
        if steps.is_empty() {
            return Err(SensorError::InvalidLength);
        }

        let mut res_heat = [(0u8, 0u8); MAX_HEATER_STEPS];
        let mut wait = [(0u8, 0u8); MAX_HEATER_STEPS];
        for (i, step) in steps.iter().enumerate() {
            res_heat[i] = (
                regs::ADDR_RES_HEAT_0 + i as u8,
                self.calib.res_heat(step.temperature, self.amb_temp),
            );
            wait[i] = (regs::ADDR_GAS_WAIT_0 + i as u8, gas_wait(step));
        }

        self.write_regs(&res_heat[..steps.len()])?;
        self.write_regs(&wait[..steps.len()])
    }

    /// Programs the gas heater and enables gas measurements.
    pub fn set_heater_profile(&mut self, profile: HeaterProfile) -> Result<(), SensorError> {
        let result = self.write_heater(&profile);
        let warning = self.track(result)?;

        if let Some(warning) = warning {
            warn!("Parallel heater profile without shared heater duration");
            self.record_warning(warning);
        }
        self.heater = Some(profile);
        Ok(())
    }

    pub fn heater_profile(&self) -> Option<&HeaterProfile> {
        self.heater.as_ref()
    }

    /// Heating time of the active forced profile, 0 for any other profile.
    pub fn heater_duration_ms(&self) -> u32 {
        match self.heater {
            Some(HeaterProfile::Forced { duration_ms, .. }) => duration_ms as u32,
            _ => 0,
        }
    }

    // ── data ─────────────────────────────────────────────────────────────────

    fn read_fields(&mut self) -> Result<Option<SensorWarning>, SensorError> {
        let n_blocks = match self.last_op_mode {
            OperatingMode::Sleep => return Ok(Some(SensorWarning::DefineOpMode)),
            OperatingMode::Forced => 1,
            OperatingMode::Parallel | OperatingMode::Sequential => regs::N_FIELDS,
        };

        let mut raw = [0u8; regs::MAX_READ_LENGTH];
        let len = n_blocks * regs::LEN_FIELD;
        self.read_regs(regs::ADDR_FIELD_0, &mut raw[..len])?;

        let mut decoded = [FieldData::default(); regs::N_FIELDS];
        for (slot, block) in decoded
            .iter_mut()
            .zip(raw[..len].chunks_exact(regs::LEN_FIELD))
        {
            *slot = FieldData::decode(block, self.variant_id, &self.calib);
        }
        self.buffer.store(&decoded[..n_blocks]);

        if self.buffer.n_fields() == 0 {
            return Ok(Some(SensorWarning::NoNewData));
        }
        Ok(None)
    }

    /// Pulls every ready field of the last started mode into the buffer.
    ///
    /// Returns how many fields are available (0..=3) and rewinds the cursor.
    pub fn fetch_fields(&mut self) -> Result<u8, SensorError> {
        self.buffer.reset();

        let result = self.read_fields();
        if let Some(warning) = self.track(result)? {
            self.record_warning(warning);
        }
        Ok(self.buffer.n_fields())
    }

    /// Next buffered field and how many more are queued behind it.
    ///
    /// In forced mode this is always the single field. Otherwise the cursor
    /// advances; after the last field it keeps returning that field with
    /// zero remaining until the next [`fetch_fields`](Self::fetch_fields).
    pub fn get_field(&mut self) -> (FieldData, u8) {
        if self.last_op_mode == OperatingMode::Forced {
            return (self.buffer.fields()[0], 0);
        }
        self.buffer.next()
    }

    /// All three field slots as of the last fetch.
    pub fn fields(&self) -> &[FieldData; 3] {
        self.buffer.fields()
    }

    pub fn release(self) -> T {
        self.transport
    }

    #[cfg(test)]
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBme68x;

    fn driver() -> SensorDriver<FakeBme68x> {
        SensorDriver::initialize(FakeBme68x::new()).unwrap()
    }

    #[test]
    fn initialize_loads_calibration() {
        let driver = driver();
        assert_eq!(driver.check_status(), Status::Ok);
        assert_eq!(driver.calibration().par_t1, 25_600);
        assert_eq!(driver.calibration().par_h1, 700);
        assert_eq!(driver.last_operating_mode(), OperatingMode::Sleep);

        let fake = driver.release();
        assert_eq!(fake.writes[0], (0xE0, 0xB6));
        assert_eq!(fake.delays[0], 10_000);
    }

    #[test]
    fn initialize_reports_bus_failure() {
        let mut fake = FakeBme68x::new();
        fake.fail_reads = true;
        assert_eq!(
            SensorDriver::initialize(fake).err(),
            Some(SensorError::CommFailure)
        );
    }

    #[test]
    fn initialize_rejects_foreign_chip() {
        let mut fake = FakeBme68x::new();
        fake.regs[0xD0] = 0x60;
        assert_eq!(
            SensorDriver::initialize(fake).err(),
            Some(SensorError::DeviceNotFound)
        );
    }

    #[test]
    fn unique_id_bit_layout() {
        let mut fake = FakeBme68x::new();
        fake.regs[0x83..0x87].copy_from_slice(&[0x11, 0x22, 0x33, 0x44]);
        let mut driver = SensorDriver::initialize(fake).unwrap();

        let expected = (((0x44u32 + (0x33 << 8)) & 0x7FFF) << 16) | (0x22 << 8) | 0x11;
        assert_eq!(driver.unique_id(), Ok(expected));
        assert_eq!(expected, 0x3344_2211);
    }

    #[test]
    fn oversampling_round_trips_through_device() {
        let mut driver = driver();
        driver
            .set_oversampling(Oversampling::X8, Oversampling::X4, Oversampling::X2)
            .unwrap();

        let fake = &driver.transport;
        assert_eq!(fake.regs[0x74] >> 5, Oversampling::X8 as u8);
        assert_eq!((fake.regs[0x74] >> 2) & 0x07, Oversampling::X4 as u8);
        assert_eq!(fake.regs[0x72] & 0x07, Oversampling::X2 as u8);

        let conf = driver.read_config().unwrap();
        assert_eq!(conf.os_temp, Oversampling::X8);
        assert_eq!(conf.os_pres, Oversampling::X4);
        assert_eq!(conf.os_hum, Oversampling::X2);
    }

    #[test]
    fn filter_and_odr_are_independent_fields() {
        let mut driver = driver();
        driver.set_filter(Filter::Size7).unwrap();
        driver.set_output_data_rate(Odr::Ms250).unwrap();

        assert_eq!(driver.config().filter, Filter::Size7);
        assert_eq!(driver.config().odr, Odr::Ms250);
        assert_eq!(driver.read_config().unwrap().filter, Filter::Size7);
        assert_eq!(driver.transport.regs[0x71] & 0x80, 0);
    }

    #[test]
    fn failed_config_read_leaves_config_untouched() {
        let mut driver = driver();
        driver
            .set_oversampling(Oversampling::X1, Oversampling::X2, Oversampling::X4)
            .unwrap();
        let before = *driver.config();
        let regs_before = driver.transport.regs;
        let writes_before = driver.transport.writes.len();

        driver.transport.fail_reads = true;
        assert_eq!(
            driver.set_filter(Filter::Size127),
            Err(SensorError::ConfigWriteSkipped)
        );
        assert_eq!(
            driver.set_oversampling(Oversampling::X16, Oversampling::X16, Oversampling::X16),
            Err(SensorError::ConfigWriteSkipped)
        );
        assert_eq!(
            driver.set_output_data_rate(Odr::Ms10),
            Err(SensorError::ConfigWriteSkipped)
        );

        assert_eq!(*driver.config(), before);
        assert_eq!(driver.transport.regs, regs_before);
        assert_eq!(driver.transport.writes.len(), writes_before);
        assert_eq!(driver.check_status(), Status::Error);
    }

    #[test]
    fn sleep_duration_follows_last_active_mode() {
        let mut driver = driver();
        driver
            .set_oversampling(Oversampling::X2, Oversampling::X1, Oversampling::X16)
            .unwrap();
        driver.set_operating_mode(OperatingMode::Forced).unwrap();

        let forced = driver.measurement_duration_us(OperatingMode::Forced);
        assert_eq!(forced, 19 * 1963 + 477 * 9 + 1000);
        assert_eq!(driver.measurement_duration_us(OperatingMode::Sleep), forced);

        driver.set_operating_mode(OperatingMode::Parallel).unwrap();
        assert_eq!(
            driver.measurement_duration_us(OperatingMode::Sleep),
            forced - 1000
        );
    }

    #[test]
    fn sleep_does_not_replace_last_mode() {
        let mut driver = driver();
        driver.set_operating_mode(OperatingMode::Sequential).unwrap();
        driver.set_operating_mode(OperatingMode::Sleep).unwrap();

        assert_eq!(driver.last_operating_mode(), OperatingMode::Sequential);
        assert_eq!(driver.operating_mode(), Ok(OperatingMode::Sleep));
    }

    #[test]
    fn failed_mode_write_keeps_last_mode() {
        let mut driver = driver();
        driver.set_operating_mode(OperatingMode::Forced).unwrap();
        driver.transport.fail_writes = true;
        driver.transport.regs[0x74] &= !0x03;

        assert_eq!(
            driver.set_operating_mode(OperatingMode::Parallel),
            Err(SensorError::CommFailure)
        );
        assert_eq!(driver.last_operating_mode(), OperatingMode::Forced);
    }

    #[test]
    fn mode_change_waits_for_sleep_first() {
        let mut driver = driver();
        driver.set_operating_mode(OperatingMode::Sequential).unwrap();
        driver.transport.writes.clear();

        driver.set_operating_mode(OperatingMode::Forced).unwrap();
        let writes = &driver.transport.writes;
        assert_eq!(writes[0], (0x74, 0x00));
        assert_eq!(writes[1], (0x74, 0x01));
    }

    #[test]
    fn forced_heater_profile_registers() {
        let mut driver = driver();
        driver
            .set_heater_profile(HeaterProfile::Forced {
                temperature: 300,
                duration_ms: 100,
            })
            .unwrap();

        let fake = &driver.transport;
        assert_eq!(fake.regs[0x64], 25 + 64);
        assert_eq!(fake.regs[0x71] & 0x0F, 0);
        assert_eq!((fake.regs[0x71] >> 4) & 0x03, 0x01);
        assert_eq!(fake.regs[0x70] & 0x08, 0);
        assert_eq!(driver.heater_duration_ms(), 100);
        assert_eq!(driver.check_status(), Status::Ok);
    }

    #[test]
    fn sequential_heater_profile_sets_step_count() {
        let mut driver = driver();
        let profile = HeaterProfile::sequential(&[
            HeaterStep::new(200, 100),
            HeaterStep::new(300, 150),
            HeaterStep::new(320, 40),
        ])
        .unwrap();
        driver.set_heater_profile(profile.clone()).unwrap();

        let fake = &driver.transport;
        assert_eq!(fake.regs[0x71] & 0x0F, 3);
        assert_eq!(&fake.regs[0x64..0x67], &[25 + 64, 37 + 64, 40]);
        assert_eq!(driver.heater_profile(), Some(&profile));
        assert_eq!(driver.heater_duration_ms(), 0);
    }

    #[test]
    fn parallel_profile_without_shared_duration_warns() {
        let mut driver = driver();
        let profile =
            HeaterProfile::parallel(&[HeaterStep::new(320, 5), HeaterStep::new(100, 2)], 0)
                .unwrap();
        driver.set_heater_profile(profile).unwrap();

        assert_eq!(driver.check_status(), Status::Warning);
        assert_eq!(driver.transport.regs[0x64..0x66], [5, 2]);
        assert_eq!(driver.transport.regs[0x6E], 0);
    }

    #[test]
    fn oversized_parallel_multiplier_saturates() {
        assert!(HeaterProfile::parallel(&[HeaterStep::new(320, 256)], 140).is_none());
        assert!(HeaterProfile::parallel(&[HeaterStep::new(320, 255)], 140).is_some());

        let mut driver = driver();
        let mut steps = heapless::Vec::new();
        steps.push(HeaterStep::new(320, 300)).unwrap();
        steps.push(HeaterStep::new(200, 12)).unwrap();
        driver
            .set_heater_profile(HeaterProfile::Parallel {
                steps,
                shared_duration_ms: 140,
            })
            .unwrap();

        assert_eq!(driver.transport.regs[0x64..0x66], [0xFF, 12]);
    }

    #[test]
    fn too_many_heater_steps_are_refused() {
        let steps = [HeaterStep::new(300, 100); MAX_HEATER_STEPS + 1];
        assert!(HeaterProfile::sequential(&steps).is_none());
        assert!(HeaterProfile::sequential(&steps[..MAX_HEATER_STEPS]).is_some());
    }

    #[test]
    fn empty_sequential_profile_is_invalid() {
        let mut driver = driver();
        let profile = HeaterProfile::sequential(&[]).unwrap();
        assert_eq!(
            driver.set_heater_profile(profile),
            Err(SensorError::InvalidLength)
        );
        assert!(driver.heater_profile().is_none());
    }

    #[test]
    fn oversized_register_read_is_rejected() {
        let mut driver = driver();
        let mut buf = [0u8; MAX_READ_LENGTH + 1];
        assert_eq!(
            driver.read_registers(0x1D, &mut buf),
            Err(SensorError::InvalidLength)
        );
        assert_eq!(driver.status_code(), -4);
    }

    #[test]
    fn forced_fetch_compensates_single_field() {
        let fake = FakeBme68x::new().with_field(0, 4, 512);
        let mut driver = SensorDriver::initialize(fake).unwrap();
        driver.set_operating_mode(OperatingMode::Forced).unwrap();

        assert_eq!(driver.fetch_fields(), Ok(1));
        let (data, remaining) = driver.get_field();
        assert_eq!(remaining, 0);
        assert!((data.temperature - 25.0).abs() < 0.1);
        assert!((data.humidity - 50.0).abs() < 0.1);
        assert!((data.pressure - 112_600.0).abs() < 5.0);
        assert!((data.gas_resistance - 499_500.5).abs() < 5.0);
        assert!(data.gas_valid() && data.heater_stable());

        // forced mode keeps handing out field 0
        assert_eq!(driver.get_field(), (data, 0));
    }

    #[test]
    fn forced_fetch_without_new_data_warns() {
        let mut driver = driver();
        driver.set_operating_mode(OperatingMode::Forced).unwrap();

        assert_eq!(driver.fetch_fields(), Ok(0));
        assert_eq!(driver.status_code(), SensorWarning::NoNewData.code());
        assert_eq!(driver.check_status(), Status::Warning);
    }

    #[test]
    fn fetch_before_any_mode_warns() {
        let mut driver = driver();
        assert_eq!(driver.fetch_fields(), Ok(0));
        assert_eq!(driver.status_code(), SensorWarning::DefineOpMode.code());
    }

    #[test]
    fn forced_fetch_survives_auto_sleep() {
        let mut fake = FakeBme68x::new().with_field(0, 1, 600);
        fake.auto_sleep = true;
        let mut driver = SensorDriver::initialize(fake).unwrap();

        driver.set_operating_mode(OperatingMode::Forced).unwrap();
        assert_eq!(driver.operating_mode(), Ok(OperatingMode::Sleep));
        assert_eq!(driver.fetch_fields(), Ok(1));
    }

    #[test]
    fn sequential_cursor_walks_and_clamps() {
        let fake = FakeBme68x::new()
            .with_field(0, 12, 520)
            .with_field(1, 10, 530)
            .with_field(2, 11, 540);
        let mut driver = SensorDriver::initialize(fake).unwrap();
        driver.set_operating_mode(OperatingMode::Sequential).unwrap();

        let n = driver.fetch_fields().unwrap();
        assert_eq!(n, 3);

        let mut order = [0u8; 3];
        let mut non_zero = 0;
        for slot in order.iter_mut() {
            let (field, remaining) = driver.get_field();
            *slot = field.meas_index;
            if remaining > 0 {
                non_zero += 1;
            }
        }
        assert_eq!(order, [10, 11, 12]);
        assert_eq!(non_zero, n - 1);

        for _ in 0..3 {
            let (field, remaining) = driver.get_field();
            assert_eq!((field.meas_index, remaining), (12, 0));
        }
    }

    #[test]
    fn parallel_fetch_skips_stale_fields() {
        let mut fake = FakeBme68x::new()
            .with_field(0, 3, 520)
            .with_field(2, 4, 540);
        fake.regs[0x1D + 17] = 0; // slot 1 holds no new data
        let mut driver = SensorDriver::initialize(fake).unwrap();
        driver.set_operating_mode(OperatingMode::Parallel).unwrap();

        assert_eq!(driver.fetch_fields(), Ok(2));
        assert_eq!(driver.get_field().1, 1);
        assert_eq!(driver.get_field().1, 0);
    }

    #[test]
    fn fetch_resets_cursor() {
        let fake = FakeBme68x::new()
            .with_field(0, 1, 520)
            .with_field(1, 2, 530);
        let mut driver = SensorDriver::initialize(fake).unwrap();
        driver.set_operating_mode(OperatingMode::Sequential).unwrap();

        driver.fetch_fields().unwrap();
        driver.get_field();
        driver.get_field();

        assert_eq!(driver.fetch_fields(), Ok(2));
        assert_eq!(driver.get_field().0.meas_index, 1);
    }

    #[test]
    fn failed_fetch_reports_error_and_empties_buffer() {
        let fake = FakeBme68x::new().with_field(0, 1, 520);
        let mut driver = SensorDriver::initialize(fake).unwrap();
        driver.set_operating_mode(OperatingMode::Sequential).unwrap();
        driver.fetch_fields().unwrap();

        driver.transport.fail_reads = true;
        assert_eq!(driver.fetch_fields(), Err(SensorError::CommFailure));
        assert_eq!(driver.check_status(), Status::Error);
        assert_eq!(driver.get_field().1, 0);
    }
}
