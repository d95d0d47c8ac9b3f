use heapless::Vec;

/// Maximum number of heater set-points the sensor can store.
pub const MAX_HEATER_STEPS: usize = 10;

/// Oversampling for temperature, pressure and humidity.
///
/// Higher rates average more conversions per reading, at the cost of a
/// longer measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Oversampling {
    /// Channel is skipped.
    #[default]
    None = 0,
    X1 = 1,
    X2 = 2,
    X4 = 3,
    X8 = 4,
    X16 = 5,
}

impl Oversampling {
    pub fn from_bits(value: u8) -> Self {
        match value {
            1 => Oversampling::X1,
            2 => Oversampling::X2,
            3 => Oversampling::X4,
            4 => Oversampling::X8,
            // 6 and 7 are reserved encodings of 16x
            5..=7 => Oversampling::X16,
            _ => Oversampling::None,
        }
    }

    /// Conversions per measurement cycle.
    pub fn cycles(self) -> u32 {
        match self {
            Oversampling::None => 0,
            Oversampling::X1 => 1,
            Oversampling::X2 => 2,
            Oversampling::X4 => 4,
            Oversampling::X8 => 8,
            Oversampling::X16 => 16,
        }
    }
}

/// IIR filter coefficient (temperature and pressure only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Filter {
    #[default]
    Off = 0,
    Size1 = 1,
    Size3 = 2,
    Size7 = 3,
    Size15 = 4,
    Size31 = 5,
    Size63 = 6,
    Size127 = 7,
}

impl Filter {
    pub fn from_bits(value: u8) -> Self {
        match value & 0x07 {
            1 => Filter::Size1,
            2 => Filter::Size3,
            3 => Filter::Size7,
            4 => Filter::Size15,
            5 => Filter::Size31,
            6 => Filter::Size63,
            7 => Filter::Size127,
            _ => Filter::Off,
        }
    }
}

/// Standby time between sequential-mode cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Odr {
    Ms0_59 = 0,
    Ms62_5 = 1,
    Ms125 = 2,
    Ms250 = 3,
    Ms500 = 4,
    Ms1000 = 5,
    Ms10 = 6,
    Ms20 = 7,
    /// No standby, cycles run back to back.
    #[default]
    None = 8,
}

impl Odr {
    pub fn from_bits(value: u8) -> Self {
        match value {
            0 => Odr::Ms0_59,
            1 => Odr::Ms62_5,
            2 => Odr::Ms125,
            3 => Odr::Ms250,
            4 => Odr::Ms500,
            5 => Odr::Ms1000,
            6 => Odr::Ms10,
            7 => Odr::Ms20,
            _ => Odr::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OperatingMode {
    #[default]
    Sleep = 0,
    /// One measurement, then back to sleep.
    Forced = 1,
    Parallel = 2,
    Sequential = 3,
}

impl OperatingMode {
    pub fn from_bits(value: u8) -> Self {
        match value & 0x03 {
            1 => OperatingMode::Forced,
            2 => OperatingMode::Parallel,
            3 => OperatingMode::Sequential,
            _ => OperatingMode::Sleep,
        }
    }
}

/// Measurement configuration as mirrored from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorConfig {
    pub os_hum: Oversampling,
    pub os_temp: Oversampling,
    pub os_pres: Oversampling,
    pub filter: Filter,
    pub odr: Odr,
}

/// One heater set-point.
///
/// `duration` is in milliseconds, except in a parallel profile where it is a
/// multiplier of the shared heater duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HeaterStep {
    pub temperature: u16,
    pub duration: u16,
}

impl HeaterStep {
    pub const fn new(temperature: u16, duration: u16) -> Self {
        Self {
            temperature,
            duration,
        }
    }
}

/// Gas heater configuration. The variant selects the operating mode the
/// profile is meant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaterProfile {
    /// Single set-point: temperature in °C held for `duration_ms`.
    Forced { temperature: u16, duration_ms: u16 },
    Sequential {
        steps: Vec<HeaterStep, MAX_HEATER_STEPS>,
    },
    Parallel {
        steps: Vec<HeaterStep, MAX_HEATER_STEPS>,
        shared_duration_ms: u16,
    },
}

impl HeaterProfile {
    /// Builds a sequential profile, `None` if more than ten steps are given.
    pub fn sequential(steps: &[HeaterStep]) -> Option<Self> {
        Vec::from_slice(steps)
            .ok()
            .map(|steps| HeaterProfile::Sequential { steps })
    }

    /// Builds a parallel profile, `None` if more than ten steps are given or
    /// a multiplier does not fit the 8-bit wait register.
    pub fn parallel(steps: &[HeaterStep], shared_duration_ms: u16) -> Option<Self> {
        if steps.iter().any(|step| step.duration > u16::from(u8::MAX)) {
            return None;
        }
        Vec::from_slice(steps).ok().map(|steps| HeaterProfile::Parallel {
            steps,
            shared_duration_ms,
        })
    }

    /// Operating mode this profile belongs to.
    pub fn mode(&self) -> OperatingMode {
        match self {
            HeaterProfile::Forced { .. } => OperatingMode::Forced,
            HeaterProfile::Sequential { .. } => OperatingMode::Sequential,
            HeaterProfile::Parallel { .. } => OperatingMode::Parallel,
        }
    }

    /// Number of set-points.
    pub fn len(&self) -> usize {
        match self {
            HeaterProfile::Forced { .. } => 1,
            HeaterProfile::Sequential { steps } | HeaterProfile::Parallel { steps, .. } => {
                steps.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
