//! Adaptive indoor-air-quality score.
//!
//! The gas resistance is first corrected for absolute humidity, then scored
//! against the highest corrected value seen so far (the "ceiling"). Clean air
//! drives the resistance up, so the ceiling tracks the cleanest air this node
//! has observed. The first [`BURN_IN_SAMPLES`] readings only warm up the
//! sensor and produce no score.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use libm::{expf, powf};

/// Samples discarded while the hot plate settles.
pub const BURN_IN_SAMPLES: u8 = 25;

/// Returned by [`IaqEstimator::score`] while no score is available.
pub const IAQ_UNAVAILABLE: f32 = -1.0;

#[derive(Clone, Copy)]
struct IaqState {
    gas_ceiling: f32,
    burn_in_counter: u8,
}

pub struct IaqEstimator<M: RawMutex> {
    state: Mutex<M, Cell<IaqState>>,
}

impl<M: RawMutex> IaqEstimator<M> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(IaqState {
                gas_ceiling: 0.0,
                burn_in_counter: 0,
            })),
        }
    }

    /// Scores one reading, 0..=100 (higher is cleaner air), or
    /// [`IAQ_UNAVAILABLE`] during burn-in.
    ///
    /// Raising the ceiling is atomic, so it never decreases. The score then
    /// reads the ceiling in a second, separate lock hold: a concurrent caller
    /// may raise it in between, in which case this score is computed against
    /// the newer ceiling.
    pub fn score(&self, gas_resistance: f32, humidity: f32, temperature: f32) -> f32 {
        let rho_max = 611.2 * expf(17.62 * temperature / (243.12 + temperature))
            / (461.52 * (temperature + 273.15));
        let hum_abs = humidity * 10.0 * rho_max;
        let comp_gas = gas_resistance * expf(0.03 * hum_abs);

        let burning_in = self.state.lock(|state| {
            let mut s = state.get();
            if s.burn_in_counter < BURN_IN_SAMPLES {
                s.burn_in_counter += 1;
                state.set(s);
                return true;
            }
            if comp_gas > s.gas_ceiling {
                s.gas_ceiling = comp_gas;
                state.set(s);
            }
            false
        });

        if burning_in {
            debug!("IAQ burn-in");
            return IAQ_UNAVAILABLE;
        }

        let ceiling = self.ceiling();
        if ceiling <= 0.0 {
            return 0.0;
        }
        let ratio = powf(comp_gas / ceiling, 2.0);
        ratio.min(1.0) * 100.0
    }

    /// Highest humidity-compensated gas resistance seen after burn-in.
    pub fn ceiling(&self) -> f32 {
        self.state.lock(|state| state.get().gas_ceiling)
    }

    pub fn is_calibrated(&self) -> bool {
        self.state
            .lock(|state| state.get().burn_in_counter >= BURN_IN_SAMPLES)
    }
}

impl<M: RawMutex> Default for IaqEstimator<M> {
    fn default() -> Self {
        Self::new()
    }
}
