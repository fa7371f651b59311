use crate::State;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};

/// Independent Gaussian stream for a single realization.
pub struct NoiseGenerator {
    rng: ChaCha20Rng,
}

impl NoiseGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn from_path_id(global_seed: u64, path_id: u64) -> Self {
        // Combine seeds deterministically
        let seed = global_seed.wrapping_add(path_id.wrapping_mul(0x9e3779b97f4a7c15));
        Self::new(seed)
    }

    /// Planar Wiener increment with standard deviation `sqrt_dt` per axis.
    pub fn generate_dw(&mut self, sqrt_dt: f64) -> State {
        let a: f64 = StandardNormal.sample(&mut self.rng);
        let b: f64 = StandardNormal.sample(&mut self.rng);
        State::new(a * sqrt_dt, b * sqrt_dt)
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha20Rng {
        &mut self.rng
    }
}
