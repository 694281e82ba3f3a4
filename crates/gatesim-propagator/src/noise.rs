//! Seeded delay jitter.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::NoiseConfig;

/// Decides which events receive one extra time unit of delay.
pub(crate) struct Noise {
    config: NoiseConfig,
    rng: ChaCha8Rng,
}

impl Noise {
    pub(crate) fn new(config: NoiseConfig) -> Self {
        Self {
            config,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        }
    }

    /// Restart the sequence from the configured seed.
    pub(crate) fn reseed(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
    }

    /// `1` with probability `1 / 2^shift`, else `0`.
    pub(crate) fn extra_delay(&mut self) -> u64 {
        let span = 1u64 << self.config.shift;
        u64::from(self.rng.gen_range(0..span) == 0)
    }
}
