//! Propagator configuration and validation.

use std::error::Error;
use std::fmt;

/// Largest accepted [`NoiseConfig::shift`].
pub const MAX_NOISE_SHIFT: u8 = 32;

/// Random one-tick delay jitter, used to break symmetric races.
///
/// Each non-boundary event is delayed by one extra time unit with
/// probability `1 / 2^shift`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoiseConfig {
    /// Probability exponent. Default: 2 (one event in four).
    pub shift: u8,
    /// Seed for the noise source; reapplied on every reset. Default: 0.
    pub seed: u64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self { shift: 2, seed: 0 }
    }
}

/// Configuration for [`Propagator`](crate::Propagator).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropagatorConfig {
    /// Time instants one `propagate()` may process before the circuit is
    /// declared oscillating. Default: 1000.
    pub iteration_limit: u32,
    /// Delay jitter. Default: `None` (deterministic timing).
    pub noise: Option<NoiseConfig>,
}

impl Default for PropagatorConfig {
    fn default() -> Self {
        Self {
            iteration_limit: 1000,
            noise: None,
        }
    }
}

impl PropagatorConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iteration_limit == 0 {
            return Err(ConfigError::ZeroIterationLimit);
        }
        if let Some(noise) = self.noise {
            if noise.shift > MAX_NOISE_SHIFT {
                return Err(ConfigError::NoiseShiftOutOfRange { shift: noise.shift });
            }
        }
        Ok(())
    }

    /// Iteration count from which touched points are recorded as
    /// potentially oscillating: 75% of the limit.
    pub fn recording_threshold(&self) -> u32 {
        (self.iteration_limit as u64 * 3 / 4) as u32
    }
}

/// Errors detected by [`PropagatorConfig::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `iteration_limit` is zero.
    ZeroIterationLimit,
    /// `noise.shift` exceeds [`MAX_NOISE_SHIFT`].
    NoiseShiftOutOfRange {
        /// The configured shift.
        shift: u8,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroIterationLimit => write!(f, "iteration_limit must be at least 1"),
            Self::NoiseShiftOutOfRange { shift } => {
                write!(f, "noise shift {shift} exceeds maximum of {MAX_NOISE_SHIFT}")
            }
        }
    }
}

impl Error for ConfigError {}
