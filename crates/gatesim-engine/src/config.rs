//! Simulator configuration, validation, and error types.
//!
//! [`SimulatorConfig`] is consumed by [`Simulator::new`](crate::Simulator::new).
//! [`validate()`](SimulatorConfig::validate) checks it together with the
//! nested [`PropagatorConfig`].

use std::error::Error;
use std::fmt;
use std::time::Duration;

use gatesim_propagator::{ConfigError as PropagatorConfigError, PropagatorConfig};

// ── SimulatorConfig ────────────────────────────────────────────────

/// Configuration for [`Simulator`](crate::Simulator).
#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    /// Configuration for every propagator the simulator builds.
    pub propagator: PropagatorConfig,
    /// Clock frequency in Hz. Zero suspends the ticker. Default: 1.0.
    pub tick_frequency_hz: f64,
    /// Start in continuous-run mode. Default: true.
    pub running: bool,
    /// Start with the ticker enabled. Default: false.
    pub ticking: bool,
    /// Tick requests that may queue up before further ones are dropped.
    /// Default: 4.
    pub max_pending_ticks: u32,
    /// Step requests that may queue up before further ones are dropped.
    /// Default: 4.
    pub max_pending_steps: u32,
    /// How long a propagation round waits for read locks before retrying.
    /// `None` waits indefinitely. Default: `None`.
    pub lock_timeout: Option<Duration>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            propagator: PropagatorConfig::default(),
            tick_frequency_hz: 1.0,
            running: true,
            ticking: false,
            max_pending_ticks: 4,
            max_pending_steps: 4,
            lock_timeout: None,
        }
    }
}

impl SimulatorConfig {
    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.propagator.validate()?;
        validate_frequency(self.tick_frequency_hz)?;
        if self.max_pending_ticks == 0 {
            return Err(ConfigError::ZeroPendingLimit { limit: "max_pending_ticks" });
        }
        if self.max_pending_steps == 0 {
            return Err(ConfigError::ZeroPendingLimit { limit: "max_pending_steps" });
        }
        if self.lock_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroLockTimeout);
        }
        Ok(())
    }
}

/// A tick frequency must be finite and non-negative; zero means "off".
pub(crate) fn validate_frequency(hz: f64) -> Result<(), ConfigError> {
    if !hz.is_finite() || hz < 0.0 {
        return Err(ConfigError::InvalidTickFrequency { value: hz });
    }
    Ok(())
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SimulatorConfig::validate()`].
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The propagator configuration is invalid.
    Propagator(PropagatorConfigError),
    /// `tick_frequency_hz` is NaN, infinite, or negative.
    InvalidTickFrequency {
        /// The invalid value.
        value: f64,
    },
    /// A request queue limit is zero.
    ZeroPendingLimit {
        /// Name of the offending field.
        limit: &'static str,
    },
    /// `lock_timeout` is zero, so no round could ever lock its circuits.
    ZeroLockTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Propagator(e) => write!(f, "propagator: {e}"),
            Self::InvalidTickFrequency { value } => {
                write!(f, "tick_frequency_hz must be finite and non-negative, got {value}")
            }
            Self::ZeroPendingLimit { limit } => write!(f, "{limit} must be at least 1"),
            Self::ZeroLockTimeout => write!(f, "lock_timeout must be non-zero"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Propagator(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PropagatorConfigError> for ConfigError {
    fn from(e: PropagatorConfigError) -> Self {
        Self::Propagator(e)
    }
}
