//! Discrete-event propagation for gatesim circuits.
//!
//! The [`Propagator`] owns one [`CircuitState`] per circuit instantiation
//! and a time-ordered queue of [`SetData`] events. It settles circuits,
//! detects oscillation, and contains component faults.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod event;
pub mod metrics;
mod noise;
pub mod points;
pub mod propagator;
pub mod state;

pub use config::{ConfigError, NoiseConfig, PropagatorConfig};
pub use event::SetData;
pub use metrics::{ComponentFault, FaultReason, PropagationMetrics};
pub use points::PropagationPoints;
pub use propagator::Propagator;
pub use state::{Cause, CircuitState};
