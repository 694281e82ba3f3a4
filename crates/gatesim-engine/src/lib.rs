//! Background orchestration for gatesim simulations.
//!
//! A [`Simulator`] owns a [`Propagator`](gatesim_propagator::Propagator)
//! and two threads: one runs propagation rounds on request, the other
//! generates clock ticks. Callers enqueue requests and observe results
//! through queries or a [`SimulatorListener`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod listener;
mod propagation_thread;
mod request;
pub mod simulator;
pub mod ticker;

pub use config::{ConfigError, SimulatorConfig};
pub use listener::{SimulatorEvent, SimulatorListener};
pub use simulator::{ShutdownReport, Simulator};
pub use ticker::TickPeriod;
