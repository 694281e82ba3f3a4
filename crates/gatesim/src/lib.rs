//! gatesim: an event-driven digital logic simulation engine.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all gatesim sub-crates. For most users, adding `gatesim` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use gatesim::prelude::*;
//!
//! // An inverter: input at (0,0), output at (2,0), one unit of delay.
//! struct Not;
//! impl Component for Not {
//!     fn name(&self) -> &str { "not" }
//!     fn ports(&self) -> Vec<Port> {
//!         vec![Port::input(0, 0, BitWidth::ONE), Port::output(2, 0, BitWidth::ONE)]
//!     }
//!     fn evaluate(&self, ctx: &mut EvalContext<'_>) -> Result<(), ComponentError> {
//!         let out = ctx.input(0).not();
//!         ctx.set_output(1, out, 1)
//!     }
//! }
//!
//! let circuit = Circuit::new("demo");
//! Transaction::new()
//!     .write(&circuit)
//!     .execute(|_| circuit.add_component(Arc::new(Not), Location::new(0, 0)))
//!     .unwrap()
//!     .unwrap();
//!
//! let mut propagator = Propagator::new(circuit, PropagatorConfig::default()).unwrap();
//! let root = propagator.root_state();
//! propagator.set_value(root, Location::new(0, 0), Value::TRUE, ComponentId::next(), 1);
//! propagator.propagate();
//! assert_eq!(propagator.value_at(root, Location::new(2, 0)), Value::FALSE);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `gatesim-core` | Values, ids, ports, the `Component` trait |
//! | [`circuit`] | `gatesim-circuit` | Topology, nets, lock-ordered transactions |
//! | [`propagator`] | `gatesim-propagator` | The discrete-event propagation engine |
//! | [`engine`] | `gatesim-engine` | Threaded simulator with clock generation |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Values, ids, ports, and the component contract (`gatesim-core`).
pub use gatesim_core as types;

/// Circuit topology and the multi-circuit locking protocol
/// (`gatesim-circuit`).
///
/// Every mutation of a [`circuit::Circuit`] must run inside a write
/// [`circuit::Transaction`].
pub use gatesim_circuit as circuit;

/// Discrete-event propagation (`gatesim-propagator`).
pub use gatesim_propagator as propagator;

/// Background simulation threads (`gatesim-engine`).
///
/// [`engine::Simulator`] runs propagation on request and generates clock
/// ticks at a configurable frequency.
pub use gatesim_engine as engine;

/// Common imports for typical gatesim usage.
///
/// ```rust
/// use gatesim::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use gatesim_core::{
        BitWidth, Component, ComponentError, ComponentId, Direction, EvalContext, Location, Port,
        Value,
    };

    // Circuits
    pub use gatesim_circuit::{Circuit, CircuitError, LockError, Transaction};

    // Propagation
    pub use gatesim_propagator::{PropagationPoints, Propagator, PropagatorConfig};

    // Engine
    pub use gatesim_engine::{Simulator, SimulatorConfig, SimulatorEvent, SimulatorListener};
}
