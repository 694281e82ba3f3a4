//! Core types and traits for the gatesim logic simulator.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the fundamental abstractions used throughout the workspace:
//! four-state [`Value`]s, identifiers, port descriptors, the
//! [`Component`] contract, and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod id;
pub mod port;
pub mod traits;
pub mod value;

pub use context::{Emission, EvalContext};
pub use error::ComponentError;
pub use id::{ComponentId, Location, StateId, WireId};
pub use port::{Direction, Port};
pub use traits::Component;
pub use value::{Bit, BitWidth, Value};
