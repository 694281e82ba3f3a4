//! Circuit topology and the lock protocol that guards it.
//!
//! A [`Circuit`] is a grid of placed components, wires, and pins. Its
//! contents live in an immutable [`Topology`] snapshot that is replaced
//! wholesale by every mutation, so readers always see a consistent graph.
//!
//! Each circuit owns a [`CircuitLocker`]. Mutations require the write lock,
//! obtained through a [`Transaction`] that may span several circuits and
//! always locks them in a global order.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod circuit;
pub mod error;
pub mod locker;
pub mod topology;
pub mod transaction;

pub use circuit::Circuit;
pub use error::{CircuitError, LockError};
pub use locker::{CircuitLocker, LockMode, LockOutcome};
pub use topology::{Net, Pin, Placement, PlacementKind, Topology, Wire};
pub use transaction::{Transaction, TransactionGuard};
