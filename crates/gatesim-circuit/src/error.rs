//! Error types for topology edits and lock acquisition.

use std::error::Error;
use std::fmt;

use gatesim_core::{ComponentId, Location, WireId};

/// Errors from [`Transaction::acquire`](crate::Transaction::acquire).
///
/// When acquisition fails, every lock the transaction had already taken
/// is released before the error is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockError {
    /// The lock could not be obtained within the transaction's timeout.
    Timeout {
        /// Serial number of the circuit whose lock timed out.
        serial: u64,
    },
    /// The calling thread holds a read lock and asked for the write lock.
    ///
    /// Upgrading would deadlock against another upgrading reader, so it
    /// is refused outright.
    UpgradeDenied {
        /// Serial number of the circuit.
        serial: u64,
    },
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { serial } => write!(f, "timed out waiting for circuit lock #{serial}"),
            Self::UpgradeDenied { serial } => write!(
                f,
                "cannot upgrade read lock to write lock on circuit #{serial}"
            ),
        }
    }
}

impl Error for LockError {}

/// Errors from [`Circuit`](crate::Circuit) mutators.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CircuitError {
    /// No component or instance with this id is placed in the circuit.
    NoSuchComponent(ComponentId),
    /// No wire with this id exists in the circuit.
    NoSuchWire(WireId),
    /// A wire would start and end at the same point.
    DegenerateWire(Location),
    /// A pin already occupies this point.
    DuplicatePin(Location),
    /// No pin at this point.
    NoSuchPin(Location),
    /// Placing the instance would make a circuit contain itself.
    RecursiveNesting {
        /// Circuit receiving the instance.
        parent: String,
        /// Circuit being instantiated.
        child: String,
    },
}

impl fmt::Display for CircuitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchComponent(id) => write!(f, "no component {id} in circuit"),
            Self::NoSuchWire(id) => write!(f, "no wire {id} in circuit"),
            Self::DegenerateWire(at) => write!(f, "wire starts and ends at {at}"),
            Self::DuplicatePin(at) => write!(f, "a pin already exists at {at}"),
            Self::NoSuchPin(at) => write!(f, "no pin at {at}"),
            Self::RecursiveNesting { parent, child } => write!(
                f,
                "placing '{child}' inside '{parent}' would nest a circuit inside itself"
            ),
        }
    }
}

impl Error for CircuitError {}
