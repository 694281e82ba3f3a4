//! Strongly-typed identifiers and the [`Location`] grid point.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter for unique [`ComponentId`] allocation.
static COMPONENT_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Counter for unique [`WireId`] allocation.
static WIRE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies a placed component (or sub-circuit instance).
///
/// Allocated from a process-wide monotonic counter, so an id is never
/// shared between two circuits. The propagator uses it as the identity
/// of a *cause*: the driver currently asserting a value at a point.
/// External stimuli (test drivers, poked inputs) allocate their own id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Allocate a fresh, unique component id. Thread-safe.
    pub fn next() -> Self {
        Self(COMPONENT_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, for diagnostics.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Identifies a wire segment within a circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WireId(u64);

impl WireId {
    /// Allocate a fresh, unique wire id. Thread-safe.
    pub fn next() -> Self {
        Self(WIRE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Identifies one simulation state (one circuit instantiation) inside a
/// propagator's state tree.
///
/// Only meaningful relative to the propagator that allocated it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub u32);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl From<u32> for StateId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// A point on the schematic grid where ports and wire ends meet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    /// Horizontal grid coordinate.
    pub x: i32,
    /// Vertical grid coordinate.
    pub y: i32,
}

impl Location {
    /// Create a location.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This location shifted by `offset`.
    pub fn translate(self, offset: Location) -> Self {
        Self {
            x: self.x + offset.x,
            y: self.y + offset.y,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

impl From<(i32, i32)> for Location {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}
