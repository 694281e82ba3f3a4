//! Per-round propagation metrics and fault records.

use std::fmt;

use gatesim_core::{ComponentError, ComponentId, StateId};

/// Counters collected during one [`propagate()`](crate::Propagator::propagate).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationMetrics {
    /// Time instants processed.
    pub iterations: u32,
    /// Events applied (after per-instant deduplication).
    pub events_processed: u64,
    /// Component and instance evaluations.
    pub components_evaluated: u64,
    /// Component faults caught this round.
    pub faults: u32,
    /// Whether the round stopped at the iteration limit.
    pub oscillating: bool,
    /// Wall-clock time for the round, in microseconds.
    pub elapsed_us: u64,
}

/// Why a component evaluation was abandoned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FaultReason {
    /// `evaluate()` returned an error.
    Error(ComponentError),
    /// `evaluate()` panicked; the payload message if it was a string.
    Panic(String),
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(e) => write!(f, "{e}"),
            Self::Panic(msg) => write!(f, "panicked: {msg}"),
        }
    }
}

/// A caught component failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentFault {
    /// State the component was evaluated in.
    pub state: StateId,
    /// The failing component.
    pub component: ComponentId,
    /// Component name.
    pub name: String,
    /// Simulation time of the evaluation.
    pub time: u64,
    /// What went wrong.
    pub reason: FaultReason,
}

impl fmt::Display for ComponentFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' in {} at t={}: {}",
            self.component, self.name, self.state, self.time, self.reason
        )
    }
}
