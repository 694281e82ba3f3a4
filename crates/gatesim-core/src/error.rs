//! Error types for component evaluation.
//!
//! A component fault is contained by the propagator: it is logged,
//! recorded, and the rest of the round proceeds.

use std::error::Error;
use std::fmt;

use crate::value::BitWidth;

/// Errors returned from [`Component::evaluate`](crate::Component::evaluate)
/// or raised by [`EvalContext`](crate::EvalContext) helpers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ComponentError {
    /// The component's own logic failed.
    ExecutionFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A port index outside the component's port list.
    NoSuchPort {
        /// The offending index.
        port: usize,
    },
    /// An attempt to drive a port declared as an input.
    NotAnOutput {
        /// The offending index.
        port: usize,
    },
    /// A driven value does not match the declared port width.
    WidthMismatch {
        /// The offending index.
        port: usize,
        /// Declared width.
        expected: BitWidth,
        /// Width of the driven value.
        actual: BitWidth,
    },
    /// The component memory slot holds a different type than requested.
    MemoryType,
}

impl fmt::Display for ComponentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionFailed { reason } => write!(f, "execution failed: {reason}"),
            Self::NoSuchPort { port } => write!(f, "no port with index {port}"),
            Self::NotAnOutput { port } => write!(f, "port {port} is not an output"),
            Self::WidthMismatch {
                port,
                expected,
                actual,
            } => write!(
                f,
                "port {port} expects width {expected}, got a value of width {actual}"
            ),
            Self::MemoryType => write!(f, "component memory holds an unexpected type"),
        }
    }
}

impl Error for ComponentError {}
