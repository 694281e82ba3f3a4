//! Port descriptors: where a component touches the circuit.

use crate::id::Location;
use crate::value::BitWidth;

/// Signal direction of a port, seen from the component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The component reads the value at this point.
    Input,
    /// The component drives a value at this point.
    Output,
}

/// A connection point of a component.
///
/// [`Component::ports`](crate::Component::ports) reports locations relative
/// to the component's anchor; the circuit stores them translated to
/// absolute grid coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Port {
    /// Grid position (relative or absolute, depending on context).
    pub location: Location,
    /// Signal direction.
    pub direction: Direction,
    /// Number of bits carried.
    pub width: BitWidth,
}

impl Port {
    /// An input port at `(dx, dy)`.
    pub fn input(dx: i32, dy: i32, width: BitWidth) -> Self {
        Self {
            location: Location::new(dx, dy),
            direction: Direction::Input,
            width,
        }
    }

    /// An output port at `(dx, dy)`.
    pub fn output(dx: i32, dy: i32, width: BitWidth) -> Self {
        Self {
            location: Location::new(dx, dy),
            direction: Direction::Output,
            width,
        }
    }

    /// This port moved to `anchor`.
    pub fn at(self, anchor: Location) -> Self {
        Self {
            location: self.location.translate(anchor),
            ..self
        }
    }

    /// Whether the component drives this port.
    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }
}
