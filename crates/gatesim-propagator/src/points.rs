//! Ordered sets of `(state, point)` pairs.

use gatesim_core::{Location, StateId};
use indexmap::IndexSet;

/// Points touched during propagation, in first-touch order.
///
/// Used both for the single-step frontier and for the points recorded
/// while a circuit approaches its iteration limit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropagationPoints {
    points: IndexSet<(StateId, Location)>,
}

impl PropagationPoints {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a point. Returns `false` if it was already present.
    pub fn add(&mut self, state: StateId, location: Location) -> bool {
        self.points.insert((state, location))
    }

    /// Whether `(state, location)` has been recorded.
    pub fn contains(&self, state: StateId, location: Location) -> bool {
        self.points.contains(&(state, location))
    }

    /// Number of recorded points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Forget every point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// All points, in first-touch order.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, Location)> + '_ {
        self.points.iter().copied()
    }

    /// Points recorded in one state.
    pub fn in_state(&self, state: StateId) -> impl Iterator<Item = Location> + '_ {
        self.points
            .iter()
            .filter(move |(s, _)| *s == state)
            .map(|(_, at)| *at)
    }

    /// Add every point of `other`.
    pub fn extend(&mut self, other: &PropagationPoints) {
        self.points.extend(other.points.iter().copied());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_first_touch_order_without_duplicates() {
        let mut p = PropagationPoints::new();
        let (a, b) = (Location::new(1, 0), Location::new(0, 1));
        assert!(p.add(StateId(0), a));
        assert!(p.add(StateId(1), b));
        assert!(!p.add(StateId(0), a));
        assert_eq!(p.len(), 2);
        assert_eq!(p.in_state(StateId(1)).collect::<Vec<_>>(), vec![b]);
        p.clear();
        assert!(p.is_empty());
    }
}
