//! Scheduled value changes.

use std::cmp::Ordering;

use gatesim_core::{ComponentId, Location, StateId, Value};

/// A pending change to one cause at one point.
///
/// Events are ordered by `(time, serial)`. The serial number comes from a
/// per-propagator counter that is never reused, so no two queued events
/// compare equal.
#[derive(Clone, Copy, Debug)]
pub struct SetData {
    /// Simulation time at which the event applies.
    pub time: u64,
    /// Tie-breaker in scheduling order.
    pub serial: u64,
    /// State the point belongs to.
    pub state: StateId,
    /// Point being driven.
    pub location: Location,
    /// Driver asserting the value.
    pub cause: ComponentId,
    /// New value, or `None` to withdraw the driver.
    pub value: Option<Value>,
}

impl SetData {
    /// Whether this event withdraws its cause.
    pub fn is_retraction(&self) -> bool {
        self.value.is_none()
    }
}

impl PartialEq for SetData {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SetData {}

impl PartialOrd for SetData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SetData {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.serial.cmp(&other.serial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    fn event(time: u64, serial: u64) -> SetData {
        SetData {
            time,
            serial,
            state: StateId(0),
            location: Location::new(0, 0),
            cause: ComponentId::next(),
            value: Some(Value::TRUE),
        }
    }

    #[test]
    fn heap_pops_by_time_then_serial() {
        let mut heap = BinaryHeap::new();
        for (t, s) in [(5, 0), (1, 3), (1, 2), (3, 1)] {
            heap.push(Reverse(event(t, s)));
        }
        let order: Vec<_> = std::iter::from_fn(|| heap.pop())
            .map(|Reverse(e)| (e.time, e.serial))
            .collect();
        assert_eq!(order, vec![(1, 2), (1, 3), (3, 1), (5, 0)]);
    }
}
