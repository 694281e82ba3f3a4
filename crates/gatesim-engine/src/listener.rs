//! Change notifications for simulator observers.

use std::sync::{Arc, Mutex, PoisonError};

/// Snapshot of simulator state passed to listeners.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulatorEvent {
    /// Continuous-run mode is on.
    pub running: bool,
    /// The ticker is enabled.
    pub ticking: bool,
    /// Configured clock frequency in Hz.
    pub tick_frequency_hz: f64,
    /// The last propagation hit its iteration limit.
    pub oscillating: bool,
    /// Clock ticks since the last reset.
    pub tick_count: u64,
    /// Simulation time of the last processed instant.
    pub clock: u64,
}

/// Receives simulator notifications.
///
/// Callbacks run on the propagation thread (or on the caller's thread for
/// state changes the caller made) after every lock has been released, so
/// they may call back into the [`Simulator`](crate::Simulator). They
/// should return quickly. All methods default to doing nothing.
pub trait SimulatorListener: Send + Sync {
    /// A propagation round settled, or a single step completed.
    fn propagation_completed(&self, _event: &SimulatorEvent) {}

    /// A clock tick was applied.
    fn tick_completed(&self, _event: &SimulatorEvent) {}

    /// Running, ticking, frequency, or oscillation state changed, or the
    /// simulation was reset or replaced.
    fn simulator_state_changed(&self, _event: &SimulatorEvent) {}
}

/// Notification kinds queued during a round and fired after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Notice {
    Propagation,
    Tick,
    StateChanged,
}

#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: Mutex<Vec<Arc<dyn SimulatorListener>>>,
}

impl ListenerSet {
    pub fn add(&self, listener: Arc<dyn SimulatorListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn remove(&self, listener: &Arc<dyn SimulatorListener>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Deliver `notices` in order. The listener list is copied first so
    /// callbacks may add or remove listeners.
    pub fn fire(&self, notices: &[Notice], event: &SimulatorEvent) {
        if notices.is_empty() {
            return;
        }
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for notice in notices {
            for listener in &listeners {
                match notice {
                    Notice::Propagation => listener.propagation_completed(event),
                    Notice::Tick => listener.tick_completed(event),
                    Notice::StateChanged => listener.simulator_state_changed(event),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        ticks: AtomicUsize,
        changes: AtomicUsize,
    }

    impl SimulatorListener for Counter {
        fn tick_completed(&self, _event: &SimulatorEvent) {
            self.ticks.fetch_add(1, Ordering::Relaxed);
        }

        fn simulator_state_changed(&self, _event: &SimulatorEvent) {
            self.changes.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn fire_dispatches_by_kind() {
        let set = ListenerSet::default();
        let counter = Arc::new(Counter::default());
        set.add(counter.clone());
        set.fire(
            &[Notice::Tick, Notice::Tick, Notice::Propagation, Notice::StateChanged],
            &SimulatorEvent::default(),
        );
        assert_eq!(counter.ticks.load(Ordering::Relaxed), 2);
        assert_eq!(counter.changes.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn remove_matches_by_identity() {
        let set = ListenerSet::default();
        let a: Arc<dyn SimulatorListener> = Arc::new(Counter::default());
        let b: Arc<dyn SimulatorListener> = Arc::new(Counter::default());
        set.add(a.clone());
        assert!(!set.remove(&b));
        assert!(set.remove(&a));
        assert!(!set.remove(&a));
    }
}
