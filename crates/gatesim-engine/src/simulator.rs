//! User-facing [`Simulator`] API and shutdown.
//!
//! # Architecture
//!
//! ```text
//! Caller thread(s)          Propagation thread           Ticker thread
//!     |                           |                            |
//!     |--step()/tick()/---------->| doorbell.recv()            |
//!     |  request_*()              | next_round()               |
//!     |  [flags + counters]       | read-lock circuits         |
//!     |                           | propagate() / step()       |
//!     |                           | fire listeners             |
//!     |                           |<--request_ticks(n)---------|
//!     |--set_running()/---------------------------------->     |
//!     |  set_ticking()/           |          [control: unbounded]
//!     |  set_tick_frequency()     |          recv_deadline(next wake)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use gatesim_circuit::Circuit;
use gatesim_propagator::{PropagationPoints, Propagator, PropagatorConfig};
use tracing::debug;

use crate::config::{validate_frequency, ConfigError, SimulatorConfig};
use crate::listener::{ListenerSet, Notice, SimulatorEvent, SimulatorListener};
use crate::propagation_thread::PropagationThreadState;
use crate::request::RequestQueue;
use crate::ticker::{TickPeriod, TickerCommand, TickerThreadState};

// ── Shared ─────────────────────────────────────────────────────────

/// State shared between the caller-facing handle and the propagation
/// thread.
pub(crate) struct Shared {
    propagator: Mutex<Propagator>,
    pub(crate) requests: Arc<RequestQueue>,
    pub(crate) listeners: ListenerSet,
    pub(crate) running: AtomicBool,
    pub(crate) lock_timeout: Option<Duration>,
    ticker: Mutex<Sender<TickerCommand>>,
    ticking: AtomicBool,
    frequency_hz: Mutex<f64>,
    oscillating: AtomicBool,
    tick_count: AtomicU64,
    clock: AtomicU64,
    oscillating_points: Mutex<Option<PropagationPoints>>,
    step_points: Mutex<PropagationPoints>,
}

impl Shared {
    pub(crate) fn propagator(&self) -> MutexGuard<'_, Propagator> {
        self.propagator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn step_points(&self) -> MutexGuard<'_, PropagationPoints> {
        self.step_points.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn frequency_hz(&self) -> f64 {
        *self.frequency_hz.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirror propagator state so queries never wait for a round.
    pub(crate) fn publish(&self, propagator: &Propagator) {
        self.tick_count
            .store(propagator.tick_count(), Ordering::Release);
        self.clock.store(propagator.clock(), Ordering::Release);
        self.oscillating
            .store(propagator.is_oscillating(), Ordering::Release);
        *self
            .oscillating_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = propagator.oscillating_points().cloned();
    }

    pub(crate) fn event(&self) -> SimulatorEvent {
        SimulatorEvent {
            running: self.running.load(Ordering::Acquire),
            ticking: self.ticking.load(Ordering::Acquire),
            tick_frequency_hz: self.frequency_hz(),
            oscillating: self.oscillating.load(Ordering::Acquire),
            tick_count: self.tick_count.load(Ordering::Acquire),
            clock: self.clock.load(Ordering::Acquire),
        }
    }

    fn send_ticker(&self, command: TickerCommand) {
        let ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        // A send fails only after shutdown, when there is nothing to wake.
        let _ = ticker.send(command);
    }

    /// The ticker runs only while running and ticking at a non-zero
    /// frequency.
    ///
    /// State is read under the sender lock, so the last configuration
    /// the ticker receives reflects the latest state.
    pub(crate) fn update_ticker(&self) {
        let ticker = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        let period = TickPeriod::from_hz(self.frequency_hz());
        let awake = self.running.load(Ordering::Acquire) && self.ticking.load(Ordering::Acquire);
        let _ = ticker.send(TickerCommand::Configure { period, awake });
    }

    fn notify_state_changed(&self) {
        self.listeners.fire(&[Notice::StateChanged], &self.event());
    }
}

// ── ShutdownReport ─────────────────────────────────────────────────

/// Report from [`Simulator::shutdown`].
#[derive(Debug)]
pub struct ShutdownReport {
    /// Total time spent shutting down.
    pub total_ms: u64,
    /// Whether the propagation thread was joined successfully.
    pub propagation_joined: bool,
    /// Whether the ticker thread was joined successfully.
    pub ticker_joined: bool,
}

// ── Simulator ──────────────────────────────────────────────────────

/// Drives a [`Propagator`] from a background thread, with an optional
/// clock generator.
///
/// Callers only enqueue requests; every call returns without waiting for
/// simulation work. Results are observed through
/// [`with_propagator`](Self::with_propagator), the query methods, or a
/// [`SimulatorListener`].
pub struct Simulator {
    shared: Arc<Shared>,
    propagator_config: PropagatorConfig,
    propagation_thread: Option<JoinHandle<()>>,
    ticker_thread: Option<JoinHandle<()>>,
}

// Compile-time assertion: Simulator must be Send + Sync (shared with
// GUI and worker threads).
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<Simulator>();
};

impl Simulator {
    /// Build a propagator for `circuit` and spawn both threads.
    ///
    /// If the configuration starts in running mode the circuit is
    /// settled right away.
    pub fn new(circuit: Arc<Circuit>, config: SimulatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let propagator = Propagator::new(circuit, config.propagator.clone())?;

        let requests = Arc::new(RequestQueue::new(
            config.max_pending_ticks,
            config.max_pending_steps,
        ));
        let (ticker_tx, ticker_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            propagator: Mutex::new(propagator),
            requests: Arc::clone(&requests),
            listeners: ListenerSet::default(),
            running: AtomicBool::new(config.running),
            lock_timeout: config.lock_timeout,
            ticker: Mutex::new(ticker_tx),
            ticking: AtomicBool::new(config.ticking),
            frequency_hz: Mutex::new(config.tick_frequency_hz),
            oscillating: AtomicBool::new(false),
            tick_count: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            oscillating_points: Mutex::new(None),
            step_points: Mutex::new(PropagationPoints::new()),
        });

        let thread_state = PropagationThreadState::new(Arc::clone(&shared));
        let propagation_thread = thread::Builder::new()
            .name("gatesim-propagation".into())
            .spawn(move || thread_state.run())
            .expect("failed to spawn propagation thread");

        let ticker_state = TickerThreadState::new(ticker_rx, requests);
        let ticker_thread = thread::Builder::new()
            .name("gatesim-ticker".into())
            .spawn(move || ticker_state.run())
            .expect("failed to spawn ticker thread");

        shared.update_ticker();
        if config.running {
            shared.requests.request_propagate();
        }

        Ok(Self {
            shared,
            propagator_config: config.propagator,
            propagation_thread: Some(propagation_thread),
            ticker_thread: Some(ticker_thread),
        })
    }

    // ── Propagator access ──────────────────────────────────────────

    /// Replace the simulated circuit with a fresh propagator for
    /// `circuit`, and return the previous one.
    pub fn set_circuit(&self, circuit: Arc<Circuit>) -> Result<Propagator, ConfigError> {
        let propagator = Propagator::new(circuit, self.propagator_config.clone())?;
        Ok(self.set_propagator(propagator))
    }

    /// Swap in `propagator` and return the previous one.
    ///
    /// Waits for any in-flight round to finish. The new propagator is
    /// settled if the simulator is running.
    pub fn set_propagator(&self, propagator: Propagator) -> Propagator {
        let old = {
            let mut current = self.shared.propagator();
            let old = std::mem::replace(&mut *current, propagator);
            self.shared.publish(&current);
            *self.shared.step_points() = PropagationPoints::new();
            debug!(circuit = current.root_circuit().name(), "propagator replaced");
            old
        };
        self.shared.notify_state_changed();
        if self.is_running() {
            self.shared.requests.request_propagate();
        }
        old
    }

    /// Run `f` with exclusive access to the propagator, e.g. to drive an
    /// input. Waits for any in-flight round to finish.
    ///
    /// Stimuli scheduled here take effect on the next round; call
    /// [`request_propagate`](Self::request_propagate) or
    /// [`step`](Self::step) afterwards.
    ///
    /// `f` must not start a write transaction: a round holds its circuits'
    /// read locks while it waits for the propagator.
    pub fn with_propagator<R>(&self, f: impl FnOnce(&mut Propagator) -> R) -> R {
        let mut propagator = self.shared.propagator();
        let result = f(&mut propagator);
        self.shared.publish(&propagator);
        result
    }

    // ── Run state ──────────────────────────────────────────────────

    /// Continuous-run mode is on.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Turn continuous-run mode on or off. Turning it on settles the
    /// circuit; oscillation turns it off again.
    pub fn set_running(&self, running: bool) {
        if self.shared.running.swap(running, Ordering::AcqRel) == running {
            return;
        }
        debug!(running, "simulator run state changed");
        self.shared.update_ticker();
        self.shared.notify_state_changed();
        if running {
            self.shared.requests.request_propagate();
        }
    }

    /// The ticker is enabled.
    pub fn is_ticking(&self) -> bool {
        self.shared.ticking.load(Ordering::Acquire)
    }

    /// Enable or disable the ticker. Ticks are generated only while also
    /// running and at a non-zero frequency.
    pub fn set_ticking(&self, ticking: bool) {
        if self.shared.ticking.swap(ticking, Ordering::AcqRel) == ticking {
            return;
        }
        debug!(ticking, "simulator ticking changed");
        self.shared.update_ticker();
        self.shared.notify_state_changed();
    }

    /// Configured clock frequency in Hz.
    pub fn tick_frequency(&self) -> f64 {
        self.shared.frequency_hz()
    }

    /// Change the clock frequency. Zero suspends the ticker without
    /// affecting [`step`](Self::step) or explicit [`tick`](Self::tick)
    /// requests.
    pub fn set_tick_frequency(&self, hz: f64) -> Result<(), ConfigError> {
        validate_frequency(hz)?;
        {
            let mut current = self
                .shared
                .frequency_hz
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *current == hz {
                return Ok(());
            }
            *current = hz;
        }
        debug!(hz, "tick frequency changed");
        self.shared.update_ticker();
        self.shared.notify_state_changed();
        Ok(())
    }

    // ── Requests ───────────────────────────────────────────────────

    /// Request one single-instant step. Steps are serviced only while not
    /// running; they are discarded in running mode. Returns false if the
    /// step queue is full.
    pub fn step(&self) -> bool {
        self.shared.requests.request_step()
    }

    /// Request one clock tick. Returns false if the tick queue is full.
    ///
    /// While not running, pending ticks are applied with the next step.
    pub fn tick(&self) -> bool {
        self.shared.requests.request_ticks(1) > 0
    }

    /// Discard all simulation state before the next round.
    pub fn request_reset(&self) {
        self.shared.requests.request_reset();
    }

    /// Settle the circuit. Ignored while not running.
    pub fn request_propagate(&self) {
        self.shared.requests.request_propagate();
    }

    // ── Queries ────────────────────────────────────────────────────

    /// The last settle hit the iteration limit. Cleared by the next
    /// settle, or by a step that leaves no events queued.
    pub fn is_oscillating(&self) -> bool {
        self.shared.oscillating.load(Ordering::Acquire)
    }

    /// Points active near the end of an oscillating settle.
    pub fn oscillating_points(&self) -> Option<PropagationPoints> {
        self.shared
            .oscillating_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Points touched by the most recent step.
    pub fn step_points(&self) -> PropagationPoints {
        self.shared.step_points().clone()
    }

    /// Clock ticks applied since the last reset.
    pub fn tick_count(&self) -> u64 {
        self.shared.tick_count.load(Ordering::Acquire)
    }

    /// Current state as a listener would see it.
    pub fn snapshot(&self) -> SimulatorEvent {
        self.shared.event()
    }

    // ── Listeners ──────────────────────────────────────────────────

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn SimulatorListener>) {
        self.shared.listeners.add(listener);
    }

    /// Unregister a listener, matched by identity. Returns whether it was
    /// registered.
    pub fn remove_listener(&self, listener: &Arc<dyn SimulatorListener>) -> bool {
        self.shared.listeners.remove(listener)
    }

    // ── Shutdown ───────────────────────────────────────────────────

    /// Stop both threads and join them.
    ///
    /// An in-flight propagation round is allowed to finish. Calling this
    /// more than once is harmless.
    pub fn shutdown(&mut self) -> ShutdownReport {
        let start = Instant::now();
        self.shared.requests.request_shutdown();
        self.shared.send_ticker(TickerCommand::Shutdown);

        let propagation_joined = self
            .propagation_thread
            .take()
            .is_none_or(|h| h.join().is_ok());
        let ticker_joined = self
            .ticker_thread
            .take()
            .is_none_or(|h| h.join().is_ok());

        let total_ms = start.elapsed().as_millis() as u64;
        debug!(total_ms, propagation_joined, ticker_joined, "simulator shut down");
        ShutdownReport {
            total_ms,
            propagation_joined,
            ticker_joined,
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        if self.propagation_thread.is_some() || self.ticker_thread.is_some() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("state", &self.shared.event())
            .field("shut_down", &self.propagation_thread.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> SimulatorConfig {
        SimulatorConfig {
            running: false,
            ..Default::default()
        }
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut sim = Simulator::new(Circuit::new("empty"), quiet_config()).unwrap();
        let report = sim.shutdown();
        assert!(report.propagation_joined);
        assert!(report.ticker_joined);
        let again = sim.shutdown();
        assert!(again.propagation_joined && again.ticker_joined);
    }

    #[test]
    fn drop_triggers_shutdown() {
        let sim = Simulator::new(Circuit::new("empty"), SimulatorConfig::default()).unwrap();
        thread::sleep(Duration::from_millis(20));
        drop(sim);
        // If this doesn't hang, shutdown worked.
    }

    #[test]
    fn invalid_frequency_is_rejected() {
        let sim = Simulator::new(Circuit::new("empty"), quiet_config()).unwrap();
        assert!(sim.set_tick_frequency(-5.0).is_err());
        assert_eq!(sim.tick_frequency(), 1.0);
        sim.set_tick_frequency(0.0).unwrap();
        assert_eq!(sim.tick_frequency(), 0.0);
    }

    #[test]
    fn racing_run_changes_leave_the_ticker_matching_the_state() {
        let config = SimulatorConfig {
            running: false,
            ticking: true,
            tick_frequency_hz: 1000.0,
            ..Default::default()
        };
        let sim = Simulator::new(Circuit::new("empty"), config).unwrap();

        // One side stops the run the way an oscillation does; the other
        // restarts it and finishes last.
        thread::scope(|s| {
            s.spawn(|| {
                for _ in 0..100 {
                    sim.shared.running.store(false, Ordering::Release);
                    sim.shared.update_ticker();
                }
            });
            s.spawn(|| {
                for _ in 0..2000 {
                    sim.shared.running.store(true, Ordering::Release);
                    sim.shared.update_ticker();
                }
            });
        });
        if !sim.is_running() {
            return;
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while sim.tick_count() == 0 {
            assert!(Instant::now() < deadline, "ticker stayed asleep");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulatorConfig {
            max_pending_ticks: 0,
            ..Default::default()
        };
        assert!(Simulator::new(Circuit::new("empty"), config).is_err());
    }
}
