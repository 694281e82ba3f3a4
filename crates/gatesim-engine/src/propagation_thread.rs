//! Propagation loop for the background simulation thread.
//!
//! The thread sleeps on the [`RequestQueue`] doorbell and runs one round
//! per wake-up. A round read-locks every circuit the propagator touches,
//! then either settles (running) or advances one instant (stepping).
//! Listener notifications are collected during the round and delivered
//! after every lock is released.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use gatesim_circuit::Transaction;
use gatesim_propagator::{PropagationPoints, Propagator};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::listener::Notice;
use crate::request::{Next, Round};
use crate::simulator::Shared;

type Notices = SmallVec<[Notice; 8]>;

/// State held by the propagation thread's loop.
pub(crate) struct PropagationThreadState {
    shared: Arc<Shared>,
}

impl PropagationThreadState {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Main loop. Runs until shutdown is requested.
    pub fn run(self) {
        debug!("propagation thread started");
        loop {
            let running = || self.shared.running.load(Ordering::Acquire);
            match self.shared.requests.wait(running) {
                Next::Shutdown => break,
                Next::Idle => continue,
                Next::Work(round) => self.run_round(round),
            }
        }
        debug!("propagation thread stopped");
    }

    fn run_round(&self, round: Round) {
        let mut notices = Notices::new();
        loop {
            let circuits = self.shared.propagator().circuits();
            let mut transaction = circuits
                .iter()
                .fold(Transaction::new(), |t, c| t.read(c));
            if let Some(timeout) = self.shared.lock_timeout {
                transaction = transaction.timeout(timeout);
            }
            let guard = match transaction.acquire() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(error = %e, "propagation round could not lock its circuits; retrying");
                    self.shared.requests.requeue(round);
                    return;
                }
            };

            let mut propagator = self.shared.propagator();
            // The propagator may have been replaced, or grown a new
            // sub-circuit state, since the circuit list was taken.
            let covered = propagator
                .circuits()
                .iter()
                .all(|c| circuits.iter().any(|locked| Arc::ptr_eq(locked, c)));
            if !covered {
                drop(propagator);
                drop(guard);
                continue;
            }

            if round.step {
                self.step(&mut propagator, round, &mut notices);
            } else {
                self.settle_round(&mut propagator, round, &mut notices);
            }
            self.shared.publish(&propagator);
            break;
        }

        let event = self.shared.event();
        self.shared.listeners.fire(&notices, &event);
    }

    fn step(&self, propagator: &mut Propagator, round: Round, notices: &mut Notices) {
        if round.reset {
            self.reset(propagator, notices);
        }
        for _ in 0..round.ticks {
            propagator.tick();
            notices.push(Notice::Tick);
        }
        let mut points = PropagationPoints::new();
        let more = propagator.step(&mut points);
        debug!(
            clock = propagator.clock(),
            points = points.len(),
            pending = more,
            "stepped one instant"
        );
        *self.shared.step_points() = points;
        notices.push(Notice::Propagation);
    }

    fn settle_round(&self, propagator: &mut Propagator, round: Round, notices: &mut Notices) {
        if round.reset {
            self.reset(propagator, notices);
        }
        for _ in 0..round.ticks {
            propagator.tick();
            notices.push(Notice::Tick);
            if !self.settle(propagator, notices) {
                return;
            }
        }
        if round.propagate || round.reset {
            self.settle(propagator, notices);
        }
    }

    /// Propagate until no further propagate request arrived during the
    /// call. Returns false if the circuit oscillated, after stopping the
    /// run.
    fn settle(&self, propagator: &mut Propagator, notices: &mut Notices) -> bool {
        loop {
            let metrics = propagator.propagate();
            notices.push(Notice::Propagation);
            if metrics.oscillating {
                self.stop_oscillating_run(propagator, notices);
                return false;
            }
            if !self.shared.requests.take_propagate() {
                return true;
            }
        }
    }

    fn stop_oscillating_run(&self, propagator: &Propagator, notices: &mut Notices) {
        let points = propagator.oscillating_points().map_or(0, |p| p.len());
        warn!(
            circuit = propagator.root_circuit().name(),
            clock = propagator.clock(),
            points,
            "oscillation detected; stopping simulation"
        );
        self.shared.running.store(false, Ordering::Release);
        self.shared.requests.drop_ticks();
        self.shared.update_ticker();
        notices.push(Notice::StateChanged);
    }

    fn reset(&self, propagator: &mut Propagator, notices: &mut Notices) {
        propagator.reset();
        self.shared.step_points().clear();
        notices.push(Notice::StateChanged);
    }
}
