//! Coalescing request queue between callers and the propagation thread.
//!
//! Requests are flags and small counters under one mutex, so bursts of
//! identical requests collapse into one unit of work. A bounded(1)
//! crossbeam channel acts as a doorbell: every request rings it with
//! `try_send`, and a full doorbell means the worker will already look at
//! the flags again.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Receiver, Sender};

#[derive(Debug, Default)]
struct Pending {
    shutdown: bool,
    reset: bool,
    propagate: bool,
    ticks: u32,
    steps: u32,
}

/// One unit of work for the propagation thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Round {
    /// Reset the propagator first.
    pub reset: bool,
    /// Clock ticks to apply, each followed by a settle.
    pub ticks: u32,
    /// Settle once more after the ticks.
    pub propagate: bool,
    /// Process a single time instant instead of settling.
    pub step: bool,
}

impl Round {
    fn is_empty(&self) -> bool {
        *self == Round::default()
    }
}

/// What the propagation thread should do next.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Next {
    /// Stop the thread.
    Shutdown,
    /// Run one round.
    Work(Round),
    /// Spurious wake-up; wait again.
    Idle,
}

pub(crate) struct RequestQueue {
    pending: Mutex<Pending>,
    doorbell_tx: Sender<()>,
    doorbell_rx: Receiver<()>,
    max_ticks: u32,
    max_steps: u32,
}

impl RequestQueue {
    pub fn new(max_ticks: u32, max_steps: u32) -> Self {
        let (doorbell_tx, doorbell_rx) = crossbeam_channel::bounded(1);
        Self {
            pending: Mutex::new(Pending::default()),
            doorbell_tx,
            doorbell_rx,
            max_ticks,
            max_steps,
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ring(&self) {
        // Full means a wake-up is already queued.
        let _ = self.doorbell_tx.try_send(());
    }

    pub fn request_shutdown(&self) {
        self.pending().shutdown = true;
        self.ring();
    }

    pub fn request_reset(&self) {
        self.pending().reset = true;
        self.ring();
    }

    pub fn request_propagate(&self) {
        self.pending().propagate = true;
        self.ring();
    }

    /// Queue `n` ticks, saturating at the configured limit. Returns how
    /// many were accepted.
    pub fn request_ticks(&self, n: u32) -> u32 {
        let accepted = {
            let mut p = self.pending();
            let accepted = n.min(self.max_ticks.saturating_sub(p.ticks));
            p.ticks += accepted;
            accepted
        };
        if accepted > 0 {
            self.ring();
        }
        accepted
    }

    /// Queue one step. Returns false if the step queue is full.
    pub fn request_step(&self) -> bool {
        let accepted = {
            let mut p = self.pending();
            let accepted = p.steps < self.max_steps;
            if accepted {
                p.steps += 1;
            }
            accepted
        };
        if accepted {
            self.ring();
        }
        accepted
    }

    /// Consume a propagate request made while the previous settle ran.
    pub fn take_propagate(&self) -> bool {
        std::mem::take(&mut self.pending().propagate)
    }

    /// Discard pending ticks, e.g. after oscillation stops the run.
    pub fn drop_ticks(&self) {
        self.pending().ticks = 0;
    }

    /// Block until the doorbell rings, then take the next round.
    ///
    /// `running` is read after the wake-up, so a request made right after
    /// a run-state change is taken under the new state.
    pub fn wait(&self, running: impl FnOnce() -> bool) -> Next {
        if self.doorbell_rx.recv().is_err() {
            return Next::Shutdown;
        }
        self.next_round(running())
    }

    /// Take the work due for one round.
    ///
    /// While running, everything pending is taken at once and steps are
    /// discarded. Otherwise one step is taken, every pending tick is
    /// collapsed into it, and propagate requests are dropped; leftover
    /// steps ring the doorbell again.
    pub fn next_round(&self, running: bool) -> Next {
        let mut p = self.pending();
        if p.shutdown {
            return Next::Shutdown;
        }
        let mut round = Round {
            reset: std::mem::take(&mut p.reset),
            ..Round::default()
        };
        if running {
            round.ticks = std::mem::take(&mut p.ticks);
            round.propagate = std::mem::take(&mut p.propagate);
            p.steps = 0;
        } else {
            p.propagate = false;
            if p.steps > 0 {
                p.steps -= 1;
                round.step = true;
                round.ticks = u32::from(std::mem::take(&mut p.ticks) > 0);
            }
        }
        let more = !running && p.steps > 0;
        drop(p);
        if more {
            self.ring();
        }
        if round.is_empty() {
            Next::Idle
        } else {
            Next::Work(round)
        }
    }

    /// Put back a round that could not run.
    pub fn requeue(&self, round: Round) {
        {
            let mut p = self.pending();
            p.reset |= round.reset;
            p.propagate |= round.propagate;
            p.ticks = (p.ticks + round.ticks).min(self.max_ticks);
            if round.step {
                p.steps = (p.steps + 1).min(self.max_steps);
            }
        }
        self.ring();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn bursts_coalesce() {
        let q = RequestQueue::new(3, 3);
        for _ in 0..10 {
            q.request_propagate();
        }
        assert_eq!(q.request_ticks(5), 3);
        assert_eq!(q.request_ticks(1), 0);
        assert_eq!(
            q.wait(|| true),
            Next::Work(Round {
                ticks: 3,
                propagate: true,
                ..Round::default()
            })
        );
        assert_eq!(q.next_round(true), Next::Idle);
    }

    #[test]
    fn stepping_takes_one_step_at_a_time() {
        let q = RequestQueue::new(4, 2);
        assert!(q.request_step());
        assert!(q.request_step());
        assert!(!q.request_step());
        q.request_ticks(3);
        q.request_propagate();

        let first = q.wait(|| false);
        assert_eq!(
            first,
            Next::Work(Round {
                ticks: 1,
                step: true,
                ..Round::default()
            })
        );
        // The leftover step rang the doorbell again.
        assert_eq!(
            q.wait(|| false),
            Next::Work(Round {
                step: true,
                ..Round::default()
            })
        );
        assert_eq!(q.next_round(false), Next::Idle);
    }

    #[test]
    fn run_state_is_read_after_wake_up() {
        let q = Arc::new(RequestQueue::new(1, 1));
        let running = Arc::new(AtomicBool::new(false));
        let waiter = {
            let (q, running) = (Arc::clone(&q), Arc::clone(&running));
            std::thread::spawn(move || q.wait(|| running.load(Ordering::Acquire)))
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        running.store(true, Ordering::Release);
        q.request_propagate();
        assert_eq!(
            waiter.join().unwrap(),
            Next::Work(Round {
                propagate: true,
                ..Round::default()
            })
        );
    }

    #[test]
    fn shutdown_wins() {
        let q = RequestQueue::new(1, 1);
        q.request_reset();
        q.request_shutdown();
        assert_eq!(q.wait(|| true), Next::Shutdown);
    }

    #[test]
    fn requeue_respects_limits() {
        let q = RequestQueue::new(2, 1);
        q.request_ticks(2);
        q.requeue(Round {
            ticks: 2,
            step: true,
            reset: true,
            propagate: false,
        });
        assert_eq!(
            q.next_round(true),
            Next::Work(Round {
                reset: true,
                ticks: 2,
                ..Round::default()
            })
        );
    }
}
