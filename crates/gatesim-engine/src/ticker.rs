//! Clock generator thread.
//!
//! The ticker converts a frequency into a wake-up interval and asks the
//! propagation thread for ticks through the request queue. It is
//! controlled over a crossbeam channel and blocks on that channel while
//! asleep, so a stopped or zero-frequency clock costs nothing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::debug;

use crate::request::RequestQueue;

/// Wake-up schedule derived from a tick frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickPeriod {
    /// Time between wake-ups.
    pub interval: Duration,
    /// Ticks requested per wake-up.
    pub ticks_per_wake: u32,
}

impl TickPeriod {
    /// Schedule for `hz`, or `None` if the clock is off.
    ///
    /// Millisecond resolution cannot represent periods below 1 ms, so
    /// frequencies above 1 kHz wake every millisecond and request
    /// `round(hz / 1000)` ticks at a time.
    pub fn from_hz(hz: f64) -> Option<Self> {
        if !hz.is_finite() || hz <= 0.0 {
            return None;
        }
        if hz > 1000.0 {
            return Some(Self {
                interval: Duration::from_millis(1),
                ticks_per_wake: (hz / 1000.0).round() as u32,
            });
        }
        let millis = (1000.0 / hz).round().max(1.0) as u64;
        Some(Self {
            interval: Duration::from_millis(millis),
            ticks_per_wake: 1,
        })
    }
}

/// Control messages for the ticker thread.
#[derive(Debug)]
pub(crate) enum TickerCommand {
    /// Replace the schedule and the awake flag together. A `None`
    /// period stops the clock.
    Configure {
        period: Option<TickPeriod>,
        awake: bool,
    },
    /// Exit the thread.
    Shutdown,
}

/// State held by the ticker thread's loop.
pub(crate) struct TickerThreadState {
    control: Receiver<TickerCommand>,
    requests: Arc<RequestQueue>,
    period: Option<TickPeriod>,
    awake: bool,
    next_wake: Option<Instant>,
}

impl TickerThreadState {
    pub fn new(control: Receiver<TickerCommand>, requests: Arc<RequestQueue>) -> Self {
        Self {
            control,
            requests,
            period: None,
            awake: false,
            next_wake: None,
        }
    }

    /// Main loop. Runs until told to shut down or the control channel
    /// disconnects.
    pub fn run(mut self) {
        loop {
            let command = match self.active_period() {
                None => match self.control.recv() {
                    Ok(cmd) => cmd,
                    Err(_) => break,
                },
                Some(period) => {
                    let deadline = *self
                        .next_wake
                        .get_or_insert_with(|| Instant::now() + period.interval);
                    match self.control.recv_deadline(deadline) {
                        Ok(cmd) => cmd,
                        Err(RecvTimeoutError::Timeout) => {
                            self.requests.request_ticks(period.ticks_per_wake);
                            // No catch-up after a stall: resume from now.
                            let now = Instant::now();
                            let next = deadline + period.interval;
                            self.next_wake = Some(if next < now {
                                now + period.interval
                            } else {
                                next
                            });
                            continue;
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            };
            if !self.apply(command) {
                break;
            }
        }
        debug!("ticker thread stopped");
    }

    fn active_period(&self) -> Option<TickPeriod> {
        if self.awake {
            self.period
        } else {
            None
        }
    }

    /// Returns false on shutdown.
    fn apply(&mut self, command: TickerCommand) -> bool {
        match command {
            TickerCommand::Configure { period, awake } => {
                if self.period != period || self.awake != awake {
                    self.period = period;
                    self.awake = awake;
                    self.next_wake = None;
                }
            }
            TickerCommand::Shutdown => return false,
        }
        debug!(awake = self.awake, period = ?self.period, "ticker reconfigured");
        true
    }
}
