//! Per-circuit reentrant reader/writer lock.
//!
//! [`CircuitLocker`] tracks which thread holds the write lock and how many
//! read locks each thread holds. Lock ownership is keyed by [`ThreadId`],
//! so a thread that already writes a circuit may "re-acquire" it for
//! reading or writing without blocking. Writers are preferred: once a
//! writer is waiting, new readers queue behind it unless they already
//! hold a read lock.
//!
//! Lockers are not meant to be driven directly; use a
//! [`Transaction`](crate::Transaction), which orders acquisitions across
//! circuits by [`serial_number`](CircuitLocker::serial_number).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Instant;

use crate::error::LockError;

/// Counter for lock-ordering serial numbers.
static SERIAL_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Requested access level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockMode {
    /// Shared access.
    Read,
    /// Exclusive access.
    Write,
}

/// Result of a successful lock request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// A lock was taken and must be released.
    Acquired,
    /// The caller already had sufficient access; nothing to release.
    Reentrant,
}

#[derive(Default)]
struct LockState {
    writer: Option<ThreadId>,
    readers: HashMap<ThreadId, usize>,
    writers_waiting: usize,
}

impl LockState {
    fn reader_total(&self) -> usize {
        self.readers.values().sum()
    }
}

/// Reentrant reader/writer lock guarding one circuit.
pub struct CircuitLocker {
    serial: u64,
    state: Mutex<LockState>,
    changed: Condvar,
}

impl Default for CircuitLocker {
    fn default() -> Self {
        Self::new()
    }
}

// Compile-time assertion: CircuitLocker must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<CircuitLocker>();
};

impl CircuitLocker {
    /// Create an unlocked locker with a fresh serial number.
    pub fn new() -> Self {
        Self {
            serial: SERIAL_COUNTER.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(LockState::default()),
            changed: Condvar::new(),
        }
    }

    /// Process-wide, strictly increasing number fixing the lock order.
    pub fn serial_number(&self) -> u64 {
        self.serial
    }

    // No user code runs while `state` is held, so a poisoned mutex still
    // guards consistent bookkeeping.
    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the calling thread holds the write lock.
    pub fn has_write_lock(&self) -> bool {
        self.lock_state().writer == Some(thread::current().id())
    }

    /// Whether any thread holds the write lock.
    pub fn is_write_locked(&self) -> bool {
        self.lock_state().writer.is_some()
    }

    /// Total read locks held across all threads.
    pub fn reader_count(&self) -> usize {
        self.lock_state().reader_total()
    }

    /// Panic unless the calling thread holds the write lock.
    ///
    /// Mutating a circuit outside a write transaction is a programming
    /// error, not a recoverable condition.
    pub fn check_for_write_permission(&self, op: &str) {
        if !self.has_write_lock() {
            panic!(
                "{op} requires a write transaction on circuit #{}",
                self.serial
            );
        }
    }

    /// Acquire a read lock, waiting until `deadline` if one is given.
    pub fn lock_read(&self, deadline: Option<Instant>) -> Result<LockOutcome, LockError> {
        let me = thread::current().id();
        let mut state = self.lock_state();
        if state.writer == Some(me) {
            return Ok(LockOutcome::Reentrant);
        }
        if let Some(count) = state.readers.get_mut(&me) {
            *count += 1;
            return Ok(LockOutcome::Acquired);
        }
        while state.writer.is_some() || state.writers_waiting > 0 {
            state = self.wait(state, deadline)?;
        }
        *state.readers.entry(me).or_insert(0) += 1;
        Ok(LockOutcome::Acquired)
    }

    /// Acquire the write lock, waiting until `deadline` if one is given.
    pub fn lock_write(&self, deadline: Option<Instant>) -> Result<LockOutcome, LockError> {
        let me = thread::current().id();
        let mut state = self.lock_state();
        if state.writer == Some(me) {
            return Ok(LockOutcome::Reentrant);
        }
        if state.readers.contains_key(&me) {
            return Err(LockError::UpgradeDenied {
                serial: self.serial,
            });
        }
        state.writers_waiting += 1;
        while state.writer.is_some() || state.reader_total() > 0 {
            match self.wait(state, deadline) {
                Ok(next) => state = next,
                Err(e) => {
                    let mut state = self.lock_state();
                    state.writers_waiting -= 1;
                    drop(state);
                    // Readers parked behind us may proceed now.
                    self.changed.notify_all();
                    return Err(e);
                }
            }
        }
        state.writers_waiting -= 1;
        state.writer = Some(me);
        Ok(LockOutcome::Acquired)
    }

    /// Release one read lock held by the calling thread.
    pub(crate) fn unlock_read(&self) {
        let me = thread::current().id();
        let mut state = self.lock_state();
        if let Some(count) = state.readers.get_mut(&me) {
            *count -= 1;
            if *count == 0 {
                state.readers.remove(&me);
            }
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Release the write lock held by the calling thread.
    pub(crate) fn unlock_write(&self) {
        let me = thread::current().id();
        let mut state = self.lock_state();
        if state.writer == Some(me) {
            state.writer = None;
        }
        drop(state);
        self.changed.notify_all();
    }

    fn wait<'a>(
        &'a self,
        state: MutexGuard<'a, LockState>,
        deadline: Option<Instant>,
    ) -> Result<MutexGuard<'a, LockState>, LockError> {
        match deadline {
            None => Ok(self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner)),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    tracing::debug!(serial = self.serial, "circuit lock wait timed out");
                    return Err(LockError::Timeout {
                        serial: self.serial,
                    });
                }
                let (state, _) = self
                    .changed
                    .wait_timeout(state, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner);
                Ok(state)
            }
        }
    }
}

impl fmt::Debug for CircuitLocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("CircuitLocker")
            .field("serial", &self.serial)
            .field("writer", &state.writer)
            .field("readers", &state.reader_total())
            .field("writers_waiting", &state.writers_waiting)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn serial_numbers_increase() {
        let a = CircuitLocker::new();
        let b = CircuitLocker::new();
        assert!(b.serial_number() > a.serial_number());
    }

    #[test]
    fn writer_reenters_for_read_and_write() {
        let locker = CircuitLocker::new();
        assert_eq!(locker.lock_write(None), Ok(LockOutcome::Acquired));
        assert_eq!(locker.lock_write(None), Ok(LockOutcome::Reentrant));
        assert_eq!(locker.lock_read(None), Ok(LockOutcome::Reentrant));
        assert!(locker.has_write_lock());
        locker.unlock_write();
        assert!(!locker.is_write_locked());
    }

    #[test]
    fn readers_reenter_and_count() {
        let locker = CircuitLocker::new();
        locker.lock_read(None).unwrap();
        locker.lock_read(None).unwrap();
        assert_eq!(locker.reader_count(), 2);
        locker.unlock_read();
        locker.unlock_read();
        assert_eq!(locker.reader_count(), 0);
    }

    #[test]
    fn reader_cannot_upgrade() {
        let locker = CircuitLocker::new();
        locker.lock_read(None).unwrap();
        assert!(matches!(
            locker.lock_write(None),
            Err(LockError::UpgradeDenied { .. })
        ));
        locker.unlock_read();
        assert_eq!(locker.lock_write(None), Ok(LockOutcome::Acquired));
        locker.unlock_write();
    }

    #[test]
    fn write_times_out_behind_foreign_reader() {
        let locker = std::sync::Arc::new(CircuitLocker::new());
        let (held_tx, held_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let reader = {
            let locker = locker.clone();
            std::thread::spawn(move || {
                locker.lock_read(None).unwrap();
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                locker.unlock_read();
            })
        };
        held_rx.recv().unwrap();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(matches!(
            locker.lock_write(Some(deadline)),
            Err(LockError::Timeout { .. })
        ));
        release_tx.send(()).unwrap();
        reader.join().unwrap();
        assert_eq!(locker.lock_write(None), Ok(LockOutcome::Acquired));
        locker.unlock_write();
    }

    #[test]
    #[should_panic(expected = "requires a write transaction")]
    fn permission_check_panics_without_write_lock() {
        CircuitLocker::new().check_for_write_permission("add_wire");
    }
}
