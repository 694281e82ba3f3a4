//! Multi-circuit lock transactions.
//!
//! A [`Transaction`] collects the circuits a piece of work will touch and
//! the access it needs on each, then acquires every lock in ascending
//! serial-number order. Two transactions that overlap therefore always
//! contend on the same circuit first, which rules out lock-order
//! deadlocks.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::circuit::Circuit;
use crate::error::LockError;
use crate::locker::{LockMode, LockOutcome};

/// Builder for a set of circuit locks.
///
/// # Examples
///
/// ```
/// use gatesim_circuit::{Circuit, Transaction};
///
/// let top = Circuit::new("top");
/// let adder = Circuit::new("adder");
///
/// Transaction::new()
///     .write(&top)
///     .read(&adder)
///     .execute(|_guard| {
///         assert!(top.locker().has_write_lock());
///     })
///     .unwrap();
/// assert!(!top.locker().is_write_locked());
/// ```
#[derive(Default)]
pub struct Transaction<'a> {
    requests: IndexMap<u64, (&'a Circuit, LockMode)>,
    timeout: Option<Duration>,
}

impl<'a> Transaction<'a> {
    /// An empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shared access to `circuit`.
    pub fn read(self, circuit: &'a Circuit) -> Self {
        self.request(circuit, LockMode::Read)
    }

    /// Request exclusive access to `circuit`. Subsumes a read request.
    pub fn write(self, circuit: &'a Circuit) -> Self {
        self.request(circuit, LockMode::Write)
    }

    /// Give up if any single lock cannot be taken within `timeout` of the
    /// start of [`acquire`](Self::acquire).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn request(mut self, circuit: &'a Circuit, mode: LockMode) -> Self {
        let entry = self
            .requests
            .entry(circuit.locker().serial_number())
            .or_insert((circuit, mode));
        entry.1 = entry.1.max(mode);
        self
    }

    /// Take every requested lock in serial-number order.
    ///
    /// Requests already satisfied by the calling thread (it holds the
    /// write lock) are skipped and not released by the guard. On failure,
    /// the locks taken so far are released before the error is returned.
    pub fn acquire(mut self) -> Result<TransactionGuard<'a>, LockError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        self.requests.sort_unstable_keys();
        let mut guard = TransactionGuard {
            held: Vec::with_capacity(self.requests.len()),
            _not_send: PhantomData,
        };
        for (_, (circuit, mode)) in self.requests {
            let locker = circuit.locker();
            let outcome = match mode {
                LockMode::Read => locker.lock_read(deadline),
                LockMode::Write => locker.lock_write(deadline),
            };
            match outcome {
                Ok(LockOutcome::Acquired) => guard.held.push((circuit, mode)),
                Ok(LockOutcome::Reentrant) => {}
                Err(e) => {
                    tracing::warn!(
                        circuit = circuit.name(),
                        error = %e,
                        "transaction failed; releasing partial locks"
                    );
                    // Dropping the guard unwinds what was taken.
                    return Err(e);
                }
            }
        }
        Ok(guard)
    }

    /// Acquire, run `f`, then release.
    pub fn execute<R>(self, f: impl FnOnce(&TransactionGuard<'a>) -> R) -> Result<R, LockError> {
        let guard = self.acquire()?;
        Ok(f(&guard))
    }
}

/// Locks held by an acquired [`Transaction`].
///
/// Releases in reverse acquisition order when dropped. Lock ownership is
/// per thread, so the guard cannot be sent to another thread.
pub struct TransactionGuard<'a> {
    held: Vec<(&'a Circuit, LockMode)>,
    _not_send: PhantomData<*const ()>,
}

impl TransactionGuard<'_> {
    /// Number of locks this guard will release.
    pub fn held_count(&self) -> usize {
        self.held.len()
    }
}

impl std::fmt::Debug for TransactionGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionGuard")
            .field("held_count", &self.held.len())
            .finish()
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        for (circuit, mode) in self.held.drain(..).rev() {
            match mode {
                LockMode::Read => circuit.locker().unlock_read(),
                LockMode::Write => circuit.locker().unlock_write(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_subsumes_read() {
        let c = Circuit::new("c");
        let guard = Transaction::new().read(&c).write(&c).acquire().unwrap();
        assert_eq!(guard.held_count(), 1);
        assert!(c.locker().has_write_lock());
        assert_eq!(c.locker().reader_count(), 0);
    }

    #[test]
    fn nested_transaction_by_writer_is_reentrant() {
        let c = Circuit::new("c");
        let outer = Transaction::new().write(&c).acquire().unwrap();
        let inner = Transaction::new().write(&c).read(&c).acquire().unwrap();
        assert_eq!(inner.held_count(), 0);
        drop(inner);
        assert!(c.locker().has_write_lock());
        drop(outer);
        assert!(!c.locker().is_write_locked());
    }

    #[test]
    fn upgrade_denial_releases_earlier_locks() {
        let a = Circuit::new("a");
        let b = Circuit::new("b");
        let read_b = Transaction::new().read(&b).acquire().unwrap();
        // `a` sorts before `b`, so its write lock is taken and must be
        // unwound when `b` refuses the upgrade.
        let err = Transaction::new().write(&a).write(&b).acquire().unwrap_err();
        assert!(matches!(err, LockError::UpgradeDenied { .. }));
        assert!(!a.locker().is_write_locked());
        drop(read_b);
    }
}
