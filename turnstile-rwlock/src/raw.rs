//! The lock itself: counters behind one mutex, two condition variables.
//!
//! ```text
//! reader_lock:  guard ─► waiting_readers += 1
//!                        while policy.reader_must_wait(): wait(read_go)
//!                        waiting_readers -= 1, active_readers += 1
//!
//! reader_unlock: guard ─► active_readers -= 1, reads_done += 1
//!                        match policy.after_reader_release():
//!                          OneWriter  ─► write_go.notify_one()
//!                          AllReaders ─► read_go.notify_all()
//! ```
//!
//! Writers mirror this on `write_go`, and reset `reads_done` on release.
//! Every counter change and every notify happens under the guard, and every
//! wakeup re-tests the predicate, so a waiter is never forgotten and a
//! broadcast only lets through the readers the policy admits.

use core::fmt;

use crossbeam_utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use crate::policy::{Counters, Policy, Wakeup};
use crate::trace::{debug, trace};

/// A reader/writer lock without data, driven by explicit lock/unlock calls.
///
/// Pair every `*_lock` (or successful `try_*_lock`) with exactly one matching
/// `*_unlock` on the same lock. Acquisitions are not reentrant: a thread that
/// already holds the lock and asks for it again may deadlock, depending on
/// the policy and who is waiting.
///
/// Prefer [`FairRwLock`](crate::FairRwLock), which pairs the calls through
/// RAII guards.
///
/// # Example
///
/// ```
/// use turnstile_rwlock::{Policy, RawFairRwLock};
///
/// let lock = RawFairRwLock::new(Policy::NWay(4));
///
/// lock.reader_lock();
/// lock.reader_lock();
/// assert_eq!(lock.counters().active_readers, 2);
/// assert!(!lock.try_writer_lock());
///
/// // Safety: both read locks above are held and released exactly once.
/// unsafe {
///     lock.reader_unlock();
///     lock.reader_unlock();
/// }
///
/// lock.writer_lock();
/// // Safety: the write lock above is held.
/// unsafe { lock.writer_unlock() };
/// ```
pub struct RawFairRwLock {
    policy: Policy,
    state: CachePadded<Mutex<Counters>>,
    read_go: Condvar,
    write_go: Condvar,
}

impl RawFairRwLock {
    /// Creates an unlocked lock arbitrating with `policy`.
    pub fn new(policy: Policy) -> Self {
        debug!(%policy, "rwlock created");

        Self {
            policy,
            state: CachePadded::new(Mutex::new(Counters::default())),
            read_go: Condvar::new(),
            write_go: Condvar::new(),
        }
    }

    /// The policy fixed at construction.
    #[inline]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Acquires the lock shared, blocking while the policy says readers wait.
    pub fn reader_lock(&self) {
        let mut state = self.state.lock();
        state.waiting_readers += 1;

        while self.policy.reader_must_wait(&state) {
            trace!(counters = ?*state, "reader parked");
            self.read_go.wait(&mut state);
        }

        state.waiting_readers -= 1;
        state.active_readers += 1;
        debug_assert!(state.is_consistent(), "reader admitted alongside a writer");
    }

    /// Acquires the lock shared if the policy admits a reader right now.
    ///
    /// Never blocks and leaves no trace in the waiting counters when it
    /// fails.
    pub fn try_reader_lock(&self) -> bool {
        let mut state = self.state.lock();

        let mut probe = *state;
        probe.waiting_readers += 1;
        if self.policy.reader_must_wait(&probe) {
            return false;
        }

        state.active_readers += 1;
        true
    }

    /// Releases a shared hold.
    ///
    /// # Safety
    ///
    /// The caller must hold this lock shared, acquired by
    /// [`reader_lock`](Self::reader_lock) or a successful
    /// [`try_reader_lock`](Self::try_reader_lock), and must not use that hold
    /// afterwards.
    pub unsafe fn reader_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.active_readers > 0, "reader_unlock without a read hold");

        state.active_readers -= 1;
        state.reads_done = state.reads_done.wrapping_add(1);

        let wakeup = self.policy.after_reader_release(&state);
        trace!(?wakeup, counters = ?*state, "reader released");
        self.wake(wakeup);
    }

    /// Acquires the lock exclusively, blocking while the policy says writers
    /// wait.
    pub fn writer_lock(&self) {
        let mut state = self.state.lock();
        state.waiting_writers += 1;

        while self.policy.writer_must_wait(&state) {
            trace!(counters = ?*state, "writer parked");
            self.write_go.wait(&mut state);
        }

        state.waiting_writers -= 1;
        state.active_writers += 1;
        debug_assert!(state.is_consistent(), "writer admitted alongside a holder");
    }

    /// Acquires the lock exclusively if the policy admits a writer right now.
    pub fn try_writer_lock(&self) -> bool {
        let mut state = self.state.lock();

        let mut probe = *state;
        probe.waiting_writers += 1;
        if self.policy.writer_must_wait(&probe) {
            return false;
        }

        state.active_writers += 1;
        true
    }

    /// Releases an exclusive hold and starts a fresh reader round.
    ///
    /// # Safety
    ///
    /// The caller must hold this lock exclusively, acquired by
    /// [`writer_lock`](Self::writer_lock) or a successful
    /// [`try_writer_lock`](Self::try_writer_lock), and must not use that hold
    /// afterwards.
    pub unsafe fn writer_unlock(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.active_writers == 1, "writer_unlock without a write hold");

        state.active_writers -= 1;
        state.reads_done = 0;

        let wakeup = self.policy.after_writer_release(&state);
        trace!(?wakeup, counters = ?*state, "writer released");
        self.wake(wakeup);
    }

    /// Snapshot of the counters, taken under the guard.
    ///
    /// Stale as soon as it returns; meant for instrumentation and tests.
    pub fn counters(&self) -> Counters {
        *self.state.lock()
    }

    /// Returns `true` if any thread holds the lock, shared or exclusive.
    pub fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.active_readers > 0 || state.active_writers > 0
    }

    /// Returns `true` if a writer holds the lock.
    pub fn is_locked_exclusive(&self) -> bool {
        self.state.lock().active_writers > 0
    }

    /// Must be called with the guard held.
    #[inline]
    fn wake(&self, wakeup: Wakeup) {
        match wakeup {
            Wakeup::None => {}
            Wakeup::OneWriter => {
                self.write_go.notify_one();
            }
            Wakeup::AllReaders => {
                self.read_go.notify_all();
            }
        }
    }
}

impl fmt::Debug for RawFairRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFairRwLock")
            .field("policy", &self.policy)
            .field("counters", &self.counters())
            .finish()
    }
}
