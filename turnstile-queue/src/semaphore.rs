//! Counting permits with a three-phase acquire.
//!
//! The queue holds two of these: one counting free slots, one counting filled
//! slots. Acquiring follows the same escalation as a blocking channel:
//!
//! ```text
//! Phase 1: try_acquire         permit already available
//! Phase 2: Backoff::snooze()   permit released "soon" by a peer
//! Phase 3: Condvar::wait()     park until release() or close()
//! ```
//!
//! All permit accounting happens under one mutex, so a release that races
//! with a thread going to sleep is never lost: the sleeper re-tests the
//! permit count under the same lock the releaser notified under.

use std::time::Instant;

use crossbeam_utils::Backoff;
use parking_lot::{Condvar, Mutex};

use crate::trace::trace;

/// Reason an acquire returned without a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Denied {
    /// No permit available right now (non-blocking acquire only).
    Empty,
    /// Closed, and every remaining permit has been handed out.
    Closed,
    /// The deadline passed while waiting.
    TimedOut,
}

struct State {
    permits: usize,
    /// Threads currently inside the park phase.
    sleepers: usize,
    closed: bool,
}

impl State {
    #[inline]
    fn take(&mut self) -> Result<(), Denied> {
        if self.permits > 0 {
            self.permits -= 1;
            Ok(())
        } else if self.closed {
            Err(Denied::Closed)
        } else {
            Err(Denied::Empty)
        }
    }
}

pub(crate) struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
    snooze_iters: usize,
}

impl Semaphore {
    pub(crate) fn new(permits: usize, snooze_iters: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                sleepers: 0,
                closed: false,
            }),
            available: Condvar::new(),
            snooze_iters,
        }
    }

    /// Takes a permit if one is available, without waiting.
    #[inline]
    pub(crate) fn try_acquire(&self) -> Result<(), Denied> {
        self.state.lock().take()
    }

    /// Takes a permit, waiting as long as necessary.
    ///
    /// Only fails with [`Denied::Closed`].
    pub(crate) fn acquire(&self) -> Result<(), Denied> {
        self.acquire_until(None)
    }

    /// Takes a permit, waiting until `deadline` at the latest.
    pub(crate) fn acquire_until(&self, deadline: Option<Instant>) -> Result<(), Denied> {
        // Fast path
        match self.try_acquire() {
            Err(Denied::Empty) => {}
            done => return done,
        }

        // Backoff phase
        let backoff = Backoff::new();
        for _ in 0..self.snooze_iters {
            backoff.snooze();

            match self.try_acquire() {
                Err(Denied::Empty) => {}
                done => return done,
            }

            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(Denied::TimedOut);
            }
        }

        // Park phase
        let mut state = self.state.lock();
        state.sleepers += 1;

        let result = loop {
            match state.take() {
                Err(Denied::Empty) => {}
                done => break done,
            }

            trace!(sleepers = state.sleepers, "parking until a permit is released");

            match deadline {
                None => self.available.wait(&mut state),
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out() {
                        // A release may have landed right as the timer fired.
                        break match state.take() {
                            Err(Denied::Empty) => Err(Denied::TimedOut),
                            done => done,
                        };
                    }
                }
            }

            trace!(permits = state.permits, closed = state.closed, "woke from park");
        };

        state.sleepers -= 1;
        result
    }

    /// Returns one permit and wakes a single sleeper, if any.
    pub(crate) fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;

        // Only notify when someone actually went to sleep.
        if state.sleepers > 0 {
            self.available.notify_one();
        }
    }

    /// Marks the semaphore closed and wakes every sleeper.
    ///
    /// Permits still outstanding can be acquired; once they run out,
    /// acquisitions fail with [`Denied::Closed`] instead of blocking.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        if state.sleepers > 0 {
            self.available.notify_all();
        }
    }

    /// Permits currently available.
    #[cfg(test)]
    pub(crate) fn available(&self) -> usize {
        self.state.lock().permits
    }

    /// Threads currently parked (or about to re-check) in [`acquire`](Self::acquire).
    pub(crate) fn sleepers(&self) -> usize {
        self.state.lock().sleepers
    }
}
