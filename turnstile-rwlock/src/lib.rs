//! A reader/writer lock with a selectable fairness policy.
//!
//! Many readers may hold the lock at once, a writer holds it alone, and the
//! [`Policy`] chosen at construction decides who goes next when both sides
//! are waiting:
//!
//! | Policy | Favors | Starvation |
//! |--------|--------|------------|
//! | [`Policy::ReaderPriority`] | readers | writers starve under a steady stream of readers |
//! | [`Policy::WriterPriority`] | writers | readers starve under a steady stream of writers |
//! | [`Policy::NWay(n)`](Policy::NWay) | alternation | none: at most `n` readers pass a waiting writer per round |
//!
//! # Structure
//!
//! ```text
//!               ┌───────────── Mutex<Counters> ─────────────┐
//!  reader_lock ─┤ active/waiting readers, active/waiting    ├─ writer_lock
//!       ▲       │ writers, reads_done                        │      ▲
//!       │       └───────────────┬───────────────────────────┘      │
//!   read_go.notify_all   ◄── Policy::after_*_release ──►   write_go.notify_one
//! ```
//!
//! All bookkeeping happens under one mutex; the policy is a set of pure
//! predicates over the counters ([`Counters`]), so waiting threads simply
//! re-test their predicate on every wakeup.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use turnstile_rwlock::{FairRwLock, Policy};
//!
//! let config = Arc::new(FairRwLock::new(Policy::NWay(8), vec![1, 2, 3]));
//!
//! let readers: Vec<_> = (0..4)
//!     .map(|_| {
//!         let config = Arc::clone(&config);
//!         thread::spawn(move || config.read().iter().sum::<i32>())
//!     })
//!     .collect();
//!
//! config.write().push(4);
//!
//! for r in readers {
//!     let sum = r.join().unwrap();
//!     assert!(sum == 6 || sum == 10);
//! }
//! assert_eq!(config.read().len(), 4);
//! ```
//!
//! # Choosing a policy
//!
//! Policies parse from strings, which suits configuration files and
//! command-line flags:
//!
//! ```
//! use turnstile_rwlock::Policy;
//!
//! assert_eq!("writer-priority".parse::<Policy>().unwrap(), Policy::WriterPriority);
//! assert_eq!("n-way:16".parse::<Policy>().unwrap(), Policy::NWay(16));
//! assert!("fastest".parse::<Policy>().is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod policy;
mod raw;
mod trace;

use core::cell::UnsafeCell;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

pub use policy::{Counters, ParsePolicyError, Policy, Wakeup};
pub use raw::RawFairRwLock;
pub use trace::init_tracing;

/// A reader/writer lock protecting a `T`.
///
/// [`read`](Self::read) and [`write`](Self::write) return guards that release
/// the lock when dropped. Acquisitions are not reentrant.
pub struct FairRwLock<T: ?Sized> {
    raw: RawFairRwLock,
    data: UnsafeCell<T>,
}

// Safety: the lock hands out `&mut T` to one thread at a time, which is
// sending `T` between threads.
unsafe impl<T: ?Sized + Send> Send for FairRwLock<T> {}
// Safety: readers share `&T` across threads, writers move `&mut T` across
// threads, both mediated by the raw lock.
unsafe impl<T: ?Sized + Send + Sync> Sync for FairRwLock<T> {}

impl<T> FairRwLock<T> {
    /// Creates an unlocked lock around `value`.
    pub fn new(policy: Policy, value: T) -> Self {
        Self {
            raw: RawFairRwLock::new(policy),
            data: UnsafeCell::new(value),
        }
    }

    /// Consumes the lock and returns the value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> FairRwLock<T> {
    /// Blocks until the policy admits a reader, then returns a shared guard.
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.raw.reader_lock();
        ReadGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Blocks until the policy admits a writer, then returns an exclusive
    /// guard.
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.raw.writer_lock();
        WriteGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Returns a shared guard if a reader would be admitted right now.
    pub fn try_read(&self) -> Option<ReadGuard<'_, T>> {
        self.raw.try_reader_lock().then(|| ReadGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Returns an exclusive guard if a writer would be admitted right now.
    pub fn try_write(&self) -> Option<WriteGuard<'_, T>> {
        self.raw.try_writer_lock().then(|| WriteGuard {
            lock: self,
            _not_send: PhantomData,
        })
    }

    /// Mutable access without locking; the borrow checker proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// The underlying lock, for counters and policy inspection.
    #[inline]
    pub fn raw(&self) -> &RawFairRwLock {
        &self.raw
    }

    /// The policy fixed at construction.
    #[inline]
    pub fn policy(&self) -> Policy {
        self.raw.policy()
    }
}

impl<T: Default> Default for FairRwLock<T> {
    /// An unlocked lock around `T::default()` using [`Policy::WriterPriority`].
    fn default() -> Self {
        Self::new(Policy::WriterPriority, T::default())
    }
}

/// Shows the policy and a counter snapshot, not the value: reading it would
/// take a hold and count toward the current N-way round.
impl<T: ?Sized> fmt::Debug for FairRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FairRwLock")
            .field("policy", &self.raw.policy())
            .field("counters", &self.raw.counters())
            .finish_non_exhaustive()
    }
}

/// Shared access to a [`FairRwLock`]'s value. Releases on drop.
///
/// Not `Send`: the hold belongs to the thread that took it.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ReadGuard<'a, T: ?Sized> {
    lock: &'a FairRwLock<T>,
    _not_send: PhantomData<*const ()>,
}

// Safety: sharing a read guard only shares `&T`.
unsafe impl<T: ?Sized + Sync> Sync for ReadGuard<'_, T> {}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: a read hold excludes every writer.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for ReadGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // Safety: this guard owns exactly one read hold.
        unsafe { self.lock.raw.reader_unlock() };
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for ReadGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// Exclusive access to a [`FairRwLock`]'s value. Releases on drop.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct WriteGuard<'a, T: ?Sized> {
    lock: &'a FairRwLock<T>,
    _not_send: PhantomData<*const ()>,
}

// Safety: sharing a write guard only shares `&T`.
unsafe impl<T: ?Sized + Sync> Sync for WriteGuard<'_, T> {}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // Safety: a write hold excludes every other holder.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // Safety: a write hold excludes every other holder.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T: ?Sized> Drop for WriteGuard<'_, T> {
    #[inline]
    fn drop(&mut self) {
        // Safety: this guard owns the write hold.
        unsafe { self.lock.raw.writer_unlock() };
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for WriteGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}
