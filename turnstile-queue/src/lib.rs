//! A bounded blocking MPMC queue with backpressure.
//!
//! [`BoundedQueue`] is a fixed-capacity circular buffer shared by any number
//! of producer and consumer threads. A full queue blocks producers, an empty
//! queue blocks consumers, and values come out in the order they went in.
//!
//! # Structure
//!
//! ```text
//!            empty_slots (permits = free slots)
//!                 │
//!  push() ── acquire ──► [ ring: head ... tail ] ──► release ── filled_slots
//!                          (mutex guards indices)
//!  pop()  ── acquire filled_slots ──► take at head ──► release empty_slots
//! ```
//!
//! The two counting permits make a push wait for room and a pop wait for
//! data; the ring's mutex only serializes the index updates. A push can never
//! overwrite an unread slot and a pop can never read an empty one, however
//! many threads race.
//!
//! # Blocking Strategy
//!
//! A blocked operation escalates in three phases before sleeping:
//!
//! ```text
//! Phase 1: Fast path            permit already available
//! Phase 2: Backoff              crossbeam Backoff::snooze(), `snooze_iters` rounds
//! Phase 3: Park                 condvar wait until a peer releases a permit
//! ```
//!
//! Releasing a permit only issues a wakeup when a thread actually parked.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use turnstile_queue::BoundedQueue;
//!
//! let queue = Arc::new(BoundedQueue::<u64>::new(4));
//!
//! let producer = {
//!     let queue = Arc::clone(&queue);
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             queue.push(i).unwrap(); // blocks while full
//!         }
//!     })
//! };
//!
//! let mut sum = 0;
//! for _ in 0..100 {
//!     sum += queue.pop().unwrap(); // blocks while empty
//! }
//! producer.join().unwrap();
//! assert_eq!(sum, 99 * 100 / 2);
//! ```
//!
//! # Closing
//!
//! [`close`](BoundedQueue::close) invalidates the queue: pushes fail
//! immediately and hand the value back, pops drain what is left and then
//! fail. Threads blocked in either operation are woken.
//!
//! ```
//! use turnstile_queue::{BoundedQueue, PushError};
//!
//! let queue = BoundedQueue::new(2);
//! queue.push("a").unwrap();
//! queue.close();
//!
//! assert_eq!(queue.push("b"), Err(PushError("b")));
//! assert_eq!(queue.pop(), Ok("a"));
//! assert!(queue.pop().is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod semaphore;
mod trace;

use core::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

use semaphore::{Denied, Semaphore};
use trace::debug;

pub use error::{PopError, PopTimeoutError, PushError, PushTimeoutError, TryPopError, TryPushError};
pub use trace::init_tracing;

/// Default number of backoff snooze iterations before parking.
pub const DEFAULT_SNOOZE_ITERS: usize = 8;

/// The circular buffer. Only ever touched under its mutex.
struct Ring<T> {
    slots: Box<[Option<T>]>,
    /// Next slot to pop.
    head: usize,
    /// Next slot to push.
    tail: usize,
    len: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    #[inline]
    fn write(&mut self, value: T) {
        let slot = &mut self.slots[self.tail];
        debug_assert!(slot.is_none(), "push overwrote an unread slot");
        *slot = Some(value);
        self.tail = (self.tail + 1) % self.slots.len();
        self.len += 1;
    }

    #[inline]
    fn take(&mut self) -> T {
        let value = self.slots[self.head]
            .take()
            .unwrap_or_else(|| unreachable!("filled-slot permit held for an empty slot"));
        self.head = (self.head + 1) % self.slots.len();
        self.len -= 1;
        value
    }
}

/// A fixed-capacity, blocking, multi-producer multi-consumer FIFO queue.
///
/// All operations take `&self`; share the queue between threads with an
/// [`Arc`](std::sync::Arc) or scoped borrows. Values still buffered when the
/// queue is dropped are dropped with it.
///
/// # Example
///
/// ```
/// use turnstile_queue::BoundedQueue;
///
/// let queue = BoundedQueue::new(2);
/// queue.push('A').unwrap();
/// queue.push('B').unwrap();
/// assert!(queue.is_full());
///
/// assert_eq!(queue.pop().unwrap(), 'A');
/// assert_eq!(queue.pop().unwrap(), 'B');
/// ```
pub struct BoundedQueue<T> {
    ring: CachePadded<Mutex<Ring<T>>>,
    /// Producers contend here.
    empty_slots: CachePadded<Semaphore>,
    /// Consumers contend here.
    filled_slots: CachePadded<Semaphore>,
    closed: AtomicBool,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates a queue holding at most `capacity` values.
    ///
    /// Uses default backoff settings (8 snooze iterations before parking).
    /// For custom backoff tuning, use [`with_config`](Self::with_config).
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(capacity, DEFAULT_SNOOZE_ITERS)
    }

    /// Creates a queue with custom backoff configuration.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of values the queue can hold (exact, not rounded)
    /// * `snooze_iters` - Backoff iterations before a blocked operation parks.
    ///   Higher values burn more CPU but react faster to bursty peers.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    ///
    /// # Example
    ///
    /// ```
    /// use turnstile_queue::BoundedQueue;
    ///
    /// // Park almost immediately: suits mostly-idle queues.
    /// let queue = BoundedQueue::<u64>::with_config(1024, 1);
    /// assert_eq!(queue.capacity(), 1024);
    /// ```
    pub fn with_config(capacity: usize, snooze_iters: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");

        Self {
            ring: CachePadded::new(Mutex::new(Ring::with_capacity(capacity))),
            empty_slots: CachePadded::new(Semaphore::new(capacity, snooze_iters)),
            filled_slots: CachePadded::new(Semaphore::new(0, snooze_iters)),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    /// Pushes a value at the tail, blocking while the queue is full.
    ///
    /// Returns `Err(PushError(value))` without blocking if the queue is
    /// closed, and also when a close arrives while this call is blocked. A
    /// push that races with [`close`](Self::close) either fails and hands the
    /// value back, or lands before the close takes effect; consumers
    /// drain it like any other value.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use std::thread;
    /// use turnstile_queue::BoundedQueue;
    ///
    /// let queue = Arc::new(BoundedQueue::new(1));
    /// queue.push(1).unwrap();
    ///
    /// let q = Arc::clone(&queue);
    /// let blocked = thread::spawn(move || q.push(2)); // waits for room
    ///
    /// assert_eq!(queue.pop().unwrap(), 1);
    /// blocked.join().unwrap().unwrap();
    /// assert_eq!(queue.pop().unwrap(), 2);
    /// ```
    pub fn push(&self, value: T) -> Result<(), PushError<T>> {
        if self.is_closed() {
            return Err(PushError(value));
        }

        match self.empty_slots.acquire() {
            Ok(()) => self.commit_push(value).map_err(PushError),
            Err(_) => Err(PushError(value)),
        }
    }

    /// Pops the value at the head, blocking while the queue is empty.
    ///
    /// Returns `Err(PopError)` once the queue is closed and drained.
    pub fn pop(&self) -> Result<T, PopError> {
        match self.filled_slots.acquire() {
            Ok(()) => Ok(self.commit_pop()),
            Err(_) => Err(PopError),
        }
    }

    /// Attempts to push without blocking.
    ///
    /// # Errors
    ///
    /// - `TryPushError::Full(value)` if every slot is filled
    /// - `TryPushError::Closed(value)` if the queue is closed
    ///
    /// # Example
    ///
    /// ```
    /// use turnstile_queue::{BoundedQueue, TryPushError};
    ///
    /// let queue = BoundedQueue::new(1);
    /// assert!(queue.try_push(1).is_ok());
    /// assert_eq!(queue.try_push(2), Err(TryPushError::Full(2)));
    ///
    /// queue.close();
    /// assert_eq!(queue.try_push(3), Err(TryPushError::Closed(3)));
    /// ```
    pub fn try_push(&self, value: T) -> Result<(), TryPushError<T>> {
        if self.is_closed() {
            return Err(TryPushError::Closed(value));
        }

        match self.empty_slots.try_acquire() {
            Ok(()) => self.commit_push(value).map_err(TryPushError::Closed),
            Err(Denied::Closed) => Err(TryPushError::Closed(value)),
            Err(_) => Err(TryPushError::Full(value)),
        }
    }

    /// Attempts to pop without blocking.
    ///
    /// # Errors
    ///
    /// - `TryPopError::Empty` if nothing is buffered
    /// - `TryPopError::Closed` if the queue is closed and drained
    pub fn try_pop(&self) -> Result<T, TryPopError> {
        match self.filled_slots.try_acquire() {
            Ok(()) => Ok(self.commit_pop()),
            Err(Denied::Closed) => Err(TryPopError::Closed),
            Err(_) => Err(TryPopError::Empty),
        }
    }

    /// Pushes a value, waiting at most `timeout` for a free slot.
    ///
    /// # Errors
    ///
    /// - `PushTimeoutError::Timeout(value)` if no slot freed up in time
    /// - `PushTimeoutError::Closed(value)` if the queue is or becomes closed
    pub fn push_timeout(&self, value: T, timeout: Duration) -> Result<(), PushTimeoutError<T>> {
        if self.is_closed() {
            return Err(PushTimeoutError::Closed(value));
        }

        match self.empty_slots.acquire_until(Some(Instant::now() + timeout)) {
            Ok(()) => self.commit_push(value).map_err(PushTimeoutError::Closed),
            Err(Denied::Closed) => Err(PushTimeoutError::Closed(value)),
            Err(_) => Err(PushTimeoutError::Timeout(value)),
        }
    }

    /// Pops a value, waiting at most `timeout` for one to arrive.
    ///
    /// # Errors
    ///
    /// - `PopTimeoutError::Timeout` if nothing arrived in time
    /// - `PopTimeoutError::Closed` if the queue is closed and drained
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use turnstile_queue::{BoundedQueue, PopTimeoutError};
    ///
    /// let queue = BoundedQueue::<u32>::new(4);
    /// assert_eq!(
    ///     queue.pop_timeout(Duration::from_millis(5)),
    ///     Err(PopTimeoutError::Timeout)
    /// );
    /// ```
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopTimeoutError> {
        match self.filled_slots.acquire_until(Some(Instant::now() + timeout)) {
            Ok(()) => Ok(self.commit_pop()),
            Err(Denied::Closed) => Err(PopTimeoutError::Closed),
            Err(_) => Err(PopTimeoutError::Timeout),
        }
    }

    /// Closes the queue and wakes every blocked producer and consumer.
    ///
    /// Idempotent. Values already buffered can still be popped.
    pub fn close(&self) {
        {
            // Under the ring lock so no push can publish after consumers
            // have been told the queue is drained.
            let _ring = self.ring.lock();
            if !self.closed.swap(true, Ordering::AcqRel) {
                debug!(capacity = self.capacity, "queue closed");
            }
            self.filled_slots.close();
        }
        self.empty_slots.close();
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns the fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of buffered values.
    ///
    /// A snapshot: concurrent pushes and pops may change it immediately.
    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if every slot is filled.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Writes into the slot whose `empty_slots` permit the caller holds.
    ///
    /// Publishing the value and checking `closed` happen under the ring lock,
    /// the same lock `close` holds while closing `filled_slots`. Once closed,
    /// the permit goes back and the value is returned.
    #[inline]
    fn commit_push(&self, value: T) -> Result<(), T> {
        let mut ring = self.ring.lock();
        if self.closed.load(Ordering::Acquire) {
            drop(ring);
            self.empty_slots.release();
            return Err(value);
        }

        ring.write(value);
        self.filled_slots.release();
        Ok(())
    }

    /// Takes from the slot whose `filled_slots` permit the caller holds.
    #[inline]
    fn commit_pop(&self) -> T {
        let value = self.ring.lock().take();
        self.empty_slots.release();
        value
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedQueue")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .field("blocked_producers", &self.empty_slots.sleepers())
            .field("blocked_consumers", &self.filled_slots.sleepers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    // ============================================================================
    // Basic Operations
    // ============================================================================

    #[test]
    fn basic_push_pop() {
        let queue = BoundedQueue::<u64>::new(4);

        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.push(3).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap(), 1);
        assert_eq!(queue.pop().unwrap(), 2);
        assert_eq!(queue.pop().unwrap(), 3);
        assert!(queue.is_empty());
    }

    #[test]
    fn try_push_try_pop() {
        let queue = BoundedQueue::<u64>::new(2);

        assert!(queue.try_push(1).is_ok());
        assert!(queue.try_push(2).is_ok());
        assert!(matches!(queue.try_push(3), Err(TryPushError::Full(3))));

        assert_eq!(queue.try_pop().unwrap(), 1);
        assert_eq!(queue.try_pop().unwrap(), 2);
        assert!(matches!(queue.try_pop(), Err(TryPopError::Empty)));
    }

    #[test]
    fn capacity_is_exact() {
        let queue = BoundedQueue::<u8>::new(3);
        assert_eq!(queue.capacity(), 3);

        for i in 0..3 {
            queue.try_push(i).unwrap();
        }
        assert!(queue.is_full());
        assert!(queue.try_push(9).unwrap_err().is_full());
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn zero_capacity_panics() {
        let _ = BoundedQueue::<u64>::new(0);
    }

    // ============================================================================
    // FIFO Ordering
    // ============================================================================

    #[test]
    fn fifo_up_to_capacity() {
        for capacity in 1..=16usize {
            let queue = BoundedQueue::new(capacity);

            for i in 0..capacity {
                queue.push(i).unwrap();
            }
            for i in 0..capacity {
                assert_eq!(queue.pop().unwrap(), i);
            }
        }
    }

    #[test]
    fn fifo_across_many_laps() {
        let queue = BoundedQueue::<u64>::new(3);

        // 1000 values through 3 slots
        for i in 0..1000 {
            queue.push(i).unwrap();
            assert_eq!(queue.pop().unwrap(), i);
        }
    }

    #[test]
    fn fifo_ordering_cross_thread() {
        let queue = Arc::new(BoundedQueue::<u64>::new(7));
        let q = Arc::clone(&queue);

        let handle = thread::spawn(move || {
            let mut expected = 0u64;
            while expected < 10_000 {
                let val = q.pop().unwrap();
                assert_eq!(val, expected, "FIFO order violated");
                expected += 1;
            }
        });

        for i in 0..10_000 {
            queue.push(i).unwrap();
        }

        handle.join().unwrap();
    }

    // ============================================================================
    // Blocking Behavior
    // ============================================================================

    #[test]
    fn pop_blocks_until_push() {
        let queue = Arc::new(BoundedQueue::<u64>::new(4));
        let q = Arc::clone(&queue);

        let start = Instant::now();
        let handle = thread::spawn(move || q.pop().unwrap());

        thread::sleep(Duration::from_millis(50));
        queue.push(42).unwrap();

        assert_eq!(handle.join().unwrap(), 42);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn push_blocks_until_pop() {
        let queue = Arc::new(BoundedQueue::<u64>::new(2));
        queue.try_push(1).unwrap();
        queue.try_push(2).unwrap();

        let q = Arc::clone(&queue);
        let start = Instant::now();
        let handle = thread::spawn(move || q.push(3).unwrap());

        thread::sleep(Duration::from_millis(50));
        assert!(!handle.is_finished());
        assert_eq!(queue.pop().unwrap(), 1);

        handle.join().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(queue.pop().unwrap(), 2);
        assert_eq!(queue.pop().unwrap(), 3);
    }

    #[test]
    fn capacity_two_scenario() {
        let queue = Arc::new(BoundedQueue::new(2));

        queue.push('A').unwrap();
        queue.push('B').unwrap();

        let q = Arc::clone(&queue);
        let blocked = thread::spawn(move || q.push('C'));

        thread::sleep(Duration::from_millis(50));
        assert!(!blocked.is_finished(), "push into a full queue must block");

        assert_eq!(queue.pop(), Ok('A'));
        assert_eq!(blocked.join().unwrap(), Ok(()));

        assert_eq!(queue.pop(), Ok('B'));
        assert_eq!(queue.pop(), Ok('C'));
        assert!(queue.is_empty());
    }

    #[test]
    fn no_overrun_with_one_extra_producer() {
        const CAPACITY: usize = 4;

        let queue = Arc::new(BoundedQueue::<usize>::new(CAPACITY));
        let done = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..=CAPACITY)
            .map(|i| {
                let queue = Arc::clone(&queue);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    queue.push(i).unwrap();
                    done.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(done.load(Ordering::SeqCst), CAPACITY);
        assert_eq!(queue.len(), CAPACITY);

        queue.pop().unwrap();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(done.load(Ordering::SeqCst), CAPACITY + 1);
        assert_eq!(queue.len(), CAPACITY);
    }

    // ============================================================================
    // Timeouts
    // ============================================================================

    #[test]
    fn push_timeout_on_full_queue() {
        let queue = BoundedQueue::<u64>::new(1);
        queue.push(1).unwrap();

        let start = Instant::now();
        let err = queue.push_timeout(2, Duration::from_millis(20)).unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.into_inner(), 2);
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pop_timeout_receives_late_value() {
        let queue = Arc::new(BoundedQueue::<u64>::new(1));
        let q = Arc::clone(&queue);

        let handle = thread::spawn(move || q.pop_timeout(Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(20));
        queue.push(7).unwrap();

        assert_eq!(handle.join().unwrap(), Ok(7));
    }

    #[test]
    fn timed_out_pop_does_not_consume_later_value() {
        let queue = BoundedQueue::<u64>::new(1);

        assert_eq!(
            queue.pop_timeout(Duration::from_millis(5)),
            Err(PopTimeoutError::Timeout)
        );

        queue.push(5).unwrap();
        assert_eq!(queue.pop().unwrap(), 5);
    }

    // ============================================================================
    // Close
    // ============================================================================

    #[test]
    fn push_fails_immediately_after_close() {
        let queue = BoundedQueue::<String>::new(4);
        queue.close();

        let err = queue.push("hello".to_string()).unwrap_err();
        assert_eq!(err.into_inner(), "hello");
        assert!(queue.try_push("x".to_string()).unwrap_err().is_closed());
        assert!(
            queue
                .push_timeout("y".to_string(), Duration::from_secs(1))
                .unwrap_err()
                .is_closed()
        );
    }

    #[test]
    fn pop_drains_before_failing_after_close() {
        let queue = BoundedQueue::<u64>::new(4);
        queue.push(1).unwrap();
        queue.push(2).unwrap();
        queue.close();

        assert_eq!(queue.pop().unwrap(), 1);
        assert_eq!(queue.try_pop().unwrap(), 2);
        assert_eq!(queue.pop(), Err(PopError));
        assert_eq!(queue.try_pop(), Err(TryPopError::Closed));
        assert_eq!(
            queue.pop_timeout(Duration::from_secs(1)),
            Err(PopTimeoutError::Closed)
        );
    }

    #[test]
    fn close_wakes_blocked_consumers() {
        let queue = Arc::new(BoundedQueue::<u64>::new(2));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let q = Arc::clone(&queue);
                thread::spawn(move || q.pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();

        for h in handles {
            assert_eq!(h.join().unwrap(), Err(PopError));
        }
    }

    #[test]
    fn close_wakes_blocked_producers() {
        let queue = Arc::new(BoundedQueue::<u64>::new(1));
        queue.push(0).unwrap();

        let handles: Vec<_> = (1..=3)
            .map(|i| {
                let q = Arc::clone(&queue);
                thread::spawn(move || q.push(i))
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();

        for (i, h) in (1..=3).zip(handles) {
            assert_eq!(h.join().unwrap(), Err(PushError(i)));
        }
        assert_eq!(queue.pop().unwrap(), 0);
    }

    #[test]
    fn close_is_idempotent() {
        let queue = BoundedQueue::<u64>::new(1);
        queue.close();
        queue.close();
        assert!(queue.is_closed());
    }

    #[test]
    fn push_holding_permit_when_close_lands_gets_value_back() {
        let queue = BoundedQueue::<u64>::new(2);

        // Producer is past the `is_closed` check and holds a slot permit.
        queue.empty_slots.acquire().unwrap();
        queue.close();

        assert_eq!(queue.commit_push(9), Err(9));
        assert_eq!(queue.empty_slots.available(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.pop(), Err(PopError));
    }

    #[test]
    fn close_racing_push_never_strands_a_value() {
        const ROUNDS: usize = 2_000;

        for _ in 0..ROUNDS {
            let queue = Arc::new(BoundedQueue::<u64>::with_config(4, 0));
            let start = Arc::new(Barrier::new(3));

            let producer = {
                let queue = Arc::clone(&queue);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    queue.push(7).is_ok()
                })
            };

            let consumer = {
                let queue = Arc::clone(&queue);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    let mut popped = 0;
                    while queue.pop().is_ok() {
                        popped += 1;
                    }
                    popped
                })
            };

            start.wait();
            queue.close();

            let pushed = usize::from(producer.join().unwrap());
            let popped = consumer.join().unwrap();
            assert_eq!(pushed, popped, "accepted push never reached a consumer");
            assert!(queue.is_empty());
        }
    }

    // ============================================================================
    // Drop Behavior
    // ============================================================================

    #[test]
    fn values_dropped_with_queue() {
        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        #[derive(Debug)]
        struct DropCounter;
        impl Drop for DropCounter {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);

        let queue = BoundedQueue::new(4);
        queue.push(DropCounter).unwrap();
        queue.push(DropCounter).unwrap();
        queue.push(DropCounter).unwrap();
        drop(queue.pop().unwrap());

        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 1);

        drop(queue);

        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn zero_sized_type() {
        let queue = BoundedQueue::<()>::new(2);

        queue.push(()).unwrap();
        queue.push(()).unwrap();

        assert_eq!(queue.pop().unwrap(), ());
        assert_eq!(queue.pop().unwrap(), ());
    }

    #[test]
    fn debug_reports_state() {
        let queue = BoundedQueue::<u64>::new(3);
        queue.push(1).unwrap();

        let s = format!("{queue:?}");
        assert!(s.contains("capacity: 3"));
        assert!(s.contains("len: 1"));
        assert!(s.contains("closed: false"));
    }

    // ============================================================================
    // Multi-Producer / Multi-Consumer Stress
    // ============================================================================

    #[test]
    fn stress_mpmc_sum() {
        const PRODUCERS: u64 = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: u64 = 10_000;

        let queue = Arc::new(BoundedQueue::<u64>::new(8));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push(p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut sum = 0u64;
                    let mut count = 0u64;
                    while let Ok(v) = queue.pop() {
                        sum += v;
                        count += 1;
                    }
                    (sum, count)
                })
            })
            .collect();

        for h in producers {
            h.join().unwrap();
        }
        // Producers are done; let consumers drain and exit.
        queue.close();

        let (sum, count) = consumers
            .into_iter()
            .map(|h| h.join().unwrap())
            .fold((0, 0), |(s, c), (s2, c2)| (s + s2, c + c2));

        let total = PRODUCERS * PER_PRODUCER;
        assert_eq!(count, total);
        assert_eq!(sum, total * (total - 1) / 2);
    }

    #[test]
    fn stress_capacity_one_per_producer_order() {
        const PRODUCERS: u64 = 3;
        const PER_PRODUCER: u64 = 5_000;

        let queue = Arc::new(BoundedQueue::<(u64, u64)>::new(1));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push((p, i)).unwrap();
                    }
                })
            })
            .collect();

        // A single consumer sees each producer's values in the order it pushed them.
        let mut next = [0u64; PRODUCERS as usize];
        for _ in 0..PRODUCERS * PER_PRODUCER {
            let (p, i) = queue.pop().unwrap();
            assert_eq!(next[p as usize], i, "producer {p} reordered");
            next[p as usize] += 1;
        }

        for h in producers {
            h.join().unwrap();
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn no_deadlock_with_zero_snooze() {
        let queue = Arc::new(BoundedQueue::<u64>::with_config(1, 0));
        let q = Arc::clone(&queue);

        let producer = thread::spawn(move || {
            for i in 0..10_000 {
                q.push(i).unwrap();
            }
        });

        for i in 0..10_000 {
            assert_eq!(queue.pop().unwrap(), i);
        }

        producer.join().unwrap();
    }

    #[test]
    fn completes_in_reasonable_time() {
        use std::sync::mpsc;

        let (done_tx, done_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let queue = Arc::new(BoundedQueue::<u64>::new(1));
            let q = Arc::clone(&queue);

            let h = thread::spawn(move || {
                for i in 0..1000 {
                    q.push(i).unwrap();
                }
            });

            for _ in 0..1000 {
                queue.pop().unwrap();
            }

            h.join().unwrap();
            done_tx.send(()).unwrap();
        });

        let result = done_rx.recv_timeout(Duration::from_secs(5));
        assert!(result.is_ok(), "Test timed out - possible deadlock!");

        handle.join().unwrap();
    }
}
