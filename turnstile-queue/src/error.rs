//! Error types for queue operations.
//!
//! Every error produced by a push hands the rejected value back so the caller
//! can retry or clean it up.

use core::fmt;

/// Error returned by [`BoundedQueue::push`](crate::BoundedQueue::push) when the
/// queue has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    /// Returns the value that could not be pushed.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue closed")
    }
}

impl<T: fmt::Debug> std::error::Error for PushError<T> {}

/// Error returned by [`BoundedQueue::pop`](crate::BoundedQueue::pop) when the
/// queue has been closed and fully drained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopError;

impl fmt::Display for PopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue closed")
    }
}

impl std::error::Error for PopError {}

/// Error returned by [`BoundedQueue::try_push`](crate::BoundedQueue::try_push).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPushError<T> {
    /// Every slot is filled.
    Full(T),

    /// The queue has been closed.
    Closed(T),
}

impl<T> TryPushError<T> {
    /// Returns the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(v) | TryPushError::Closed(v) => v,
        }
    }

    /// Returns `true` if this error is the `Full` variant.
    pub fn is_full(&self) -> bool {
        matches!(self, TryPushError::Full(_))
    }

    /// Returns `true` if this error is the `Closed` variant.
    pub fn is_closed(&self) -> bool {
        matches!(self, TryPushError::Closed(_))
    }
}

impl<T> fmt::Display for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => write!(f, "queue full"),
            TryPushError::Closed(_) => write!(f, "queue closed"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TryPushError<T> {}

/// Error returned by [`BoundedQueue::try_pop`](crate::BoundedQueue::try_pop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryPopError {
    /// No slot is filled, but the queue is still open.
    Empty,

    /// The queue has been closed and no values remain.
    Closed,
}

impl TryPopError {
    /// Returns `true` if this error is the `Empty` variant.
    pub fn is_empty(&self) -> bool {
        matches!(self, TryPopError::Empty)
    }

    /// Returns `true` if this error is the `Closed` variant.
    pub fn is_closed(&self) -> bool {
        matches!(self, TryPopError::Closed)
    }
}

impl fmt::Display for TryPopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPopError::Empty => write!(f, "queue empty"),
            TryPopError::Closed => write!(f, "queue closed"),
        }
    }
}

impl std::error::Error for TryPopError {}

/// Error returned by [`BoundedQueue::push_timeout`](crate::BoundedQueue::push_timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTimeoutError<T> {
    /// No slot freed up before the timeout elapsed.
    Timeout(T),

    /// The queue has been closed.
    Closed(T),
}

impl<T> PushTimeoutError<T> {
    /// Returns the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            PushTimeoutError::Timeout(v) | PushTimeoutError::Closed(v) => v,
        }
    }

    /// Returns `true` if this error is the `Timeout` variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PushTimeoutError::Timeout(_))
    }

    /// Returns `true` if this error is the `Closed` variant.
    pub fn is_closed(&self) -> bool {
        matches!(self, PushTimeoutError::Closed(_))
    }
}

impl<T> fmt::Display for PushTimeoutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushTimeoutError::Timeout(_) => write!(f, "timed out waiting for a free slot"),
            PushTimeoutError::Closed(_) => write!(f, "queue closed"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for PushTimeoutError<T> {}

/// Error returned by [`BoundedQueue::pop_timeout`](crate::BoundedQueue::pop_timeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopTimeoutError {
    /// No value arrived before the timeout elapsed.
    Timeout,

    /// The queue has been closed and no values remain.
    Closed,
}

impl PopTimeoutError {
    /// Returns `true` if this error is the `Timeout` variant.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PopTimeoutError::Timeout)
    }

    /// Returns `true` if this error is the `Closed` variant.
    pub fn is_closed(&self) -> bool {
        matches!(self, PopTimeoutError::Closed)
    }
}

impl fmt::Display for PopTimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopTimeoutError::Timeout => write!(f, "timed out waiting for a value"),
            PopTimeoutError::Closed => write!(f, "queue closed"),
        }
    }
}

impl std::error::Error for PopTimeoutError {}
