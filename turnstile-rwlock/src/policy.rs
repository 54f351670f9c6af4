//! Fairness policies as pure functions of the lock's counters.
//!
//! Nothing in here blocks. [`RawFairRwLock`](crate::RawFairRwLock) holds its
//! guard, asks the policy whether a thread must wait or whom an unlock should
//! wake, and acts on the answer. Keeping the decisions pure lets the state
//! machine be driven and checked without threads.

use core::fmt;
use core::str::FromStr;

/// Snapshot of every counter the lock maintains.
///
/// `waiting_*` count threads inside `*_lock` that have not yet become active,
/// whether parked or just woken. `reads_done` counts reader releases since the
/// last writer release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Counters {
    /// Threads holding the lock shared.
    pub active_readers: u32,
    /// Threads holding the lock exclusively (0 or 1).
    pub active_writers: u32,
    /// Readers blocked in `reader_lock`.
    pub waiting_readers: u32,
    /// Writers blocked in `writer_lock`.
    pub waiting_writers: u32,
    /// Reader releases since the last writer release.
    pub reads_done: u32,
}

impl Counters {
    /// Returns `true` if the mutual-exclusion invariant holds: at most one
    /// writer, and never a writer alongside readers.
    #[inline]
    pub const fn is_consistent(&self) -> bool {
        self.active_writers <= 1 && (self.active_writers == 0 || self.active_readers == 0)
    }

    /// Returns `true` if nobody holds or waits for the lock.
    #[inline]
    pub const fn is_idle(&self) -> bool {
        self.active_readers == 0
            && self.active_writers == 0
            && self.waiting_readers == 0
            && self.waiting_writers == 0
    }
}

/// Who an unlock should wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wakeup {
    /// Nobody.
    None,
    /// Signal a single waiting writer.
    OneWriter,
    /// Broadcast to every waiting reader; each re-tests its predicate.
    AllReaders,
}

/// Arbitration between readers and writers, fixed at construction.
///
/// | Policy | Readers wait while | Writers wait while |
/// |--------|--------------------|--------------------|
/// | `ReaderPriority` | a writer is active | any reader active or waiting, or a writer active |
/// | `WriterPriority` | a writer is active or waiting | a reader or writer is active |
/// | `NWay(n)` | a writer is active, or one waits and `n` readers were admitted this round | the lock is held, or readers wait and the round is not over |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    /// Readers go first whenever no writer holds the lock. Writers can starve
    /// while readers keep arriving.
    ReaderPriority,
    /// A waiting writer stops new readers from entering. Readers can starve
    /// while writers keep arriving.
    WriterPriority,
    /// Bounded alternation: while a writer waits, at most `n` readers are
    /// admitted before the writer gets its turn. `NWay(0)` admits no readers
    /// while a writer waits.
    NWay(u32),
}

impl Policy {
    /// Shorthand for [`Policy::NWay`].
    #[inline]
    pub const fn n_way(n: u32) -> Self {
        Self::NWay(n)
    }

    /// Reader admission quota per writer turn, if this is an N-way policy.
    #[inline]
    pub const fn quota(self) -> Option<u32> {
        match self {
            Self::NWay(n) => Some(n),
            _ => None,
        }
    }

    /// Whether a reader observing `c` must keep waiting.
    pub fn reader_must_wait(self, c: &Counters) -> bool {
        match self {
            Self::ReaderPriority => c.active_writers > 0,
            Self::WriterPriority => c.active_writers > 0 || c.waiting_writers > 0,
            Self::NWay(n) => {
                if c.active_writers == 0 && c.waiting_writers == 0 {
                    false
                } else {
                    c.active_writers > 0 || (c.waiting_writers > 0 && round_closed(c, n))
                }
            }
        }
    }

    /// Whether a writer observing `c` must keep waiting.
    pub fn writer_must_wait(self, c: &Counters) -> bool {
        match self {
            Self::ReaderPriority => {
                c.active_readers > 0 || c.waiting_readers > 0 || c.active_writers > 0
            }
            Self::WriterPriority => c.active_writers > 0 || c.active_readers > 0,
            Self::NWay(n) => {
                if c.waiting_readers == 0 && c.active_readers == 0 && c.active_writers == 0 {
                    false
                } else {
                    c.active_writers > 0 || c.active_readers > 0 || !round_closed(c, n)
                }
            }
        }
    }

    /// Wakeup owed after a reader released; `c` is already updated.
    pub fn after_reader_release(self, c: &Counters) -> Wakeup {
        match self {
            Self::ReaderPriority => {
                if c.waiting_readers > 0 {
                    Wakeup::AllReaders
                } else if c.active_readers == 0 {
                    Wakeup::OneWriter
                } else {
                    Wakeup::None
                }
            }
            Self::WriterPriority => {
                if c.waiting_writers > 0 && c.active_readers == 0 {
                    Wakeup::OneWriter
                } else if c.active_writers == 0 && c.waiting_writers == 0 {
                    Wakeup::AllReaders
                } else {
                    Wakeup::None
                }
            }
            Self::NWay(n) => {
                if at_quota(c.reads_done, 0, n) || c.active_readers + c.waiting_readers == 0 {
                    Wakeup::OneWriter
                } else {
                    Wakeup::AllReaders
                }
            }
        }
    }

    /// Wakeup owed after a writer released; `c` is already updated.
    pub fn after_writer_release(self, c: &Counters) -> Wakeup {
        match self {
            Self::ReaderPriority => {
                if c.active_readers == 0 && c.waiting_readers == 0 {
                    Wakeup::OneWriter
                } else if c.waiting_readers > 0 {
                    Wakeup::AllReaders
                } else {
                    Wakeup::None
                }
            }
            Self::WriterPriority => {
                if c.active_readers == 0 && c.waiting_writers > 0 {
                    Wakeup::OneWriter
                } else if c.waiting_writers == 0 {
                    Wakeup::AllReaders
                } else {
                    Wakeup::None
                }
            }
            Self::NWay(_) => {
                // Broadcasting readers that would all re-block strands the
                // waiting writer; that only happens for NWay(0).
                if c.waiting_readers > 0 && !self.reader_must_wait(c) {
                    Wakeup::AllReaders
                } else if c.waiting_writers > 0 && !self.writer_must_wait(c) {
                    Wakeup::OneWriter
                } else {
                    Wakeup::None
                }
            }
        }
    }
}

/// The current reader round has used up its quota of `n` admissions.
#[inline]
fn round_closed(c: &Counters, n: u32) -> bool {
    at_quota(c.reads_done, c.active_readers, n)
}

/// `(done + active) mod (n + 1) == n`, computed without overflow.
#[inline]
fn at_quota(done: u32, active: u32, n: u32) -> bool {
    let admitted = u64::from(done) + u64::from(active);
    admitted % (u64::from(n) + 1) == u64::from(n)
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReaderPriority => write!(f, "reader-priority"),
            Self::WriterPriority => write!(f, "writer-priority"),
            Self::NWay(n) => write!(f, "n-way:{n}"),
        }
    }
}

/// Error returned when parsing a [`Policy`] from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePolicyError {
    input: String,
}

impl ParsePolicyError {
    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl fmt::Display for ParsePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown rwlock policy '{}' (expected reader, writer or nway:<n>)",
            self.input
        )
    }
}

impl std::error::Error for ParsePolicyError {}

impl FromStr for Policy {
    type Err = ParsePolicyError;

    /// Accepts `reader`, `writer`, `nway:<n>` and the long forms
    /// `reader-priority`, `writer-priority`, `n-way:<n>`, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePolicyError {
            input: s.to_string(),
        };
        let lower = s.trim().to_ascii_lowercase();

        match lower.as_str() {
            "reader" | "readers" | "reader-priority" => Ok(Self::ReaderPriority),
            "writer" | "writers" | "writer-priority" => Ok(Self::WriterPriority),
            other => {
                let (kind, n) = other.split_once(':').ok_or_else(err)?;
                if !matches!(kind, "nway" | "n-way" | "n_way") {
                    return Err(err());
                }
                n.trim().parse::<u32>().map(Self::NWay).map_err(|_| err())
            }
        }
    }
}
