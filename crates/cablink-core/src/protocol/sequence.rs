//! Thread-safe request id counter.
//!
//! Every request a category sends is stamped with a request id, and the
//! manager echoes it in the response.  Id 0 is reserved for events, so the
//! counter starts at 1 and skips 0 when it wraps.
//!
//! # Thread safety
//!
//! The counter uses `AtomicU32` internally, so a category can be shared
//! between the host thread and the transport receive thread without a lock.

use std::sync::atomic::{AtomicU32, Ordering};

/// A thread-safe, monotonically increasing request id generator.
///
/// # Examples
///
/// ```rust
/// use cablink_core::protocol::SequenceCounter;
///
/// let counter = SequenceCounter::new();
/// assert_eq!(counter.next(), 1);
/// assert_eq!(counter.next(), 2);
/// ```
pub struct SequenceCounter {
    inner: AtomicU32,
}

impl SequenceCounter {
    /// Creates a new counter whose first id is 1.
    pub fn new() -> Self {
        Self {
            inner: AtomicU32::new(1),
        }
    }

    /// Returns the next request id, never 0.
    ///
    /// `Ordering::Relaxed` is sufficient: ids only need to be distinct, they
    /// do not publish any other memory.
    pub fn next(&self) -> u32 {
        loop {
            let id = self.inner.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    /// Returns the id the next call to [`next`](Self::next) will hand out
    /// (barring wrap-around), without incrementing.
    pub fn current(&self) -> u32 {
        self.inner.load(Ordering::Relaxed)
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
