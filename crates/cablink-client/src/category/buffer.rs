//! Producer/consumer event buffer with a non-blocking drain.
//!
//! The transport thread pushes (always blocking briefly for the lock, never
//! dropping); the host thread drains once per tick with a try-lock and skips
//! the tick if the lock is contended.  The drain swaps the whole backlog out
//! and releases the lock before any event is processed.

use std::sync::Mutex;

use crate::fault::{lock, try_lock};

#[derive(Debug)]
pub struct EventBuffer<E> {
    pending: Mutex<Vec<E>>,
}

impl<E> Default for EventBuffer<E> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }
}

impl<E> EventBuffer<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.  Blocks only for the duration of the push.
    pub fn push(&self, event: E) {
        lock(&self.pending).push(event);
    }

    /// Takes the whole backlog in FIFO order, or `None` if the producer holds
    /// the lock right now.
    pub fn try_drain(&self) -> Option<Vec<E>> {
        let mut guard = try_lock(&self.pending)?;
        Some(std::mem::take(&mut *guard))
    }

    /// Discards everything buffered.
    pub fn clear(&self) {
        lock(&self.pending).clear();
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
