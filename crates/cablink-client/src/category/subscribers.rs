//! Observer list for typed notifications.
//!
//! `publish` reports how many callbacks it reached, so "nobody is listening"
//! is something a caller can see and log rather than a silent no-op.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::fault::lock;

/// Handle returned by [`Subscribers::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct Subscribers<T> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callback; it is invoked for every subsequent publish.
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.entries).push((id, Arc::new(callback)));
        id
    }

    /// Removes a callback.  Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Invokes every callback with `value`, in subscription order.
    ///
    /// Callbacks run outside the list's lock, so they may subscribe or
    /// unsubscribe.  Returns the number of callbacks reached.
    pub fn publish(&self, value: &T) -> usize {
        let callbacks: Vec<Callback<T>> = lock(&self.entries)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in &callbacks {
            callback(value);
        }
        callbacks.len()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_with_no_subscribers_reports_zero() {
        let subs: Subscribers<u32> = Subscribers::new();
        assert!(subs.is_empty());
        assert_eq!(subs.publish(&1), 0);
    }

    #[test]
    fn test_publish_reaches_every_subscriber_in_order() {
        // Arrange
        let subs = Subscribers::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = Arc::clone(&seen);
            subs.subscribe(move |v: &u32| seen.lock().unwrap().push((tag, *v)));
        }

        // Act
        let reached = subs.publish(&5);

        // Assert
        assert_eq!(reached, 2);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 5), ("b", 5)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let subs = Subscribers::new();
        let id = subs.subscribe(|_: &u32| {});

        assert!(subs.unsubscribe(id));
        assert!(!subs.unsubscribe(id), "second unsubscribe is a no-op");
        assert_eq!(subs.publish(&1), 0);
    }
}
