//! Quality change notifications.
//!
//! Subscribers are called synchronously, in registration order, every time
//! the controller realizes a level change. A subscriber that returns an error
//! or panics is logged and skipped; the remaining subscribers still run and the
//! controller's tick is unaffected.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// A realized quality level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityChange {
    pub previous_level: i32,
    pub new_level: i32,
}

impl QualityChange {
    pub fn new(previous_level: i32, new_level: i32) -> Self {
        Self {
            previous_level,
            new_level,
        }
    }

    pub fn is_decrease(&self) -> bool {
        self.new_level < self.previous_level
    }

    pub fn is_increase(&self) -> bool {
        self.new_level > self.previous_level
    }
}

/// Error type subscribers may return.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

type Callback = Box<dyn FnMut(&QualityChange) -> Result<(), ObserverError> + Send>;

/// Handle returned by [`QualityEvents::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Ordered list of quality change subscribers.
#[derive(Default)]
pub struct QualityEvents {
    subscribers: Vec<(SubscriptionId, Callback)>,
    next_id: u64,
}

impl QualityEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback. Callbacks run in registration order.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&QualityChange) -> Result<(), ObserverError> + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Notify every subscriber. Returns how many completed without failing.
    pub fn emit(&mut self, change: QualityChange) -> usize {
        let mut delivered = 0;

        for (id, callback) in self.subscribers.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| callback(&change))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(subscriber = id.0, "Quality change subscriber failed: {}", e);
                }
                Err(_) => {
                    warn!(subscriber = id.0, "Quality change subscriber panicked, continuing");
                }
            }
        }

        delivered
    }
}

impl std::fmt::Debug for QualityEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityEvents")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_subscribers_called_in_registration_order() {
        let mut events = QualityEvents::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            events.subscribe(move |change| {
                log.lock().unwrap().push((name, change.new_level));
                Ok(())
            });
        }

        assert_eq!(events.emit(QualityChange::new(3, 2)), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![("first", 2), ("second", 2), ("third", 2)]
        );
    }

    #[test]
    fn test_failing_subscribers_are_isolated() {
        let mut events = QualityEvents::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        events.subscribe(|_| Err("disk full".into()));
        events.subscribe(|_| panic!("subscriber bug"));
        let seen_clone = Arc::clone(&seen);
        events.subscribe(move |change| {
            seen_clone.lock().unwrap().push(*change);
            Ok(())
        });

        let delivered = events.emit(QualityChange::new(1, 2));

        assert_eq!(delivered, 1);
        assert_eq!(*seen.lock().unwrap(), vec![QualityChange::new(1, 2)]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut events = QualityEvents::new();
        let count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&count);
        let id = events.subscribe(move |_| {
            *count_clone.lock().unwrap() += 1;
            Ok(())
        });

        events.emit(QualityChange::new(0, 1));
        assert!(events.unsubscribe(id));
        assert!(!events.unsubscribe(id));
        assert!(events.is_empty());
        events.emit(QualityChange::new(1, 2));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn test_change_direction_helpers() {
        assert!(QualityChange::new(3, 2).is_decrease());
        assert!(QualityChange::new(2, 3).is_increase());
        assert!(!QualityChange::new(2, 2).is_increase());
    }
}
