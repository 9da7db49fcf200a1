//! Single-instance registry for quality controllers.
//!
//! Only one controller may drive quality levels at a time. Controllers share
//! an `Arc<InstanceRegistry>` handed to them at construction and claim its
//! slot on activation.

use crate::error::ActivationError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Identity of a controller within a registry.
pub type InstanceId = u64;

/// Owner of the "active controller" slot.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    active: Mutex<Option<InstanceId>>,
    next_id: AtomicU64,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh identity for a new controller.
    pub fn allocate_id(&self) -> InstanceId {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Claim the slot for `id`.
    ///
    /// The check and the set happen under one lock acquisition. Claiming a
    /// slot already held by `id` succeeds.
    pub fn try_claim(&self, id: InstanceId) -> Result<(), ActivationError> {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match *active {
            Some(holder) if holder != id => Err(ActivationError::AlreadyActive { active: holder }),
            _ => {
                *active = Some(id);
                debug!(instance = id, "Claimed active controller slot");
                Ok(())
            }
        }
    }

    /// Release the slot if `id` holds it. Returns whether it was released.
    pub fn release(&self, id: InstanceId) -> bool {
        let mut active = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if *active == Some(id) {
            *active = None;
            debug!(instance = id, "Released active controller slot");
            true
        } else {
            false
        }
    }

    /// Instance currently holding the slot.
    pub fn active(&self) -> Option<InstanceId> {
        self.active
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_claim_and_release() {
        let registry = InstanceRegistry::new();
        let a = registry.allocate_id();
        let b = registry.allocate_id();
        assert_ne!(a, b);

        assert!(registry.try_claim(a).is_ok());
        assert_eq!(registry.active(), Some(a));
        assert_eq!(
            registry.try_claim(b),
            Err(ActivationError::AlreadyActive { active: a })
        );

        // Re-claiming by the holder is fine
        assert!(registry.try_claim(a).is_ok());

        // Only the holder can release
        assert!(!registry.release(b));
        assert!(registry.release(a));
        assert_eq!(registry.active(), None);

        assert!(registry.try_claim(b).is_ok());
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let registry = Arc::new(InstanceRegistry::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let id = registry.allocate_id();
                    registry.try_claim(id).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(registry.active().is_some());
    }
}
