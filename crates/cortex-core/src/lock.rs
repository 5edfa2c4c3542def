//! Exclusive transition lock
//!
//! A [`TransitionPermit`] is proof that the caller owns a transition slot.
//! Every mutation of mode state or the retained snapshot takes a permit, so
//! mutation with no lock held at all does not type-check. A permit carries
//! the identity of the lock that issued it; [`TransitionLock::issued`]
//! tells a permit of this lock apart from one taken on an unrelated lock.

use crate::error::TransitionError;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Non-queuing mutual exclusion for transitions
#[derive(Debug, Clone, Default)]
pub struct TransitionLock {
    inner: Arc<Mutex<()>>,
}

impl TransitionLock {
    /// Create unlocked
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock without waiting
    ///
    /// # Errors
    /// - `TransitionError::TransitionInProgress` if already held
    pub fn try_acquire(&self) -> Result<TransitionPermit, TransitionError> {
        Arc::clone(&self.inner)
            .try_lock_owned()
            .map(|guard| TransitionPermit {
                issuer: Arc::clone(&self.inner),
                _guard: guard,
            })
            .map_err(|_| TransitionError::TransitionInProgress)
    }

    /// Check if a transition currently holds the lock
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Check that `permit` was taken on this lock (or a clone of it)
    #[inline]
    #[must_use]
    pub fn issued(&self, permit: &TransitionPermit) -> bool {
        Arc::ptr_eq(&self.inner, &permit.issuer)
    }
}

/// Ownership of the transition slot; released on drop
#[derive(Debug)]
pub struct TransitionPermit {
    issuer: Arc<Mutex<()>>,
    _guard: OwnedMutexGuard<()>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_rejects_second_holder() {
        let lock = TransitionLock::new();
        let permit = lock.try_acquire().unwrap();
        assert!(lock.is_held());
        assert!(matches!(
            lock.try_acquire(),
            Err(TransitionError::TransitionInProgress)
        ));

        drop(permit);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_ok());
    }

    #[test]
    fn cloned_lock_shares_slot() {
        let lock = TransitionLock::new();
        let other = lock.clone();
        let _permit = lock.try_acquire().unwrap();
        assert!(other.try_acquire().is_err());
    }

    #[test]
    fn permit_is_bound_to_issuing_lock() {
        let lock = TransitionLock::new();
        let unrelated = TransitionLock::new();
        let permit = lock.try_acquire().unwrap();
        let foreign = unrelated.try_acquire().unwrap();

        assert!(lock.issued(&permit));
        assert!(lock.clone().issued(&permit));
        assert!(!lock.issued(&foreign));
        assert!(!unrelated.issued(&permit));
    }
}
