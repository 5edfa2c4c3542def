//! Snapshot capture and restore
//!
//! [`BackupManager`] retains at most one snapshot: the last known-good
//! (mode, state) pair. Each snapshot is sealed with a SHA-256 digest that is
//! checked again on restore.

use crate::error::BackupError;
use crate::lock::TransitionPermit;
use crate::store::ModeStateStore;
use crate::types::{ModeId, ModeState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Immutable point-in-time copy of the settled mode
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    mode: ModeId,
    state: ModeState,
    taken_at: DateTime<Utc>,
    digest: [u8; 32],
}

impl Snapshot {
    /// Capture and seal
    #[must_use]
    pub fn capture(mode: ModeId, state: ModeState) -> Self {
        let digest = compute_digest(&mode, &state);
        Self {
            mode,
            state,
            taken_at: Utc::now(),
            digest,
        }
    }

    /// Mode recorded in the snapshot
    #[inline]
    #[must_use]
    pub fn mode(&self) -> &ModeId {
        &self.mode
    }

    /// State recorded in the snapshot
    #[inline]
    #[must_use]
    pub fn state(&self) -> &ModeState {
        &self.state
    }

    /// Capture time
    #[inline]
    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
    }

    /// Hex digest sealed at capture
    #[must_use]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    /// Recompute the digest and compare with the sealed one
    ///
    /// # Errors
    /// - `BackupError::Corrupted` on mismatch
    pub fn verify(&self) -> Result<(), BackupError> {
        let actual = compute_digest(&self.mode, &self.state);
        if actual == self.digest {
            Ok(())
        } else {
            Err(BackupError::Corrupted {
                mode: self.mode.clone(),
                expected: hex::encode(self.digest),
                actual: hex::encode(actual),
            })
        }
    }

    #[cfg(test)]
    pub(crate) fn with_tampered_state(mut self, state: ModeState) -> Self {
        self.state = state;
        self
    }
}

fn compute_digest(mode: &ModeId, state: &ModeState) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(mode.as_str().as_bytes());
    hasher.update([0]);
    hasher.update(state.canonical_bytes());
    hasher.finalize().into()
}

/// Holder of the single retained snapshot
#[derive(Debug)]
pub struct BackupManager {
    store: Arc<ModeStateStore>,
    retained: Mutex<Option<Snapshot>>,
}

impl BackupManager {
    /// Create manager over a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<ModeStateStore>) -> Self {
        Self {
            store,
            retained: Mutex::new(None),
        }
    }

    /// Capture the store's current pair as the retained snapshot
    ///
    /// The store only ever holds settled modes, so whatever is current is
    /// known-good. Returns `None` (and keeps any earlier snapshot) when no
    /// mode has settled yet.
    pub fn snapshot(&self, _permit: &TransitionPermit) -> Option<Snapshot> {
        let (mode, state) = self.store.current()?;
        let snapshot = Snapshot::capture(mode, state);
        tracing::debug!(
            mode = %snapshot.mode,
            digest = %snapshot.digest_hex(),
            "snapshot captured"
        );
        *self.retained.lock() = Some(snapshot.clone());
        Some(snapshot)
    }

    /// Put the retained snapshot back into the store
    ///
    /// The restored mode's activation routine is not re-run; this is a
    /// rollback of state, not a re-activation.
    ///
    /// # Errors
    /// - `BackupError::NoBackupAvailable` if nothing was captured yet
    /// - `BackupError::Corrupted` if the snapshot fails verification
    pub fn restore_last(&self, permit: &TransitionPermit) -> Result<Snapshot, BackupError> {
        let snapshot = self
            .retained
            .lock()
            .clone()
            .ok_or(BackupError::NoBackupAvailable)?;
        snapshot.verify()?;

        self.store
            .set(permit, snapshot.mode.clone(), snapshot.state.clone());
        tracing::info!(mode = %snapshot.mode, "snapshot restored");
        Ok(snapshot)
    }

    /// Peek at the retained snapshot
    #[must_use]
    pub fn last(&self) -> Option<Snapshot> {
        self.retained.lock().clone()
    }

    /// Check if a snapshot is retained
    #[inline]
    #[must_use]
    pub fn has_backup(&self) -> bool {
        self.retained.lock().is_some()
    }

    #[cfg(test)]
    pub(crate) fn retain_for_test(&self, snapshot: Snapshot) {
        *self.retained.lock() = Some(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::TransitionLock;
    use serde_json::json;

    fn setup() -> (TransitionLock, Arc<ModeStateStore>, BackupManager) {
        let store = Arc::new(ModeStateStore::new());
        let backup = BackupManager::new(Arc::clone(&store));
        (TransitionLock::new(), store, backup)
    }

    #[test]
    fn snapshot_of_empty_store_is_none() {
        let (lock, _store, backup) = setup();
        let permit = lock.try_acquire().unwrap();

        assert!(backup.snapshot(&permit).is_none());
        assert!(!backup.has_backup());
    }

    #[test]
    fn restore_without_snapshot_fails() {
        let (lock, _store, backup) = setup();
        let permit = lock.try_acquire().unwrap();

        assert_eq!(
            backup.restore_last(&permit).unwrap_err(),
            BackupError::NoBackupAvailable
        );
    }

    #[test]
    fn snapshot_restore_reproduces_state_exactly() {
        let (lock, store, backup) = setup();
        let permit = lock.try_acquire().unwrap();
        let original = ModeState::new(json!({"waypoints": [1, 2, 3], "speed": 0.5}));

        store.set(&permit, "navigate".into(), original.clone());
        backup.snapshot(&permit).unwrap();
        store.set(&permit, "manipulate".into(), ModeState::new(json!({"grip": true})));

        let restored = backup.restore_last(&permit).unwrap();
        assert_eq!(restored.mode().as_str(), "navigate");

        let (id, state) = store.current().unwrap();
        assert_eq!(id.as_str(), "navigate");
        assert_eq!(state, original);
    }

    #[test]
    fn snapshot_replaces_previous() {
        let (lock, store, backup) = setup();
        let permit = lock.try_acquire().unwrap();

        store.set(&permit, "idle".into(), ModeState::empty());
        backup.snapshot(&permit);
        store.set(&permit, "navigate".into(), ModeState::empty());
        backup.snapshot(&permit);

        assert_eq!(backup.last().unwrap().mode().as_str(), "navigate");
    }

    #[test]
    fn empty_store_keeps_earlier_snapshot() {
        let (lock, _store, backup) = setup();
        let permit = lock.try_acquire().unwrap();
        backup.retain_for_test(Snapshot::capture("idle".into(), ModeState::empty()));

        assert!(backup.snapshot(&permit).is_none());
        assert_eq!(backup.last().unwrap().mode().as_str(), "idle");
    }

    #[test]
    fn corrupted_snapshot_is_rejected() {
        let (lock, store, backup) = setup();
        let permit = lock.try_acquire().unwrap();

        let mut snapshot = Snapshot::capture("idle".into(), ModeState::new(json!({"x": 1})));
        snapshot.state = ModeState::new(json!({"x": 2}));
        backup.retain_for_test(snapshot);

        let err = backup.restore_last(&permit).unwrap_err();
        assert!(matches!(err, BackupError::Corrupted { .. }));
        assert!(store.current().is_none());
    }

    #[test]
    fn digest_is_stable() {
        let a = Snapshot::capture("idle".into(), ModeState::new(json!({"b": 1, "a": 2})));
        let b = Snapshot::capture("idle".into(), ModeState::new(json!({"a": 2, "b": 1})));
        assert_eq!(a.digest_hex(), b.digest_hex());
        assert_eq!(a.digest_hex().len(), 64);
        assert!(a.verify().is_ok());
    }
}
