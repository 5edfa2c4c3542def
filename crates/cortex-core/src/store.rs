//! Mode state store
//!
//! Holds the (current mode, state) pair. Readers clone out a consistent
//! pair without ever observing a half-written update; the only writer is
//! the transition in possession of a [`TransitionPermit`].

use crate::lock::TransitionPermit;
use crate::types::{ModeId, ModeState};
use parking_lot::RwLock;
use std::sync::Arc;

/// The settled mode and its state
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveMode {
    /// Mode identifier
    pub id: ModeId,
    /// Mode state
    pub state: ModeState,
}

#[derive(Debug, Default)]
struct Slot {
    active: Option<Arc<ActiveMode>>,
    previous: Option<ModeId>,
}

/// Process-wide holder of the current mode
#[derive(Debug, Default)]
pub struct ModeStateStore {
    inner: RwLock<Slot>,
}

impl ModeStateStore {
    /// Create empty store (no mode settled yet)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current (identifier, state) pair
    #[must_use]
    pub fn current(&self) -> Option<(ModeId, ModeState)> {
        self.inner
            .read()
            .active
            .as_ref()
            .map(|a| (a.id.clone(), a.state.clone()))
    }

    /// Current pair as a shared handle, without copying the state
    #[must_use]
    pub fn active(&self) -> Option<Arc<ActiveMode>> {
        self.inner.read().active.clone()
    }

    /// Current mode identifier
    #[must_use]
    pub fn current_id(&self) -> Option<ModeId> {
        self.inner.read().active.as_ref().map(|a| a.id.clone())
    }

    /// Mode that was current before the last change of mode
    #[must_use]
    pub fn previous_id(&self) -> Option<ModeId> {
        self.inner.read().previous.clone()
    }

    /// Replace both identifier and state in one step
    pub(crate) fn set(&self, _permit: &TransitionPermit, id: ModeId, state: ModeState) {
        let next = Arc::new(ActiveMode { id, state });
        let mut slot = self.inner.write();
        if let Some(prev) = slot.active.as_ref() {
            if prev.id != next.id {
                slot.previous = Some(prev.id.clone());
            }
        }
        slot.active = Some(next);
    }
}
