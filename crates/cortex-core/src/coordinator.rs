//! Transition coordinator
//!
//! The single entry point for changing modes:
//! - Rejects (never queues) a request while another transition runs
//! - Validates the target before touching any state
//! - Snapshots the settled mode, deactivates it, activates the target
//! - Commits on success, hands failures to the [`RecoveryLadder`]
//!
//! The transition body runs as its own task, so a caller that stops
//! waiting cannot abort an activation halfway through.

use crate::backup::{BackupManager, Snapshot};
use crate::error::{ActivationFailure, ModeError, TransitionError};
use crate::lock::{TransitionLock, TransitionPermit};
use crate::mode::{ActivationContext, Mode};
use crate::notify::{self, NotificationSink, TracingSink};
use crate::recovery::{panic_message, RecoveryLadder};
use crate::registry::ModeRegistry;
use crate::store::{ActiveMode, ModeStateStore};
use crate::types::{
    ModeId, ModeInfo, ModeState, ModeSummary, Severity, TransitionOutcome, TransitionRecord,
    TransitionRequest,
};
use chrono::Utc;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Origin label used by [`TransitionCoordinator::start`]
pub const STARTUP_ORIGIN: &str = "startup";

/// Coordinator behavior knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Announce entry/exit messages of modes on committed transitions
    pub announce_transitions: bool,
    /// Transition records retained
    pub history_limit: usize,
}

impl CoordinatorSettings {
    /// Default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With announcements on or off
    #[inline]
    #[must_use]
    pub fn with_announcements(mut self, enabled: bool) -> Self {
        self.announce_transitions = enabled;
        self
    }

    /// With history limit
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            announce_transitions: false,
            history_limit: 64,
        }
    }
}

struct Inner {
    registry: Arc<ModeRegistry>,
    store: Arc<ModeStateStore>,
    backup: Arc<BackupManager>,
    ladder: RecoveryLadder,
    sink: Arc<dyn NotificationSink>,
    lock: TransitionLock,
    halted: AtomicBool,
    history: Mutex<VecDeque<TransitionRecord>>,
    settings: CoordinatorSettings,
}

/// Orchestrates mode transitions; cheap to clone and share between callers
#[derive(Clone)]
pub struct TransitionCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for TransitionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionCoordinator")
            .field("current", &self.inner.store.current_id())
            .field("halted", &self.is_halted())
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl TransitionCoordinator {
    /// Create coordinator with default settings
    #[must_use]
    pub fn new(registry: ModeRegistry, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_settings(registry, sink, CoordinatorSettings::default())
    }

    /// Create coordinator that only logs notifications
    #[must_use]
    pub fn with_tracing_sink(registry: ModeRegistry) -> Self {
        Self::new(registry, Arc::new(TracingSink))
    }

    /// Create coordinator with explicit settings
    #[must_use]
    pub fn with_settings(
        registry: ModeRegistry,
        sink: Arc<dyn NotificationSink>,
        settings: CoordinatorSettings,
    ) -> Self {
        let registry = Arc::new(registry);
        let store = Arc::new(ModeStateStore::new());
        let backup = Arc::new(BackupManager::new(Arc::clone(&store)));
        let ladder = RecoveryLadder::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&backup),
            Arc::clone(&sink),
        );

        Self {
            inner: Arc::new(Inner {
                registry,
                store,
                backup,
                ladder,
                sink,
                lock: TransitionLock::new(),
                halted: AtomicBool::new(false),
                history: Mutex::new(VecDeque::new()),
                settings,
            }),
        }
    }

    /// Enter the safe/default mode
    ///
    /// # Errors
    /// Same as [`Self::transition`].
    pub async fn start(&self) -> Result<TransitionOutcome, TransitionError> {
        let target = self.inner.registry.safe_mode_id().clone();
        self.transition(TransitionRequest::new(target).with_origin(STARTUP_ORIGIN))
            .await
    }

    /// Request a transition by mode identifier (manual origin)
    ///
    /// # Errors
    /// Same as [`Self::transition`].
    pub async fn request_transition(
        &self,
        target: impl Into<ModeId>,
    ) -> Result<TransitionOutcome, TransitionError> {
        self.transition(TransitionRequest::new(target)).await
    }

    /// Execute one transition request to a terminal outcome
    ///
    /// Activation failures never surface here; they are resolved by the
    /// recovery ladder and reported through the outcome.
    ///
    /// # Errors
    /// - `TransitionError::TransitionInProgress` if another transition runs
    /// - `TransitionError::Halted` after a critical halt
    /// - `TransitionError::UnknownMode` if the target is not registered
    /// - `TransitionError::Interrupted` if the runtime dropped the task
    pub async fn transition(
        &self,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome, TransitionError> {
        let permit = self.inner.lock.try_acquire().map_err(|e| {
            tracing::warn!(target_mode = %request.target, "transition already in progress, rejecting");
            e
        })?;

        if self.is_halted() {
            return Err(TransitionError::Halted);
        }

        let target = self
            .inner
            .registry
            .lookup(&request.target)
            .map_err(|_| TransitionError::UnknownMode(request.target.clone()))?;

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.execute(permit, target, request).await })
            .await
            .map_err(|e| TransitionError::Interrupted(e.to_string()))
    }

    /// Current (identifier, state) pair
    #[must_use]
    pub fn current(&self) -> Option<(ModeId, ModeState)> {
        self.inner.store.current()
    }

    /// Current mode identifier
    #[must_use]
    pub fn current_mode(&self) -> Option<ModeId> {
        self.inner.store.current_id()
    }

    /// Read access to the state store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ModeStateStore {
        &self.inner.store
    }

    /// Registry in use
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ModeRegistry {
        &self.inner.registry
    }

    /// Retained snapshot, if any
    #[must_use]
    pub fn last_snapshot(&self) -> Option<Snapshot> {
        self.inner.backup.last()
    }

    /// True after a critical halt
    #[inline]
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.inner.halted.load(Ordering::Acquire)
    }

    /// True while a transition holds the lock
    #[inline]
    #[must_use]
    pub fn is_transition_in_progress(&self) -> bool {
        self.inner.lock.is_held()
    }

    /// Finished transitions, oldest first
    #[must_use]
    pub fn history(&self) -> Vec<TransitionRecord> {
        self.inner.history.lock().iter().cloned().collect()
    }

    /// All modes with their current flag
    #[must_use]
    pub fn available_modes(&self) -> Vec<ModeSummary> {
        let current = self.current_mode();
        self.inner
            .registry
            .descriptors()
            .map(|d| ModeSummary {
                id: d.id.clone(),
                display_name: d.display_name.clone(),
                description: d.description.clone(),
                requires_network: d.capabilities.requires_network,
                is_current: current.as_ref() == Some(&d.id),
            })
            .collect()
    }

    /// Current, previous and available modes
    #[must_use]
    pub fn mode_info(&self) -> ModeInfo {
        ModeInfo {
            current: self.current_mode(),
            previous: self.inner.store.previous_id(),
            safe_mode: self.inner.registry.safe_mode_id().clone(),
            halted: self.is_halted(),
            transition_in_progress: self.is_transition_in_progress(),
            modes: self.available_modes(),
        }
    }
}

impl Inner {
    async fn execute(
        &self,
        permit: TransitionPermit,
        target: Arc<dyn Mode>,
        request: TransitionRequest,
    ) -> TransitionOutcome {
        debug_assert!(self.lock.issued(&permit), "permit taken on a foreign lock");
        let started_at = Utc::now();
        let clock = Instant::now();
        let outgoing = self.store.active();
        let from = outgoing.as_ref().map(|a| a.id.clone());

        tracing::info!(
            transition = %request.id,
            from = ?from,
            target_mode = %request.target,
            origin = %request.context.origin,
            "handling mode transition"
        );

        self.backup.snapshot(&permit);

        if let Some(active) = outgoing {
            self.leave(&active).await;
        }

        let ctx = ActivationContext {
            transition: request.id,
            from: from.clone(),
            origin: request.context.origin.clone(),
            recovery: false,
        };

        let outcome = match activate_guarded(target.as_ref(), ctx.clone()).await {
            Ok(state) => {
                self.store.set(&permit, target.id().clone(), state);
                tracing::info!(mode = %target.id(), "successfully transitioned");
                if self.settings.announce_transitions {
                    if let Some(message) = &target.descriptor().entry_message {
                        notify::deliver(self.sink.as_ref(), message, Severity::Info);
                    }
                }
                TransitionOutcome::Committed(target.id().clone())
            }
            Err(source) => {
                tracing::error!(mode = %target.id(), error = %source, "mode activation failed");
                let failure = ActivationFailure::new(target.id().clone(), source);
                let report = self.ladder.recover(&permit, &failure, &ctx).await;
                if report.outcome.requires_human() {
                    self.halted.store(true, Ordering::Release);
                }
                report.outcome
            }
        };

        self.record(TransitionRecord {
            id: request.id,
            origin: request.context.origin,
            from,
            target: request.target,
            outcome: outcome.clone(),
            started_at,
            elapsed: clock.elapsed(),
        });

        drop(permit);
        outcome
    }

    /// Best-effort exit of the outgoing mode
    async fn leave(&self, active: &ActiveMode) {
        let Ok(mode) = self.registry.lookup(&active.id) else {
            return;
        };

        if self.settings.announce_transitions {
            if let Some(message) = &mode.descriptor().exit_message {
                notify::deliver(self.sink.as_ref(), message, Severity::Info);
            }
        }

        let result = AssertUnwindSafe(mode.deactivate(active.state.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ModeError::Panicked(panic_message(&*panic))));

        if let Err(e) = result {
            tracing::warn!(mode = %active.id, error = %e, "deactivation failed, continuing");
        }
    }

    fn record(&self, record: TransitionRecord) {
        let limit = self.settings.history_limit;
        if limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= limit {
            history.pop_front();
        }
        history.push_back(record);
    }
}

async fn activate_guarded(mode: &dyn Mode, ctx: ActivationContext) -> Result<ModeState, ModeError> {
    AssertUnwindSafe(mode.activate(ctx))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(ModeError::Panicked(panic_message(&*panic))))
}
