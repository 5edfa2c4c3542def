//! Recovery ladder
//!
//! Escalation policy entered when activation fails:
//! 1. Rollback to the retained snapshot
//! 2. Engage the registry's safe mode
//! 3. Critical halt (fail-stop, manual restart)
//!
//! Stages only move forward within one episode, and each stage that
//! succeeds is terminal for the request.

use crate::backup::BackupManager;
use crate::error::{ActivationFailure, ModeError, StageError};
use crate::lock::TransitionPermit;
use crate::mode::ActivationContext;
use crate::notify::{self, NotificationSink, MSG_CRITICAL, MSG_ROLLED_BACK, MSG_SAFE_MODE};
use crate::registry::ModeRegistry;
use crate::store::ModeStateStore;
use crate::types::{Severity, TransitionOutcome};
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Stage of one recovery episode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryStage {
    /// Restore the last known-good snapshot
    Rollback,
    /// Activate the designated safe mode
    SafeMode,
    /// Give up and require a restart
    CriticalHalt,
}

impl RecoveryStage {
    /// Stage the ladder may move to from here
    #[must_use]
    pub fn escalation(self) -> Option<RecoveryStage> {
        match self {
            RecoveryStage::Rollback => Some(RecoveryStage::SafeMode),
            RecoveryStage::SafeMode => Some(RecoveryStage::CriticalHalt),
            RecoveryStage::CriticalHalt => None,
        }
    }
}

impl fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStage::Rollback => f.write_str("rollback"),
            RecoveryStage::SafeMode => f.write_str("safe_mode"),
            RecoveryStage::CriticalHalt => f.write_str("critical_halt"),
        }
    }
}

/// Record of one stage attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAttempt {
    /// Stage tried
    pub stage: RecoveryStage,
    /// Why it did not settle, if it escalated
    pub escalated_because: Option<String>,
}

/// Result of a recovery episode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Terminal outcome
    pub outcome: TransitionOutcome,
    /// Stages attempted, in order
    pub attempts: Vec<StageAttempt>,
}

/// Three-stage escalation policy
pub struct RecoveryLadder {
    registry: Arc<ModeRegistry>,
    store: Arc<ModeStateStore>,
    backup: Arc<BackupManager>,
    sink: Arc<dyn NotificationSink>,
}

impl fmt::Debug for RecoveryLadder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryLadder")
            .field("safe_mode", self.registry.safe_mode_id())
            .finish_non_exhaustive()
    }
}

impl RecoveryLadder {
    /// Create ladder over the runtime's components
    #[must_use]
    pub fn new(
        registry: Arc<ModeRegistry>,
        store: Arc<ModeStateStore>,
        backup: Arc<BackupManager>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            registry,
            store,
            backup,
            sink,
        }
    }

    /// Run the ladder for a failed activation
    ///
    /// Runs under the permit of the failing transition, so no other
    /// transition can interleave until a terminal outcome is reached.
    pub async fn recover(
        &self,
        permit: &TransitionPermit,
        failure: &ActivationFailure,
        ctx: &ActivationContext,
    ) -> RecoveryReport {
        tracing::error!(
            target_mode = %failure.mode,
            error = %failure.source,
            "initiating recovery from failed transition"
        );

        let mut attempts = Vec::new();
        let mut stage = RecoveryStage::Rollback;

        loop {
            match self.attempt(stage, permit, failure, ctx).await {
                Ok(outcome) => {
                    attempts.push(StageAttempt {
                        stage,
                        escalated_because: None,
                    });
                    return RecoveryReport { outcome, attempts };
                }
                Err(reason) => {
                    tracing::warn!(%stage, reason = %reason, "recovery stage failed, escalating");
                    attempts.push(StageAttempt {
                        stage,
                        escalated_because: Some(reason.to_string()),
                    });
                    match stage.escalation() {
                        Some(next) => stage = next,
                        None => {
                            // Critical halt always settles
                            return RecoveryReport {
                                outcome: TransitionOutcome::CriticalHalt,
                                attempts,
                            };
                        }
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        stage: RecoveryStage,
        permit: &TransitionPermit,
        failure: &ActivationFailure,
        ctx: &ActivationContext,
    ) -> Result<TransitionOutcome, StageError> {
        match stage {
            RecoveryStage::Rollback => self.rollback(permit),
            RecoveryStage::SafeMode => self.engage_safe_mode(permit, failure, ctx).await,
            RecoveryStage::CriticalHalt => Ok(self.halt(failure)),
        }
    }

    fn rollback(&self, permit: &TransitionPermit) -> Result<TransitionOutcome, StageError> {
        let snapshot = self.backup.restore_last(permit)?;
        tracing::info!(mode = %snapshot.mode(), "rolled back to previous mode");
        notify::deliver(self.sink.as_ref(), MSG_ROLLED_BACK, Severity::Warning);
        Ok(TransitionOutcome::RolledBack(snapshot.mode().clone()))
    }

    async fn engage_safe_mode(
        &self,
        permit: &TransitionPermit,
        failure: &ActivationFailure,
        ctx: &ActivationContext,
    ) -> Result<TransitionOutcome, StageError> {
        let safe = self.registry.safe_mode();
        if safe.id() == &failure.mode {
            return Err(StageError::SafeModeWasTarget(failure.mode.clone()));
        }

        tracing::warn!(safe_mode = %safe.id(), "engaging safe mode");
        let safe_ctx = ActivationContext {
            recovery: true,
            ..ctx.clone()
        };
        let state = AssertUnwindSafe(safe.activate(safe_ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ModeError::Panicked(panic_message(&*panic))))
            .map_err(StageError::SafeModeActivation)?;

        self.store.set(permit, safe.id().clone(), state);
        notify::deliver(self.sink.as_ref(), MSG_SAFE_MODE, Severity::Warning);
        Ok(TransitionOutcome::SafeModeEngaged)
    }

    fn halt(&self, failure: &ActivationFailure) -> TransitionOutcome {
        tracing::error!(
            severity = "critical",
            target_mode = %failure.mode,
            "all recovery attempts failed; manual restart required"
        );
        notify::deliver(self.sink.as_ref(), MSG_CRITICAL, Severity::Critical);
        TransitionOutcome::CriticalHalt
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
