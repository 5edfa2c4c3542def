//! Error types for the mode runtime
//!
//! Two classes of failure exist:
//! - Caller or deployment mistakes (`TransitionError`, `RegistryError`),
//!   returned directly to whoever made the call
//! - Runtime conditions raised by mode routines (`ModeError`), which are
//!   absorbed by the coordinator and fed into the recovery ladder

use crate::types::ModeId;

/// Errors returned from a transition request
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// Target mode is not registered
    #[error("unknown mode: {0}")]
    UnknownMode(ModeId),

    /// Another transition holds the lock
    #[error("transition already in progress")]
    TransitionInProgress,

    /// A previous transition ended in critical halt
    #[error("coordinator halted after critical failure; restart required")]
    Halted,

    /// The runtime dropped the transition task before it finished
    #[error("transition interrupted: {0}")]
    Interrupted(String),
}

impl TransitionError {
    /// Check if a later retry may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransitionInProgress)
    }

    /// Check if error requires human intervention
    #[inline]
    #[must_use]
    pub fn requires_human(&self) -> bool {
        matches!(self, Self::Halted | Self::Interrupted(_))
    }
}

/// Registry construction and lookup errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Identifier registered twice
    #[error("duplicate mode: {0}")]
    DuplicateMode(ModeId),

    /// Identifier not registered
    #[error("unknown mode: {0}")]
    UnknownMode(ModeId),

    /// No safe mode designated
    #[error("configuration error: no safe mode designated")]
    MissingSafeMode,

    /// Designated safe mode was never registered
    #[error("configuration error: safe mode '{0}' is not registered")]
    SafeModeNotRegistered(ModeId),

    /// Designated safe mode depends on upstream services
    #[error("configuration error: safe mode '{0}' requires network access")]
    SafeModeRequiresNetwork(ModeId),
}

impl RegistryError {
    /// Deployment mistakes that are fatal at startup
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingSafeMode | Self::SafeModeNotRegistered(_) | Self::SafeModeRequiresNetwork(_)
        )
    }
}

/// Errors raised by mode activation and deactivation routines
#[derive(Debug, thiserror::Error)]
pub enum ModeError {
    /// Activation could not complete
    #[error("activation failed: {0}")]
    Activation(String),

    /// Deactivation could not complete
    #[error("deactivation failed: {0}")]
    Deactivation(String),

    /// Upstream service unreachable after retries
    #[error("upstream call failed: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Routine panicked
    #[error("mode routine panicked: {0}")]
    Panicked(String),
}

impl ModeError {
    /// Activation failure with message
    #[inline]
    pub fn activation(message: impl Into<String>) -> Self {
        Self::Activation(message.into())
    }

    /// Deactivation failure with message
    #[inline]
    pub fn deactivation(message: impl Into<String>) -> Self {
        Self::Deactivation(message.into())
    }

    /// Wrap an upstream error
    #[inline]
    pub fn upstream(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Upstream(Box::new(error))
    }
}

/// Activation failure handed to the recovery ladder
#[derive(Debug, thiserror::Error)]
#[error("activation of '{mode}' failed: {source}")]
pub struct ActivationFailure {
    /// Mode whose activation failed
    pub mode: ModeId,
    /// What the routine raised
    #[source]
    pub source: ModeError,
}

impl ActivationFailure {
    /// Create failure context
    #[inline]
    #[must_use]
    pub fn new(mode: ModeId, source: ModeError) -> Self {
        Self { mode, source }
    }
}

/// Why a recovery stage could not settle
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// Rollback impossible
    #[error(transparent)]
    Backup(#[from] BackupError),

    /// Safe mode is the mode that just failed
    #[error("safe mode '{0}' was the failing target")]
    SafeModeWasTarget(ModeId),

    /// Safe mode activation failed
    #[error("safe mode activation failed: {0}")]
    SafeModeActivation(#[source] ModeError),
}

/// Snapshot restore errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackupError {
    /// No snapshot has been taken yet
    #[error("no backup available for rollback")]
    NoBackupAvailable,

    /// Snapshot digest mismatch
    #[error("snapshot of '{mode}' is corrupted: expected digest {expected}, found {actual}")]
    Corrupted {
        /// Mode recorded in the snapshot
        mode: ModeId,
        /// Digest recorded at capture
        expected: String,
        /// Digest recomputed at restore
        actual: String,
    },
}

/// Notification delivery errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// Receiver went away
    #[error("notification channel closed")]
    Closed,

    /// Receiver is not keeping up
    #[error("notification channel full")]
    Full,

    /// Sink refused the message
    #[error("notification rejected: {0}")]
    Rejected(String),
}
