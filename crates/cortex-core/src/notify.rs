//! User-facing notifications
//!
//! Rendering (speech, UI) lives behind [`NotificationSink`]. Delivery is
//! fire-and-forget: failures are logged and never affect a transition.

use crate::error::NotifyError;
use crate::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Rollback succeeded
pub const MSG_ROLLED_BACK: &str = "Mode transition failed. Returning to previous mode.";
/// Safe mode engaged
pub const MSG_SAFE_MODE: &str = "Mode transition failed. Switching to safe mode.";
/// Critical halt
pub const MSG_CRITICAL: &str = "Critical error: unable to recover mode. Please restart the system.";

/// Receiver of recovery and announcement messages
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    /// Deliver a message; must not block
    ///
    /// # Errors
    /// Delivery failures; callers swallow them.
    fn notify(&self, message: &str, severity: Severity) -> Result<(), NotifyError>;
}

/// Deliver and swallow any failure
pub(crate) fn deliver(sink: &dyn NotificationSink, message: &str, severity: Severity) {
    if let Err(e) = sink.notify(message, severity) {
        tracing::warn!(error = %e, ?severity, "notification dropped");
    }
}

/// A delivered message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Message text
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// Emission time
    pub at: DateTime<Utc>,
}

/// Sink that writes to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, message: &str, severity: Severity) -> Result<(), NotifyError> {
        match severity {
            Severity::Info => tracing::info!(target: "cortex::notify", "{message}"),
            Severity::Warning => tracing::warn!(target: "cortex::notify", "{message}"),
            Severity::Critical => tracing::error!(target: "cortex::notify", "{message}"),
        }
        Ok(())
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _message: &str, _severity: Severity) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Sink that forwards into a bounded channel without waiting
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<Notification>,
}

impl ChannelSink {
    /// Create sink and its receiving end
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, message: &str, severity: Severity) -> Result<(), NotifyError> {
        let notification = Notification {
            message: message.to_string(),
            severity,
            at: Utc::now(),
        };
        self.sender.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => NotifyError::Full,
            mpsc::error::TrySendError::Closed(_) => NotifyError::Closed,
        })
    }
}
