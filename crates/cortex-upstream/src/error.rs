//! Upstream call errors

use cortex_core::ModeError;
use std::time::Duration;

/// Boxed error raised by an upstream operation
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by [`crate::UpstreamCaller`]
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Single attempt exceeded its timeout
    #[error("upstream call timed out after {0:?}")]
    TimedOut(Duration),

    /// Single attempt returned an error
    #[error("upstream call failed: {0}")]
    Failed(#[source] BoxError),

    /// Every attempt failed
    #[error("upstream unreachable after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        last: Box<UpstreamError>,
    },
}

impl UpstreamError {
    /// Check if the final failure was a timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::TimedOut(_) => true,
            Self::Failed(_) => false,
            Self::Exhausted { last, .. } => last.is_timeout(),
        }
    }
}

impl From<UpstreamError> for ModeError {
    fn from(error: UpstreamError) -> Self {
        ModeError::upstream(error)
    }
}
