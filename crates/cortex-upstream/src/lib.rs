//! Cortex Upstream - retrying calls to external services
//!
//! Mode activation routines that must reach an external service (speech,
//! language model, remote planner) go through an [`UpstreamCaller`]:
//! - Per-attempt timeout that grows with each attempt
//! - Exponential backoff between attempts
//! - Call statistics and a health window
//!
//! The coordinator never sees retry internals; an exhausted call surfaces as
//! an ordinary [`cortex_core::ModeError::Upstream`].

pub mod caller;
pub mod error;
pub mod mode;
pub mod policy;

pub use caller::{CallStats, HealthStatus, UpstreamCaller, DEFAULT_HEALTH_WINDOW};
pub use error::{BoxError, UpstreamError};
pub use mode::UpstreamMode;
pub use policy::RetryPolicy;
