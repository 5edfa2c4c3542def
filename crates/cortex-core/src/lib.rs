//! Cortex Core - guarded mode transitions
//!
//! The resilience core of an agent runtime that switches between discrete
//! behavioral modes:
//! - Keeps a catalog of modes and a designated safe mode
//! - Serializes transitions behind a non-queuing lock
//! - Snapshots the last known-good mode before every attempt
//! - Escalates failed activations: rollback, safe mode, critical halt
//!
//! # Example
//!
//! ```rust,ignore
//! use cortex_core::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = ModeRegistry::builder()
//!     .with_mode(Arc::new(StaticMode::new(ModeDescriptor::new("idle"))))?
//!     .with_mode(Arc::new(StaticMode::new(ModeDescriptor::new("navigate"))))?
//!     .safe_mode("idle")
//!     .build()?;
//!
//! let coordinator = TransitionCoordinator::with_tracing_sink(registry);
//! coordinator.start().await?;
//! let outcome = coordinator.request_transition("navigate").await?;
//! assert!(outcome.is_committed());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod backup;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod mode;
pub mod notify;
pub mod recovery;
pub mod registry;
pub mod store;
pub mod types;

pub use backup::{BackupManager, Snapshot};
pub use coordinator::{CoordinatorSettings, TransitionCoordinator, STARTUP_ORIGIN};
pub use error::{
    ActivationFailure, BackupError, ModeError, NotifyError, RegistryError, StageError,
    TransitionError,
};
pub use lock::{TransitionLock, TransitionPermit};
pub use mode::{ActivationContext, Mode, StaticMode};
pub use notify::{ChannelSink, Notification, NotificationSink, NullSink, TracingSink};
pub use recovery::{RecoveryLadder, RecoveryReport, RecoveryStage, StageAttempt};
pub use registry::{ModeRegistry, ModeRegistryBuilder};
pub use store::{ActiveMode, ModeStateStore};
pub use types::{
    CallerContext, Capabilities, ModeDescriptor, ModeId, ModeInfo, ModeState, ModeSummary,
    Severity, TransitionId, TransitionOutcome, TransitionRecord, TransitionRequest,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Cortex Core
    pub use crate::{
        ActivationContext, Capabilities, Mode, ModeDescriptor, ModeError, ModeId, ModeRegistry,
        ModeState, NotificationSink, Severity, StaticMode, TransitionCoordinator,
        TransitionError, TransitionOutcome, TransitionRequest,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
