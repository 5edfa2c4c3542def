//! Cortex Config - mode system configuration
//!
//! Loads a mode system description from TOML or JSON, validates it with
//! actionable suggestions, and builds the registry and coordinator settings.
//!
//! ```toml
//! default_mode = "idle"
//! transition_announcement = true
//!
//! [modes.idle]
//! display_name = "Idle"
//! entry_message = "Standing by"
//!
//! [modes.conversation]
//! requires_network = true
//!
//! [upstream]
//! max_attempts = 3
//! ```

mod build;
pub mod error;
pub mod model;
pub mod validate;

pub use error::ConfigError;
pub use model::{ConfigFormat, ModeConfig, ModeSystemConfig, UpstreamConfig, DEFAULT_HISTORY_LIMIT};
pub use validate::{
    validate_directory, validate_file, IssueLevel, ValidationIssue, ValidationReport,
};
