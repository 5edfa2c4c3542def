//! Core types for the mode runtime
//!
//! Defines the fundamental values passed between components:
//! - Mode identifiers, descriptors and capability flags
//! - Opaque mode state payloads
//! - Transition requests, outcomes and history records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use ulid::Ulid;

/// Unique mode identifier (e.g. `idle`, `navigate`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeId(String);

impl ModeId {
    /// Create a mode identifier
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ModeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&ModeId> for ModeId {
    fn from(value: &ModeId) -> Self {
        value.clone()
    }
}

impl AsRef<str> for ModeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unique transition identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub Ulid);

impl TransitionId {
    /// Generate new transition ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TransitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability flags declared by a mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capabilities {
    /// Activation reaches upstream services
    #[serde(default)]
    pub requires_network: bool,
}

impl Capabilities {
    /// No external dependencies
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Mark as requiring network access
    #[inline]
    #[must_use]
    pub fn with_network(mut self) -> Self {
        self.requires_network = true;
        self
    }

    /// True if activation can succeed without external services
    #[inline]
    #[must_use]
    pub fn is_dependency_free(&self) -> bool {
        !self.requires_network
    }
}

/// Live data of the active mode
///
/// The payload is opaque to the coordinator. It is handed to mode routines
/// by value and never shared as a live handle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeState(serde_json::Value);

impl ModeState {
    /// Wrap a structured payload
    #[inline]
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Empty (null) payload
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self(serde_json::Value::Null)
    }

    /// Borrow the payload
    #[inline]
    #[must_use]
    pub fn value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Take the payload
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }

    /// Canonical byte encoding, stable across clones
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Maps serialize in key order, so equal states encode identically.
        serde_json::to_vec(&self.0).unwrap_or_default()
    }
}

impl From<serde_json::Value> for ModeState {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Immutable description of a registered mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeDescriptor {
    /// Mode identifier
    pub id: ModeId,
    /// Human-readable name
    pub display_name: String,
    /// Short description
    pub description: String,
    /// Capability flags
    pub capabilities: Capabilities,
    /// Announced when the mode is entered
    pub entry_message: Option<String>,
    /// Announced when the mode is left
    pub exit_message: Option<String>,
}

impl ModeDescriptor {
    /// Create descriptor; display name defaults to the identifier
    #[must_use]
    pub fn new(id: impl Into<ModeId>) -> Self {
        let id = id.into();
        Self {
            display_name: id.to_string(),
            id,
            description: String::new(),
            capabilities: Capabilities::none(),
            entry_message: None,
            exit_message: None,
        }
    }

    /// With display name
    #[inline]
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With capabilities
    #[inline]
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// With entry announcement
    #[inline]
    #[must_use]
    pub fn with_entry_message(mut self, message: impl Into<String>) -> Self {
        self.entry_message = Some(message.into());
        self
    }

    /// With exit announcement
    #[inline]
    #[must_use]
    pub fn with_exit_message(mut self, message: impl Into<String>) -> Self {
        self.exit_message = Some(message.into());
        self
    }
}

/// Who asked for a transition, and when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerContext {
    /// Origin label (`manual`, `startup`, `perception`, ...)
    pub origin: String,
    /// Request time
    pub requested_at: DateTime<Utc>,
}

impl CallerContext {
    /// Create context stamped now
    #[must_use]
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            requested_at: Utc::now(),
        }
    }

    /// Manual (user command) origin
    #[inline]
    #[must_use]
    pub fn manual() -> Self {
        Self::new("manual")
    }
}

/// A single transition request, consumed by one coordinator invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    /// Request identifier
    pub id: TransitionId,
    /// Target mode
    pub target: ModeId,
    /// Initiating caller
    pub context: CallerContext,
}

impl TransitionRequest {
    /// Create request with a manual caller context
    #[must_use]
    pub fn new(target: impl Into<ModeId>) -> Self {
        Self {
            id: TransitionId::new(),
            target: target.into(),
            context: CallerContext::manual(),
        }
    }

    /// With caller context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: CallerContext) -> Self {
        self.context = context;
        self
    }

    /// With origin label
    #[inline]
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.context = CallerContext::new(origin);
        self
    }
}

/// Terminal result of one transition request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "mode", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// Target mode is now the durable current mode
    Committed(ModeId),
    /// Activation failed; previous known-good mode restored
    RolledBack(ModeId),
    /// Activation and rollback failed; safe mode engaged
    SafeModeEngaged,
    /// All recovery failed; manual restart required
    CriticalHalt,
}

impl TransitionOutcome {
    /// True for `Committed`
    #[inline]
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// True if recovery ran
    #[inline]
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::RolledBack(_) | Self::SafeModeEngaged)
    }

    /// True if a human must intervene
    #[inline]
    #[must_use]
    pub fn requires_human(&self) -> bool {
        matches!(self, Self::CriticalHalt)
    }
}

impl fmt::Display for TransitionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Committed(mode) => write!(f, "committed({mode})"),
            Self::RolledBack(mode) => write!(f, "rolled_back({mode})"),
            Self::SafeModeEngaged => f.write_str("safe_mode_engaged"),
            Self::CriticalHalt => f.write_str("critical_halt"),
        }
    }
}

/// Notification severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational
    Info,
    /// Degraded but running
    Warning,
    /// Human intervention required
    Critical,
}

/// History entry for a finished transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Request identifier
    pub id: TransitionId,
    /// Origin label of the caller
    pub origin: String,
    /// Mode current before the request
    pub from: Option<ModeId>,
    /// Requested mode
    pub target: ModeId,
    /// Terminal outcome
    pub outcome: TransitionOutcome,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration including recovery
    pub elapsed: Duration,
}

/// Catalog entry view for callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSummary {
    /// Mode identifier
    pub id: ModeId,
    /// Human-readable name
    pub display_name: String,
    /// Short description
    pub description: String,
    /// Activation reaches upstream services
    pub requires_network: bool,
    /// Currently active
    pub is_current: bool,
}

/// Snapshot of the runtime's mode situation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeInfo {
    /// Current mode, if any settled yet
    pub current: Option<ModeId>,
    /// Mode current before the last settled transition
    pub previous: Option<ModeId>,
    /// Designated safe mode
    pub safe_mode: ModeId,
    /// Coordinator refuses further transitions
    pub halted: bool,
    /// A transition is executing right now
    pub transition_in_progress: bool,
    /// All registered modes, in registration order
    pub modes: Vec<ModeSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mode_id_display_and_conversions() {
        let id = ModeId::from("navigate");
        assert_eq!(id.to_string(), "navigate");
        assert_eq!(id.as_str(), "navigate");
        assert_eq!(ModeId::from(String::from("navigate")), id);
    }

    #[test]
    fn transition_id_generation() {
        let a = TransitionId::new();
        let b = TransitionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn canonical_bytes_ignore_insertion_order() {
        let a = ModeState::new(json!({"b": 2, "a": 1}));
        let b = ModeState::new(json!({"a": 1, "b": 2}));
        assert_eq!(a.canonical_bytes(), b.canonical_bytes());
    }

    #[test]
    fn descriptor_builder() {
        let desc = ModeDescriptor::new("navigate")
            .with_display_name("Navigate")
            .with_capabilities(Capabilities::none().with_network())
            .with_entry_message("Navigating");

        assert_eq!(desc.display_name, "Navigate");
        assert!(!desc.capabilities.is_dependency_free());
        assert_eq!(desc.entry_message.as_deref(), Some("Navigating"));
        assert!(desc.exit_message.is_none());
    }

    #[test]
    fn outcome_predicates() {
        assert!(TransitionOutcome::Committed("idle".into()).is_committed());
        assert!(TransitionOutcome::RolledBack("idle".into()).is_recovered());
        assert!(TransitionOutcome::SafeModeEngaged.is_recovered());
        assert!(TransitionOutcome::CriticalHalt.requires_human());
        assert!(!TransitionOutcome::SafeModeEngaged.requires_human());
    }

    #[test]
    fn outcome_serializes_tagged() {
        let value = serde_json::to_value(TransitionOutcome::RolledBack("idle".into())).unwrap();
        assert_eq!(value, json!({"outcome": "rolled_back", "mode": "idle"}));

        let value = serde_json::to_value(TransitionOutcome::CriticalHalt).unwrap();
        assert_eq!(value, json!({"outcome": "critical_halt"}));
    }

    #[test]
    fn request_with_origin() {
        let request = TransitionRequest::new("idle").with_origin("perception");
        assert_eq!(request.context.origin, "perception");
        assert_eq!(request.target.as_str(), "idle");
    }
}
