//! Mode contract
//!
//! A mode is selected by identifier lookup and driven through two routines:
//! activation produces the mode's initial state, deactivation consumes it.

use crate::error::ModeError;
use crate::types::{ModeDescriptor, ModeId, ModeState, TransitionId};
use async_trait::async_trait;
use std::fmt::Debug;

/// Context handed to an activation routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationContext {
    /// Transition being executed
    pub transition: TransitionId,
    /// Mode active before this transition
    pub from: Option<ModeId>,
    /// Caller origin label
    pub origin: String,
    /// Activation is part of recovery (safe mode engagement)
    pub recovery: bool,
}

/// Behavioral unit the agent can run
#[async_trait]
pub trait Mode: Send + Sync + Debug {
    /// Immutable description
    fn descriptor(&self) -> &ModeDescriptor;

    /// Mode identifier
    fn id(&self) -> &ModeId {
        &self.descriptor().id
    }

    /// Bring the mode up and produce its initial state
    ///
    /// Any error is treated as a failed transition.
    async fn activate(&self, ctx: ActivationContext) -> Result<ModeState, ModeError>;

    /// Tear the mode down, consuming its state
    ///
    /// Errors are logged by the coordinator and never block the exit.
    async fn deactivate(&self, state: ModeState) -> Result<(), ModeError> {
        let _ = state;
        Ok(())
    }
}

/// Dependency-free mode whose activation yields a fixed initial state
#[derive(Debug, Clone)]
pub struct StaticMode {
    descriptor: ModeDescriptor,
    initial_state: ModeState,
}

impl StaticMode {
    /// Create static mode with empty state
    #[inline]
    #[must_use]
    pub fn new(descriptor: ModeDescriptor) -> Self {
        Self {
            descriptor,
            initial_state: ModeState::empty(),
        }
    }

    /// With initial state
    #[inline]
    #[must_use]
    pub fn with_state(mut self, state: ModeState) -> Self {
        self.initial_state = state;
        self
    }
}

#[async_trait]
impl Mode for StaticMode {
    fn descriptor(&self) -> &ModeDescriptor {
        &self.descriptor
    }

    async fn activate(&self, _ctx: ActivationContext) -> Result<ModeState, ModeError> {
        if self.descriptor.capabilities.requires_network {
            return Err(ModeError::activation(format!(
                "static mode '{}' cannot satisfy a network requirement",
                self.descriptor.id
            )));
        }
        Ok(self.initial_state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Capabilities;
    use serde_json::json;

    fn ctx() -> ActivationContext {
        ActivationContext {
            transition: TransitionId::new(),
            from: None,
            origin: "test".to_string(),
            recovery: false,
        }
    }

    #[tokio::test]
    async fn static_mode_yields_initial_state() {
        let mode = StaticMode::new(ModeDescriptor::new("idle"))
            .with_state(ModeState::new(json!({"speed": 0})));

        let state = mode.activate(ctx()).await.unwrap();
        assert_eq!(state.value(), &json!({"speed": 0}));
        assert_eq!(mode.id().as_str(), "idle");
        assert!(mode.deactivate(state).await.is_ok());
    }

    #[tokio::test]
    async fn static_mode_rejects_network_requirement() {
        let mode = StaticMode::new(
            ModeDescriptor::new("remote").with_capabilities(Capabilities::none().with_network()),
        );

        let err = mode.activate(ctx()).await.unwrap_err();
        assert!(matches!(err, ModeError::Activation(_)));
    }
}
