//! Turning a validated configuration into runtime objects

use crate::error::ConfigError;
use crate::model::{ModeConfig, ModeSystemConfig, UpstreamConfig};
use cortex_core::{
    Capabilities, CoordinatorSettings, Mode, ModeDescriptor, ModeRegistry, ModeState,
    NotificationSink, StaticMode, TransitionCoordinator,
};
use cortex_upstream::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

impl ModeConfig {
    /// Descriptor for the mode registered under `id`
    #[must_use]
    pub fn descriptor(&self, id: &str) -> ModeDescriptor {
        let mut descriptor = ModeDescriptor::new(id).with_description(self.description.clone());
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.trim().is_empty()) {
            descriptor = descriptor.with_display_name(name);
        }
        if let Some(message) = self.entry_message.as_deref().filter(|m| !m.trim().is_empty()) {
            descriptor = descriptor.with_entry_message(message);
        }
        if let Some(message) = self.exit_message.as_deref().filter(|m| !m.trim().is_empty()) {
            descriptor = descriptor.with_exit_message(message);
        }
        if self.requires_network {
            descriptor = descriptor.with_capabilities(Capabilities::none().with_network());
        }
        descriptor
    }

    /// Configured initial state
    #[must_use]
    pub fn initial_state(&self) -> ModeState {
        ModeState::new(self.initial_state.clone())
    }
}

impl From<UpstreamConfig> for RetryPolicy {
    fn from(config: UpstreamConfig) -> Self {
        RetryPolicy::new()
            .with_max_attempts(config.max_attempts)
            .with_backoff_factor(config.backoff_factor)
            .with_base_delay(Duration::from_millis(config.base_delay_ms))
            .with_base_timeout(Duration::from_millis(config.base_timeout_ms))
            .with_timeout_step(Duration::from_millis(config.timeout_step_ms))
    }
}

impl ModeSystemConfig {
    /// Coordinator settings from the top-level keys
    #[must_use]
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings::new()
            .with_announcements(self.transition_announcement)
            .with_history_limit(self.history_limit)
    }

    /// Retry policy for upstream-backed modes
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.upstream.into()
    }

    /// Build a registry, letting `factory` decide the implementation of each mode
    ///
    /// # Errors
    /// - `ConfigError::Invalid` if validation reports errors
    /// - `ConfigError::Registry` if the registry rejects the result
    pub fn build_registry<F>(&self, mut factory: F) -> Result<ModeRegistry, ConfigError>
    where
        F: FnMut(ModeDescriptor, &ModeConfig) -> Arc<dyn Mode>,
    {
        let report = self.validate();
        if !report.is_valid() {
            return Err(ConfigError::Invalid(report));
        }
        for warning in report.warnings() {
            tracing::warn!(field = %warning.field, "{}", warning.message);
        }

        let mut builder = ModeRegistry::builder();
        for (id, mode) in &self.modes {
            builder.register(factory(mode.descriptor(id), mode))?;
        }
        if let Some(default) = &self.default_mode {
            builder.set_safe_mode(default.as_str());
        }
        let registry = builder.build()?;

        tracing::info!(
            modes = registry.len(),
            safe_mode = %registry.safe_mode_id(),
            "mode registry built"
        );
        Ok(registry)
    }

    /// Registry of [`StaticMode`]s yielding each mode's `initial_state`
    ///
    /// Network modes built this way always fail activation, since no
    /// upstream is wired in.
    ///
    /// # Errors
    /// Same as [`Self::build_registry`].
    pub fn build_static_registry(&self) -> Result<ModeRegistry, ConfigError> {
        self.build_registry(|descriptor, mode| {
            Arc::new(StaticMode::new(descriptor).with_state(mode.initial_state())) as Arc<dyn Mode>
        })
    }

    /// Coordinator over the static registry
    ///
    /// # Errors
    /// Same as [`Self::build_registry`].
    pub fn build_static_coordinator(
        &self,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<TransitionCoordinator, ConfigError> {
        let registry = self.build_static_registry()?;
        Ok(TransitionCoordinator::with_settings(
            registry,
            sink,
            self.coordinator_settings(),
        ))
    }
}
