//! Mode registry
//!
//! Provides [`ModeRegistry`], the catalog of known modes plus the designated
//! safe mode. Populated once through [`ModeRegistryBuilder`] at startup and
//! read-only afterwards.

use crate::error::RegistryError;
use crate::mode::Mode;
use crate::types::{ModeDescriptor, ModeId};
use indexmap::IndexMap;
use std::sync::Arc;

/// Startup-time builder for [`ModeRegistry`]
#[derive(Debug, Default)]
pub struct ModeRegistryBuilder {
    modes: IndexMap<ModeId, Arc<dyn Mode>>,
    safe_mode: Option<ModeId>,
}

impl ModeRegistryBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mode
    ///
    /// # Errors
    /// - `RegistryError::DuplicateMode` if the identifier already exists
    pub fn register(&mut self, mode: Arc<dyn Mode>) -> Result<&mut Self, RegistryError> {
        let id = mode.id().clone();
        if self.modes.contains_key(&id) {
            return Err(RegistryError::DuplicateMode(id));
        }
        tracing::debug!(mode = %id, "registered mode");
        self.modes.insert(id, mode);
        Ok(self)
    }

    /// Register a mode, consuming and returning the builder
    ///
    /// # Errors
    /// - `RegistryError::DuplicateMode` if the identifier already exists
    pub fn with_mode(mut self, mode: Arc<dyn Mode>) -> Result<Self, RegistryError> {
        self.register(mode)?;
        Ok(self)
    }

    /// Designate the safe/default mode
    #[inline]
    #[must_use]
    pub fn safe_mode(mut self, id: impl Into<ModeId>) -> Self {
        self.safe_mode = Some(id.into());
        self
    }

    /// Designate the safe/default mode in place
    #[inline]
    pub fn set_safe_mode(&mut self, id: impl Into<ModeId>) -> &mut Self {
        self.safe_mode = Some(id.into());
        self
    }

    /// Freeze into a registry
    ///
    /// # Errors
    /// - `RegistryError::MissingSafeMode` if none designated
    /// - `RegistryError::SafeModeNotRegistered` if the designated mode is absent
    /// - `RegistryError::SafeModeRequiresNetwork` if the safe mode has external dependencies
    pub fn build(self) -> Result<ModeRegistry, RegistryError> {
        let safe_mode = self.safe_mode.ok_or(RegistryError::MissingSafeMode)?;
        let mode = self
            .modes
            .get(&safe_mode)
            .ok_or_else(|| RegistryError::SafeModeNotRegistered(safe_mode.clone()))?;

        if !mode.descriptor().capabilities.is_dependency_free() {
            return Err(RegistryError::SafeModeRequiresNetwork(safe_mode));
        }

        tracing::info!(modes = self.modes.len(), safe_mode = %safe_mode, "mode registry ready");
        Ok(ModeRegistry {
            modes: self.modes,
            safe_mode,
        })
    }
}

/// Catalog of modes, immutable after startup
#[derive(Debug)]
pub struct ModeRegistry {
    modes: IndexMap<ModeId, Arc<dyn Mode>>,
    safe_mode: ModeId,
}

impl ModeRegistry {
    /// Start building a registry
    #[inline]
    #[must_use]
    pub fn builder() -> ModeRegistryBuilder {
        ModeRegistryBuilder::new()
    }

    /// Look up a mode by identifier
    ///
    /// # Errors
    /// - `RegistryError::UnknownMode` if absent
    pub fn lookup(&self, id: &ModeId) -> Result<Arc<dyn Mode>, RegistryError> {
        self.modes
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownMode(id.clone()))
    }

    /// The designated fallback mode
    #[must_use]
    pub fn safe_mode(&self) -> Arc<dyn Mode> {
        // Presence is checked by the builder.
        Arc::clone(&self.modes[&self.safe_mode])
    }

    /// Identifier of the designated fallback mode
    #[inline]
    #[must_use]
    pub fn safe_mode_id(&self) -> &ModeId {
        &self.safe_mode
    }

    /// Check if a mode is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &ModeId) -> bool {
        self.modes.contains_key(id)
    }

    /// Identifiers in registration order
    pub fn ids(&self) -> impl Iterator<Item = &ModeId> {
        self.modes.keys()
    }

    /// Descriptors in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &ModeDescriptor> {
        self.modes.values().map(|m| m.descriptor())
    }

    /// Number of registered modes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Check if registry is empty (never true after `build`)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::StaticMode;
    use crate::types::Capabilities;

    fn mode(id: &str) -> Arc<dyn Mode> {
        Arc::new(StaticMode::new(ModeDescriptor::new(id)))
    }

    fn network_mode(id: &str) -> Arc<dyn Mode> {
        Arc::new(StaticMode::new(
            ModeDescriptor::new(id).with_capabilities(Capabilities::none().with_network()),
        ))
    }

    #[test]
    fn registry_build_and_lookup() {
        let registry = ModeRegistry::builder()
            .with_mode(mode("idle"))
            .unwrap()
            .with_mode(mode("navigate"))
            .unwrap()
            .safe_mode("idle")
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&"navigate".into()));
        assert_eq!(registry.safe_mode_id().as_str(), "idle");
        assert_eq!(registry.safe_mode().id().as_str(), "idle");
        assert!(registry.lookup(&"navigate".into()).is_ok());
    }

    #[test]
    fn registry_keeps_registration_order() {
        let registry = ModeRegistry::builder()
            .with_mode(mode("zeta"))
            .unwrap()
            .with_mode(mode("alpha"))
            .unwrap()
            .safe_mode("alpha")
            .build()
            .unwrap();

        let ids: Vec<_> = registry.ids().map(ModeId::as_str).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);
    }

    #[test]
    fn registry_rejects_duplicate() {
        let mut builder = ModeRegistry::builder();
        builder.register(mode("idle")).unwrap();
        let err = builder.register(mode("idle")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateMode("idle".into()));
    }

    #[test]
    fn registry_lookup_unknown() {
        let registry = ModeRegistry::builder()
            .with_mode(mode("idle"))
            .unwrap()
            .safe_mode("idle")
            .build()
            .unwrap();

        let err = registry.lookup(&"fly".into()).unwrap_err();
        assert_eq!(err, RegistryError::UnknownMode("fly".into()));
    }

    #[test]
    fn registry_requires_safe_mode() {
        let err = ModeRegistry::builder()
            .with_mode(mode("idle"))
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::MissingSafeMode);
        assert!(err.is_configuration());
    }

    #[test]
    fn registry_safe_mode_must_be_registered() {
        let err = ModeRegistry::builder()
            .with_mode(mode("idle"))
            .unwrap()
            .safe_mode("rest")
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::SafeModeNotRegistered("rest".into()));
    }

    #[test]
    fn registry_safe_mode_must_be_dependency_free() {
        let err = ModeRegistry::builder()
            .with_mode(network_mode("cloud"))
            .unwrap()
            .safe_mode("cloud")
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::SafeModeRequiresNetwork("cloud".into()));
    }
}
