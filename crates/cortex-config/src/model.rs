//! Configuration model and file loading

use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of transition records retained
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// File formats understood by [`ModeSystemConfig::from_path`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.json` / `.json5` (plain JSON only)
    Json,
}

impl ConfigFormat {
    /// Detect format from the file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "json" | "json5" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Complete mode system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeSystemConfig {
    /// Safe/default mode, entered at startup
    #[serde(default)]
    pub default_mode: Option<String>,

    /// Announce entry/exit messages on committed transitions
    #[serde(default)]
    pub transition_announcement: bool,

    /// Transition records retained
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Modes keyed by identifier, in file order
    #[serde(default)]
    pub modes: IndexMap<String, ModeConfig>,

    /// Retry policy for upstream-backed modes
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for ModeSystemConfig {
    fn default() -> Self {
        Self {
            default_mode: None,
            transition_announcement: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
            modes: IndexMap::new(),
            upstream: UpstreamConfig::default(),
        }
    }
}

/// One mode entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Human-readable name, defaults to the identifier
    #[serde(default)]
    pub display_name: Option<String>,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Announced when the mode is entered
    #[serde(default)]
    pub entry_message: Option<String>,

    /// Announced when the mode is left
    #[serde(default)]
    pub exit_message: Option<String>,

    /// Activation reaches an upstream service
    #[serde(default)]
    pub requires_network: bool,

    /// State produced by activation
    #[serde(default)]
    pub initial_state: serde_json::Value,
}

/// Upstream retry policy in file units
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Attempts per call
    pub max_attempts: u32,
    /// Delay multiplier per failed attempt
    pub backoff_factor: f64,
    /// Delay after the first failed attempt
    pub base_delay_ms: u64,
    /// Timeout of the first attempt
    pub base_timeout_ms: u64,
    /// Timeout added per attempt
    pub timeout_step_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 2.0,
            base_delay_ms: 1_000,
            base_timeout_ms: 10_000,
            timeout_step_ms: 2_000,
        }
    }
}

impl ModeSystemConfig {
    /// Parse TOML text
    ///
    /// # Errors
    /// - `ConfigError::Toml` on syntax or shape errors
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Parse JSON text
    ///
    /// # Errors
    /// - `ConfigError::Json` on syntax or shape errors
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a `.toml` or `.json` file
    ///
    /// Parsing only; call [`Self::validate`] to check the content.
    ///
    /// # Errors
    /// - `ConfigError::UnsupportedFormat` for other extensions
    /// - `ConfigError::Io` if the file cannot be read
    /// - `ConfigError::Toml` / `ConfigError::Json` on parse errors
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %path.display(), ?format, "loading mode configuration");
        match format {
            ConfigFormat::Toml => Self::from_toml_str(&text),
            ConfigFormat::Json => Self::from_json_str(&text),
        }
    }

    /// With default mode
    #[inline]
    #[must_use]
    pub fn with_default_mode(mut self, id: impl Into<String>) -> Self {
        self.default_mode = Some(id.into());
        self
    }

    /// With mode entry
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, id: impl Into<String>, mode: ModeConfig) -> Self {
        self.modes.insert(id.into(), mode);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn toml_defaults_apply() {
        let config = ModeSystemConfig::from_toml_str(
            r#"
            default_mode = "idle"

            [modes.idle]
            description = "Robot at rest"
            "#,
        )
        .unwrap();

        assert_eq!(config.default_mode.as_deref(), Some("idle"));
        assert!(!config.transition_announcement);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert_eq!(config.upstream, UpstreamConfig::default());
        assert!(config.modes["idle"].display_name.is_none());
        assert!(config.modes["idle"].initial_state.is_null());
    }

    #[test]
    fn toml_initial_state_is_structured() {
        let config = ModeSystemConfig::from_toml_str(
            r#"
            default_mode = "idle"

            [modes.navigate]
            requires_network = false
            initial_state = { speed = 0.5, waypoints = [1, 2] }

            [modes.idle]
            "#,
        )
        .unwrap();

        assert_eq!(
            config.modes["navigate"].initial_state,
            json!({"speed": 0.5, "waypoints": [1, 2]})
        );
        let order: Vec<_> = config.modes.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["navigate", "idle"]);
    }

    #[test]
    fn json_partial_upstream() {
        let config = ModeSystemConfig::from_json_str(
            r#"{"default_mode": "idle", "modes": {"idle": {}}, "upstream": {"max_attempts": 5}}"#,
        )
        .unwrap();

        assert_eq!(config.upstream.max_attempts, 5);
        assert_eq!(config.upstream.base_timeout_ms, 10_000);
    }

    #[test]
    fn format_detection() {
        assert_eq!(ConfigFormat::from_path(Path::new("a.toml")), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_path(Path::new("a.json5")), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_path(Path::new("a.yaml")), None);
        assert_eq!(ConfigFormat::from_path(Path::new("noext")), None);
    }
}
