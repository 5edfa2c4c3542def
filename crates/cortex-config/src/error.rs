//! Configuration errors

use crate::validate::ValidationReport;
use cortex_core::RegistryError;
use std::path::PathBuf;

/// Errors from loading or applying a mode system configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON syntax or shape error
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Extension is neither TOML nor JSON
    #[error("unsupported configuration format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    /// Configuration parsed but failed validation
    #[error("configuration invalid: {0}")]
    Invalid(ValidationReport),

    /// Registry rejected the modes
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ConfigError {
    /// Check if the file itself could not be parsed
    #[inline]
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Toml(_) | Self::Json(_))
    }
}
