//! Configuration validation
//!
//! Validation never stops at the first problem: every issue is collected
//! into a [`ValidationReport`], each with a suggested fix.

use crate::error::ConfigError;
use crate::model::{ConfigFormat, ModeSystemConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

static MODE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").expect("mode id pattern compiles"));

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueLevel {
    /// Configuration can still be used
    Warning,
    /// Configuration must not be used
    Error,
}

impl fmt::Display for IssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueLevel::Warning => f.write_str("warning"),
            IssueLevel::Error => f.write_str("error"),
        }
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Severity
    pub level: IssueLevel,
    /// Dotted path of the offending field
    pub field: String,
    /// What is wrong
    pub message: String,
    /// How to fix it
    pub suggestion: String,
}

impl ValidationIssue {
    fn error(field: impl Into<String>, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Error,
            field: field.into(),
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    fn warning(field: impl Into<String>, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            level: IssueLevel::Warning,
            ..Self::error(field, message, suggestion)
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.level, self.field, self.message)
    }
}

/// All issues found in one configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Issues in discovery order
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// True when no error-level issue exists
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Error-level issues
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.level == IssueLevel::Error)
    }

    /// Warning-level issues
    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.level == IssueLevel::Warning)
    }

    /// Distinct suggestions, in order
    #[must_use]
    pub fn suggestions(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for issue in &self.issues {
            if !seen.contains(&issue.suggestion.as_str()) {
                seen.push(issue.suggestion.as_str());
            }
        }
        seen
    }

    fn push(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = self.errors().count();
        let warnings = self.warnings().count();
        write!(f, "{errors} error(s), {warnings} warning(s)")?;
        if let Some(first) = self.errors().next() {
            write!(f, "; first: {first}")?;
        }
        Ok(())
    }
}

impl ModeSystemConfig {
    /// Check the configuration and report every issue found
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.modes.is_empty() {
            report.push(ValidationIssue::error(
                "modes",
                "no modes configured",
                "Add at least one [modes.<id>] section, e.g. a dependency-free 'idle' mode",
            ));
        }

        self.check_default_mode(&mut report);
        self.check_modes(&mut report);
        self.check_upstream(&mut report);

        if self.history_limit == 0 {
            report.push(ValidationIssue::error(
                "history_limit",
                "history_limit must be greater than zero",
                "Remove history_limit to use the default of 64",
            ));
        }

        report
    }

    fn check_default_mode(&self, report: &mut ValidationReport) {
        let Some(default) = self.default_mode.as_deref() else {
            report.push(ValidationIssue::error(
                "default_mode",
                "no default_mode designated",
                "Set default_mode to a mode that works offline; it is the startup and safe mode",
            ));
            return;
        };

        match self.modes.get(default) {
            None => {
                let known: Vec<_> = self.modes.keys().map(String::as_str).collect();
                report.push(ValidationIssue::error(
                    "default_mode",
                    format!("default_mode '{default}' is not a configured mode"),
                    if known.is_empty() {
                        format!("Add a [modes.{default}] section")
                    } else {
                        format!("Use one of: {}", known.join(", "))
                    },
                ));
            }
            Some(mode) if mode.requires_network => {
                report.push(ValidationIssue::error(
                    format!("modes.{default}.requires_network"),
                    format!("default_mode '{default}' requires network access"),
                    "The safe mode must activate without upstream services; pick an offline mode or set requires_network = false",
                ));
            }
            Some(_) => {}
        }
    }

    fn check_modes(&self, report: &mut ValidationReport) {
        for (id, mode) in &self.modes {
            if !MODE_ID.is_match(id) {
                report.push(ValidationIssue::error(
                    format!("modes.{id}"),
                    format!("mode identifier '{id}' is malformed"),
                    "Use lowercase letters, digits, '_' or '-', starting with a letter",
                ));
            }

            if mode.display_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                report.push(ValidationIssue::warning(
                    format!("modes.{id}.display_name"),
                    "display_name is blank",
                    "Remove display_name to fall back to the identifier",
                ));
            }

            for (name, message) in [
                ("entry_message", &mode.entry_message),
                ("exit_message", &mode.exit_message),
            ] {
                if message.as_deref().is_some_and(|m| m.trim().is_empty()) {
                    report.push(ValidationIssue::warning(
                        format!("modes.{id}.{name}"),
                        format!("{name} is blank"),
                        "Remove the message or give it text; blank announcements are skipped by listeners",
                    ));
                }
            }
        }

        if self.transition_announcement
            && self
                .modes
                .values()
                .all(|m| m.entry_message.is_none() && m.exit_message.is_none())
            && !self.modes.is_empty()
        {
            report.push(ValidationIssue::warning(
                "transition_announcement",
                "announcements enabled but no mode defines entry_message or exit_message",
                "Add entry_message/exit_message to modes or disable transition_announcement",
            ));
        }
    }

    fn check_upstream(&self, report: &mut ValidationReport) {
        let upstream = &self.upstream;
        if upstream.max_attempts == 0 {
            report.push(ValidationIssue::error(
                "upstream.max_attempts",
                "max_attempts must be at least 1",
                "Use 3 attempts unless the upstream is known to be flaky",
            ));
        }
        if !(upstream.backoff_factor.is_finite() && upstream.backoff_factor >= 1.0) {
            report.push(ValidationIssue::error(
                "upstream.backoff_factor",
                format!("backoff_factor {} must be >= 1.0", upstream.backoff_factor),
                "Use 2.0 for exponential backoff or 1.0 for constant delay",
            ));
        }
        if upstream.base_timeout_ms == 0 {
            report.push(ValidationIssue::error(
                "upstream.base_timeout_ms",
                "base_timeout_ms must be greater than zero",
                "Use 10000 (10 seconds) as a starting point",
            ));
        }
    }
}

/// Load and validate one file
///
/// # Errors
/// - Any [`ConfigError`] from [`ModeSystemConfig::from_path`]
pub fn validate_file(path: impl AsRef<Path>) -> Result<ValidationReport, ConfigError> {
    let config = ModeSystemConfig::from_path(path)?;
    Ok(config.validate())
}

/// Validate every `.toml` / `.json` file in a directory, sorted by path
///
/// # Errors
/// - `ConfigError::Io` if the directory cannot be listed
pub fn validate_directory(
    dir: impl AsRef<Path>,
) -> Result<Vec<(PathBuf, Result<ValidationReport, ConfigError>)>, ConfigError> {
    let dir = dir.as_ref();
    let io_err = |source: std::io::Error| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && ConfigFormat::from_path(&path).is_some() {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| {
            let result = validate_file(&path);
            (path, result)
        })
        .collect())
}
