//! Loading, validating and applying configuration files

use cortex_config::{validate_directory, validate_file, ConfigError, ModeSystemConfig};
use cortex_core::{NullSink, TransitionOutcome};
use pretty_assertions::assert_eq;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const ROBOT_TOML: &str = r#"
default_mode = "idle"
transition_announcement = true
history_limit = 16

[modes.idle]
display_name = "Idle"
description = "Standing by"
entry_message = "Standing by"

[modes.navigate]
display_name = "Navigate"
initial_state = { speed = 0.5 }
exit_message = "Stopping navigation"

[modes.conversation]
requires_network = true

[upstream]
max_attempts = 2
base_delay_ms = 10
"#;

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_load_toml_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "robot.toml", ROBOT_TOML);

    let config = ModeSystemConfig::from_path(&path).unwrap();

    assert_eq!(config.default_mode.as_deref(), Some("idle"));
    assert_eq!(config.modes.len(), 3);
    assert_eq!(config.retry_policy().max_attempts, 2);
    let settings = config.coordinator_settings();
    assert!(settings.announce_transitions);
    assert_eq!(settings.history_limit, 16);
}

#[test]
fn test_json_and_toml_agree() {
    let dir = TempDir::new().unwrap();
    let toml_path = write(&dir, "a.toml", "default_mode = \"idle\"\n[modes.idle]\ndescription = \"rest\"\n");
    let json_path = write(
        &dir,
        "a.json",
        r#"{"default_mode": "idle", "modes": {"idle": {"description": "rest"}}}"#,
    );

    assert_eq!(
        ModeSystemConfig::from_path(toml_path).unwrap(),
        ModeSystemConfig::from_path(json_path).unwrap()
    );
}

#[test]
fn test_unsupported_and_missing_files() {
    let dir = TempDir::new().unwrap();
    let yaml = write(&dir, "robot.yaml", "default_mode: idle");

    assert!(matches!(
        ModeSystemConfig::from_path(yaml),
        Err(ConfigError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        ModeSystemConfig::from_path(dir.path().join("absent.toml")),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn test_syntax_error_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "broken.json", "{\"default_mode\": ");

    let err = validate_file(path).unwrap_err();

    assert!(err.is_parse());
}

#[test]
fn test_validate_directory_reports_each_file() {
    let dir = TempDir::new().unwrap();
    write(&dir, "b_robot.toml", ROBOT_TOML);
    write(&dir, "a_bad.json", r#"{"default_mode": "conversation", "modes": {"conversation": {"requires_network": true}}}"#);
    write(&dir, "notes.txt", "not a config");

    let results = validate_directory(dir.path()).unwrap();

    let names: Vec<_> = results
        .iter()
        .map(|(p, _)| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a_bad.json", "b_robot.toml"]);
    assert!(!results[0].1.as_ref().unwrap().is_valid());
    assert!(results[1].1.as_ref().unwrap().is_valid());
}

#[tokio::test]
async fn test_static_coordinator_from_file() {
    let dir = TempDir::new().unwrap();
    let config = ModeSystemConfig::from_path(write(&dir, "robot.toml", ROBOT_TOML)).unwrap();
    let coordinator = config.build_static_coordinator(Arc::new(NullSink)).unwrap();

    assert_eq!(
        coordinator.start().await.unwrap(),
        TransitionOutcome::Committed("idle".into())
    );
    assert_eq!(
        coordinator.request_transition("navigate").await.unwrap(),
        TransitionOutcome::Committed("navigate".into())
    );
    let (_, state) = coordinator.current().unwrap();
    assert_eq!(state.value()["speed"], 0.5);

    // No upstream is wired into the static registry
    assert_eq!(
        coordinator.request_transition("conversation").await.unwrap(),
        TransitionOutcome::RolledBack("navigate".into())
    );
}
