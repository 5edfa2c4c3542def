//! `validate` and `modes` subcommands

use anyhow::Context;
use cortex_config::{ConfigError, ModeSystemConfig, ValidationReport};
use cortex_core::NullSink;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

pub(crate) fn validate_file(path: &Path, verbose: bool) -> anyhow::Result<ExitCode> {
    println!("Validating configuration file: {}", path.display());
    println!("{}", "=".repeat(60));

    let valid = print_result(&cortex_config::validate_file(path), verbose, "");
    Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

pub(crate) fn validate_directory(dir: &Path, verbose: bool) -> anyhow::Result<ExitCode> {
    println!("Validating all configuration files in: {}", dir.display());
    println!("{}", "=".repeat(60));

    let results = cortex_config::validate_directory(dir)
        .with_context(|| format!("cannot scan {}", dir.display()))?;
    if results.is_empty() {
        println!("No configuration files found in {}", dir.display());
        return Ok(ExitCode::SUCCESS);
    }

    let total = results.len();
    let mut valid = 0;
    for (path, result) in &results {
        let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        println!("\n{name}:");
        if print_result(result, verbose, "  ") {
            valid += 1;
        }
    }

    println!("\nSummary: {valid}/{total} configurations are valid");
    Ok(if valid == total { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn print_result(result: &Result<ValidationReport, ConfigError>, verbose: bool, indent: &str) -> bool {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            println!("{indent}Cannot load configuration: {e}");
            return false;
        }
    };

    if report.is_valid() {
        println!("{indent}Configuration is valid");
        if verbose {
            for warning in report.warnings() {
                println!("{indent}  - {warning}");
            }
        }
        return true;
    }

    println!("{indent}Configuration has errors:");
    for issue in &report.issues {
        println!("{indent}  - {issue}");
    }
    let suggestions = report.suggestions();
    if !suggestions.is_empty() {
        println!("\n{indent}Suggestions:");
        for suggestion in suggestions {
            println!("{indent}  - {suggestion}");
        }
    }
    false
}

pub(crate) fn list_modes(path: &Path, json: bool) -> anyhow::Result<ExitCode> {
    let config = ModeSystemConfig::from_path(path)
        .with_context(|| format!("cannot load {}", path.display()))?;
    let coordinator = config
        .build_static_coordinator(Arc::new(NullSink))
        .with_context(|| format!("{} is not a usable configuration", path.display()))?;
    let info = coordinator.mode_info();

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Safe mode: {}", info.safe_mode);
    println!();
    for mode in &info.modes {
        let marker = if mode.id == info.safe_mode { "*" } else { " " };
        let network = if mode.requires_network { " [network]" } else { "" };
        println!("{marker} {:<16} {}{network}", mode.id.as_str(), mode.display_name);
        if !mode.description.is_empty() {
            println!("    {}", mode.description);
        }
    }
    Ok(ExitCode::SUCCESS)
}
