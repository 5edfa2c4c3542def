//! `simulate` subcommand
//!
//! Builds a coordinator from a configuration, starts it, and runs a
//! sequence of transitions. Failures can be injected per mode, and
//! `--offline` makes every upstream call fail.

use anyhow::Context;
use async_trait::async_trait;
use cortex_config::{ModeConfig, ModeSystemConfig};
use cortex_core::{
    ActivationContext, ChannelSink, Mode, ModeDescriptor, ModeError, ModeState, Notification,
    StaticMode, TransitionCoordinator, TransitionOutcome, TransitionRecord,
};
use cortex_upstream::{CallStats, UpstreamCaller, UpstreamMode};
use serde::Serialize;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

/// Exit code after a critical halt
const EXIT_HALTED: u8 = 2;

pub(crate) struct Options {
    pub(crate) sequence: Vec<String>,
    pub(crate) fail: Vec<String>,
    pub(crate) offline: bool,
    pub(crate) json: bool,
}

/// Mode whose activation always fails
#[derive(Debug)]
struct InjectedFailure {
    descriptor: ModeDescriptor,
}

#[async_trait]
impl Mode for InjectedFailure {
    fn descriptor(&self) -> &ModeDescriptor {
        &self.descriptor
    }

    async fn activate(&self, _ctx: ActivationContext) -> Result<ModeState, ModeError> {
        Err(ModeError::activation("injected failure"))
    }
}

#[derive(Debug, Serialize)]
struct Step {
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<TransitionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected: Option<String>,
}

#[derive(Debug, Serialize)]
struct Summary {
    steps: Vec<Step>,
    final_mode: Option<String>,
    halted: bool,
    notifications: Vec<Notification>,
    history: Vec<TransitionRecord>,
    upstream: CallStats,
}

fn build_mode(
    descriptor: ModeDescriptor,
    mode: &ModeConfig,
    options: &Options,
    caller: &Arc<UpstreamCaller>,
) -> Arc<dyn Mode> {
    if options.fail.iter().any(|f| *f == descriptor.id.as_str()) {
        return Arc::new(InjectedFailure { descriptor });
    }
    if !descriptor.capabilities.requires_network {
        return Arc::new(StaticMode::new(descriptor).with_state(mode.initial_state()));
    }

    let offline = options.offline;
    let state = mode.initial_state();
    Arc::new(UpstreamMode::new(descriptor, Arc::clone(caller), move |_ctx| {
        let state = state.clone();
        async move {
            if offline {
                Err(io::Error::new(io::ErrorKind::ConnectionRefused, "offline"))
            } else {
                Ok(state)
            }
        }
    }))
}

pub(crate) async fn run(path: &Path, options: &Options) -> anyhow::Result<ExitCode> {
    let summary = simulate(path, options).await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(if summary.halted {
        ExitCode::from(EXIT_HALTED)
    } else {
        ExitCode::SUCCESS
    })
}

async fn simulate(path: &Path, options: &Options) -> anyhow::Result<Summary> {
    let config = ModeSystemConfig::from_path(path)
        .with_context(|| format!("cannot load {}", path.display()))?;
    for name in &options.fail {
        if !config.modes.contains_key(name) {
            tracing::warn!(mode = %name, "--fail names a mode that is not configured");
        }
    }

    let caller = Arc::new(UpstreamCaller::new("upstream", config.retry_policy()));
    let registry = config
        .build_registry(|descriptor, mode| build_mode(descriptor, mode, options, &caller))
        .with_context(|| format!("{} is not a usable configuration", path.display()))?;

    let (sink, mut notifications) = ChannelSink::new(256);
    let coordinator =
        TransitionCoordinator::with_settings(registry, Arc::new(sink), config.coordinator_settings());

    let mut steps = Vec::with_capacity(options.sequence.len() + 1);
    steps.push(step("<startup>", coordinator.start().await));
    for target in &options.sequence {
        steps.push(step(target, coordinator.request_transition(target.as_str()).await));
    }

    let mut delivered = Vec::new();
    while let Ok(notification) = notifications.try_recv() {
        delivered.push(notification);
    }

    Ok(Summary {
        steps,
        final_mode: coordinator.current_mode().map(|m| m.to_string()),
        halted: coordinator.is_halted(),
        notifications: delivered,
        history: coordinator.history(),
        upstream: caller.stats(),
    })
}

fn step(target: &str, result: Result<TransitionOutcome, cortex_core::TransitionError>) -> Step {
    match result {
        Ok(outcome) => Step {
            target: target.to_string(),
            outcome: Some(outcome),
            rejected: None,
        },
        Err(e) => Step {
            target: target.to_string(),
            outcome: None,
            rejected: Some(e.to_string()),
        },
    }
}

fn print_summary(summary: &Summary) {
    for step in &summary.steps {
        match (&step.outcome, &step.rejected) {
            (Some(outcome), _) => println!("{:<16} {outcome}", step.target),
            (None, Some(reason)) => println!("{:<16} rejected: {reason}", step.target),
            (None, None) => {}
        }
    }

    if !summary.notifications.is_empty() {
        println!("\nNotifications:");
        for n in &summary.notifications {
            println!("  [{:?}] {}", n.severity, n.message);
        }
    }

    println!();
    println!(
        "Final mode: {}",
        summary.final_mode.as_deref().unwrap_or("<none>")
    );
    if summary.upstream.total_attempts > 0 {
        println!(
            "Upstream: {} attempts, {:.1}% success",
            summary.upstream.total_attempts, summary.upstream.success_rate
        );
    }
    if summary.halted {
        println!("Coordinator HALTED: manual restart required");
    }
}
