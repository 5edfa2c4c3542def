//! Testing utilities for Cortex workspace
//!
//! Scripted modes, recording sinks and registry fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use cortex_core::{
    ActivationContext, Capabilities, Mode, ModeDescriptor, ModeError, ModeRegistry, ModeState,
    NotificationSink, NotifyError, Severity, TransitionCoordinator,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Tracks how many activations run at once across modes sharing it
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max_concurrent(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Succeed,
    Fail,
    FailFirst(usize),
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deactivation {
    Succeed,
    Fail,
    Panic,
}

/// Mode whose activation outcome is scripted by the test
#[derive(Debug)]
pub struct ScriptedMode {
    descriptor: ModeDescriptor,
    state: ModeState,
    activation: Activation,
    deactivation: Deactivation,
    delay: Option<Duration>,
    probe: Option<Arc<ConcurrencyProbe>>,
    activations: AtomicUsize,
    deactivations: AtomicUsize,
    broken: AtomicBool,
}

impl ScriptedMode {
    pub fn new(id: &str) -> Self {
        Self {
            descriptor: ModeDescriptor::new(id),
            state: ModeState::new(json!({ "mode": id })),
            activation: Activation::Succeed,
            deactivation: Deactivation::Succeed,
            delay: None,
            probe: None,
            activations: AtomicUsize::new(0),
            deactivations: AtomicUsize::new(0),
            broken: AtomicBool::new(false),
        }
    }

    /// Every activation fails
    #[must_use]
    pub fn failing(mut self) -> Self {
        self.activation = Activation::Fail;
        self
    }

    /// First `n` activations fail, later ones succeed
    #[must_use]
    pub fn failing_first(mut self, n: usize) -> Self {
        self.activation = Activation::FailFirst(n);
        self
    }

    /// Every activation panics
    #[must_use]
    pub fn panicking(mut self) -> Self {
        self.activation = Activation::Panic;
        self
    }

    #[must_use]
    pub fn failing_deactivation(mut self) -> Self {
        self.deactivation = Deactivation::Fail;
        self
    }

    #[must_use]
    pub fn panicking_deactivation(mut self) -> Self {
        self.deactivation = Deactivation::Panic;
        self
    }

    #[must_use]
    pub fn requiring_network(mut self) -> Self {
        self.descriptor = self
            .descriptor
            .with_capabilities(Capabilities::none().with_network());
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = ModeState::new(state);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    #[must_use]
    pub fn with_messages(mut self, entry: &str, exit: &str) -> Self {
        self.descriptor = self
            .descriptor
            .with_entry_message(entry)
            .with_exit_message(exit);
        self
    }

    /// Break activation from now on, regardless of script
    pub fn break_now(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn deactivations(&self) -> usize {
        self.deactivations.load(Ordering::SeqCst)
    }

    pub fn initial_state(&self) -> &ModeState {
        &self.state
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl Mode for ScriptedMode {
    fn descriptor(&self) -> &ModeDescriptor {
        &self.descriptor
    }

    async fn activate(&self, _ctx: ActivationContext) -> Result<ModeState, ModeError> {
        let attempt = self.activations.fetch_add(1, Ordering::SeqCst);
        if let Some(probe) = &self.probe {
            probe.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(probe) = &self.probe {
            probe.exit();
        }

        if self.broken.load(Ordering::SeqCst) {
            return Err(ModeError::activation(format!("{} broken", self.descriptor.id)));
        }
        match self.activation {
            Activation::Succeed => Ok(self.state.clone()),
            Activation::FailFirst(n) if attempt >= n => Ok(self.state.clone()),
            Activation::Fail | Activation::FailFirst(_) => Err(ModeError::activation(format!(
                "{} refused to start",
                self.descriptor.id
            ))),
            Activation::Panic => panic!("{} panicked during activation", self.descriptor.id),
        }
    }

    async fn deactivate(&self, _state: ModeState) -> Result<(), ModeError> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        match self.deactivation {
            Deactivation::Succeed => Ok(()),
            Deactivation::Fail => Err(ModeError::deactivation(format!(
                "{} would not stop",
                self.descriptor.id
            ))),
            Deactivation::Panic => panic!("{} panicked during deactivation", self.descriptor.id),
        }
    }
}

/// Sink that records every message it accepts
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, Severity)>>,
    reject: bool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sink that records attempts but reports every delivery as failed
    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
            reject: true,
        })
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.messages.lock().iter().map(|(m, _)| m.clone()).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, message: &str, severity: Severity) -> Result<(), NotifyError> {
        self.messages.lock().push((message.to_string(), severity));
        if self.reject {
            Err(NotifyError::Rejected("speaker offline".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Registry from scripted modes; panics on invalid setup
pub fn registry_of(modes: Vec<Arc<ScriptedMode>>, safe_mode: &str) -> ModeRegistry {
    let mut builder = ModeRegistry::builder();
    for mode in modes {
        builder.register(mode).unwrap();
    }
    builder.safe_mode(safe_mode).build().unwrap()
}

/// Coordinator over scripted modes that has already entered its safe mode
pub async fn started_coordinator(
    modes: Vec<Arc<ScriptedMode>>,
    safe_mode: &str,
    sink: Arc<RecordingSink>,
) -> TransitionCoordinator {
    let coordinator = TransitionCoordinator::new(registry_of(modes, safe_mode), sink);
    let outcome = coordinator.start().await.unwrap();
    assert!(outcome.is_committed(), "startup did not commit: {outcome}");
    coordinator
}
