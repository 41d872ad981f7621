//! Scripted collaborators for prober, engine and API tests.

use crate::adapters::{HealthChecker, ProcessController};
use crate::error::{JunbanError, Result};
use crate::model::ReadinessState;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Health checker answering from a mutable table.
#[derive(Default)]
pub struct ScriptedChecker {
    states: Mutex<HashMap<String, ReadinessState>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedChecker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, service: &str, state: ReadinessState) {
        self.states
            .lock()
            .unwrap()
            .insert(service.to_string(), state);
    }

    /// Makes every check of `service` fail as unreachable.
    pub fn fail(&self, service: &str) {
        self.failing.lock().unwrap().insert(service.to_string());
    }

    pub fn calls(&self, service: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl HealthChecker for ScriptedChecker {
    async fn check(&self, service: &str) -> Result<ReadinessState> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(service.to_string())
            .or_insert(0) += 1;

        if self.failing.lock().unwrap().contains(service) {
            return Err(JunbanError::unreachable(service, "connection refused"));
        }

        Ok(self
            .states
            .lock()
            .unwrap()
            .get(service)
            .copied()
            .unwrap_or_default())
    }
}

/// Controller call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Launch(String),
    Terminate(String),
}

/// Process controller that records calls and drives a [`ScriptedChecker`].
///
/// A successful launch sets the service to `healthy` (or the state given
/// with [`RecordingController::with_launch_state`]); a terminate sets it to
/// `stopped`.
pub struct RecordingController {
    checker: Arc<ScriptedChecker>,
    calls: Mutex<Vec<Call>>,
    launch_states: HashMap<String, ReadinessState>,
    failing_launch: HashSet<String>,
    failing_terminate: HashSet<String>,
    launch_delay: Duration,
}

impl RecordingController {
    pub fn new(checker: Arc<ScriptedChecker>) -> Self {
        Self {
            checker,
            calls: Mutex::new(Vec::new()),
            launch_states: HashMap::new(),
            failing_launch: HashSet::new(),
            failing_terminate: HashSet::new(),
            launch_delay: Duration::ZERO,
        }
    }

    pub fn with_launch_state(mut self, service: &str, state: ReadinessState) -> Self {
        self.launch_states.insert(service.to_string(), state);
        self
    }

    pub fn failing_launch(mut self, service: &str) -> Self {
        self.failing_launch.insert(service.to_string());
        self
    }

    pub fn failing_terminate(mut self, service: &str) -> Self {
        self.failing_terminate.insert(service.to_string());
        self
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn launches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Launch(id) => Some(id),
                Call::Terminate(_) => None,
            })
            .collect()
    }

    pub fn terminations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Terminate(id) => Some(id),
                Call::Launch(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl ProcessController for RecordingController {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn launch(&self, service: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Launch(service.to_string()));

        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }

        if self.failing_launch.contains(service) {
            return Err(JunbanError::launch(service, "scripted launch failure"));
        }

        let state = self
            .launch_states
            .get(service)
            .copied()
            .unwrap_or(ReadinessState::Healthy);
        self.checker.set(service, state);
        Ok(())
    }

    async fn terminate(&self, service: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Terminate(service.to_string()));

        if self.failing_terminate.contains(service) {
            return Err(JunbanError::terminate(service, "scripted terminate failure"));
        }

        self.checker.set(service, ReadinessState::Stopped);
        Ok(())
    }
}
