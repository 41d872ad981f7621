//! Result reporters.
//!
//! The engine hands every transition to a [`ResultReporter`]. Reporting is
//! synchronous and must not block: implementations log, push onto a
//! channel or append to an in-memory history.

use crate::engine::{RunSummary, ServiceOutcome, ServiceStatus, TransitionEvent};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Receives per-service transition events.
///
/// Events of one service arrive in order; events of different services may
/// interleave.
pub trait ResultReporter: Send + Sync {
    fn report(&self, event: TransitionEvent);
}

/// Logs transitions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ResultReporter for TracingReporter {
    fn report(&self, event: TransitionEvent) {
        let service = event.service_id.as_str();
        let reason = event.reason.to_string();
        match event.to {
            ServiceStatus::Started => info!(service = service, "Service started"),
            ServiceStatus::Stopped => info!(service = service, "Service stopped"),
            ServiceStatus::Skipped => warn!(service = service, reason = %reason, "Service skipped"),
            ServiceStatus::Failed => error!(service = service, reason = %reason, "Service failed"),
            _ => debug!(
                service = service,
                from = %event.from,
                to = %event.to,
                "Service transition"
            ),
        }
    }
}

/// Forwards transitions to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<TransitionEvent>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransitionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ResultReporter for ChannelReporter {
    fn report(&self, event: TransitionEvent) {
        // A closed receiver just means nobody is listening anymore.
        let _ = self.tx.send(event);
    }
}

/// Keeps the most recent transitions in memory.
#[derive(Debug)]
pub struct RecordingReporter {
    events: Mutex<VecDeque<TransitionEvent>>,
    capacity: usize,
}

impl Default for RecordingReporter {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

impl RecordingReporter {
    /// Creates a history holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<TransitionEvent>> {
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All retained events, oldest first.
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.lock().iter().cloned().collect()
    }

    /// Retained events of one service, oldest first.
    pub fn for_service(&self, service: &str) -> Vec<TransitionEvent> {
        self.lock()
            .iter()
            .filter(|e| e.service_id == service)
            .cloned()
            .collect()
    }

    /// Latest start outcome per service, derived from the history.
    pub fn summary(&self) -> RunSummary {
        let mut latest: BTreeMap<String, ServiceOutcome> = BTreeMap::new();
        for event in self.lock().iter() {
            if matches!(
                event.to,
                ServiceStatus::Started | ServiceStatus::Failed | ServiceStatus::Skipped
            ) {
                latest.insert(
                    event.service_id.clone(),
                    ServiceOutcome {
                        service_id: event.service_id.clone(),
                        status: event.to.clone(),
                        reason: event.reason.clone(),
                    },
                );
            }
        }

        RunSummary {
            outcomes: latest.into_values().collect(),
            elapsed_ms: 0,
        }
    }
}

impl ResultReporter for RecordingReporter {
    fn report(&self, event: TransitionEvent) {
        let mut events = self.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Sends every transition to several reporters.
#[derive(Default, Clone)]
pub struct FanoutReporter {
    reporters: Vec<Arc<dyn ResultReporter>>,
}

impl FanoutReporter {
    pub fn new(reporters: Vec<Arc<dyn ResultReporter>>) -> Self {
        Self { reporters }
    }

    pub fn with(mut self, reporter: Arc<dyn ResultReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl ResultReporter for FanoutReporter {
    fn report(&self, event: TransitionEvent) {
        if let Some((last, rest)) = self.reporters.split_last() {
            for reporter in rest {
                reporter.report(event.clone());
            }
            last.report(event);
        }
    }
}
