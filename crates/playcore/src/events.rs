use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::StepKind;

/// Events emitted while playbooks execute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    ExecutionStarted {
        execution_id: String,
        playbook: String,
        start_step: usize,
        timestamp: DateTime<Utc>,
    },
    ExecutionCompleted {
        execution_id: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepStarted {
        execution_id: String,
        step_name: String,
        step_type: StepKind,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        execution_id: String,
        step_name: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    StepFailed {
        execution_id: String,
        step_name: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    CheckpointSaved {
        execution_id: String,
        next_step_index: usize,
        timestamp: DateTime<Utc>,
    },
    BatchItemCompleted {
        index: usize,
        success: bool,
        duration_ms: f64,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast channel for execution events.
///
/// Sending never blocks and never fails the sender; events are dropped
/// when nobody is subscribed.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
