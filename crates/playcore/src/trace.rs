//! Execution trace model.
//!
//! A trace is created when an execution starts, mutated while it runs and
//! handed to the caller once it finishes. It serializes to a stable JSON
//! shape that round-trips losslessly, which is also what checkpoints store.

use crate::value::{Payload, Variables};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Skill,
    Decision,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Skill => f.write_str("skill"),
            StepKind::Decision => f.write_str("decision"),
        }
    }
}

/// Record of one skill invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTrace {
    pub skill_name: String,
    pub execution_id: String,
    pub input: Payload,
    pub output: Option<Payload>,
    pub reasoning: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
}

impl SkillTrace {
    pub fn start(skill_name: impl Into<String>, input: Payload) -> Self {
        Self {
            skill_name: skill_name.into(),
            execution_id: uuid::Uuid::new_v4().to_string(),
            input,
            output: None,
            reasoning: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn complete(&mut self, output: Payload, reasoning: Option<String>) {
        self.stamp();
        self.output = Some(output);
        self.reasoning = reasoning;
    }

    pub fn fail(&mut self, error: impl Into<String>, reasoning: Option<String>) {
        self.stamp();
        self.error = Some(error.into());
        self.reasoning = reasoning;
    }

    fn stamp(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = Some(elapsed_ms(self.started_at, now));
    }
}

/// Record of one step attempt, nested for decision branches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTrace {
    pub step_name: String,
    pub step_type: StepKind,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub decision_taken: Option<String>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_trace: Option<SkillTrace>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested_steps: Vec<StepTrace>,
}

impl StepTrace {
    pub fn start(step_name: impl Into<String>, step_type: StepKind) -> Self {
        Self {
            step_name: step_name.into(),
            step_type,
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            decision_taken: None,
            error: None,
            skill_trace: None,
            nested_steps: Vec::new(),
        }
    }

    /// Stamp completion time and duration.
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = Some(elapsed_ms(self.started_at, now));
    }

    /// Stamp completion and record `error`.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.finish();
        self.error = Some(error.into());
    }

    /// Index of the decision branch taken, `None` for default or no match.
    pub fn branch_index(&self) -> Option<usize> {
        self.decision_taken
            .as_deref()?
            .strip_prefix("branch_")?
            .split(':')
            .next()?
            .parse()
            .ok()
    }
}

/// Complete record of one playbook run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub playbook_name: String,
    pub execution_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub success: bool,
    pub error: Option<String>,
    pub steps: Vec<StepTrace>,
    pub final_context: Variables,
}

impl ExecutionTrace {
    pub fn new(playbook_name: impl Into<String>, execution_id: impl Into<String>) -> Self {
        Self {
            playbook_name: playbook_name.into(),
            execution_id: execution_id.into(),
            started_at: Utc::now(),
            completed_at: None,
            duration_ms: None,
            success: false,
            error: None,
            steps: Vec::new(),
            final_context: Variables::new(),
        }
    }

    /// Stamp end time, duration and the final variable snapshot.
    pub fn finalize(&mut self, variables: &Variables) {
        let now = Utc::now();
        self.completed_at = Some(now);
        self.duration_ms = Some(elapsed_ms(self.started_at, now));
        self.final_context = variables.clone();
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json(true)?;
        std::fs::write(path, json)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }
}

fn elapsed_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}
