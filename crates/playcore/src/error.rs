use crate::skill::SkillError;
use crate::value::{self, Payload, Value, Variables};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use thiserror::Error;

/// Failure of a single playbook execution.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    SkillNotFound(#[from] SkillNotFoundError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    SkillExecution(#[from] SkillExecutionError),

    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Checkpoint not found for execution: {0}")]
    CheckpointNotFound(String),

    #[error("Checkpointing is not enabled on this engine")]
    CheckpointingDisabled,

    #[error("Checkpoint belongs to playbook '{found}', not '{expected}'")]
    WorkflowMismatch { expected: String, found: String },
}

/// Errors raised while loading a playbook definition.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid playbook: {0}")]
    Invalid(String),

    #[error("Unknown step type '{step_type}' at {location}")]
    UnknownStepType { step_type: String, location: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Skill '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// A skill step referenced a name the registry does not know.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct SkillNotFoundError {
    pub skill_name: String,
    pub step_name: String,
    pub playbook_name: String,
    pub available_skills: Vec<String>,
    pub suggestions: Vec<String>,
    message: String,
}

impl SkillNotFoundError {
    pub fn new(
        skill_name: impl Into<String>,
        step_name: impl Into<String>,
        playbook_name: impl Into<String>,
        mut available_skills: Vec<String>,
    ) -> Self {
        let skill_name = skill_name.into();
        let step_name = step_name.into();
        let playbook_name = playbook_name.into();
        available_skills.sort();
        let suggestions = close_matches(&skill_name, &available_skills, 3, 0.6);

        let mut message = format!("Skill '{}' not found in registry\n", skill_name);
        let _ = writeln!(message, "  Playbook: {}", playbook_name);
        let _ = writeln!(message, "  Step: {}\n", step_name);

        if !suggestions.is_empty() {
            message.push_str("Did you mean one of these?\n");
            for suggestion in &suggestions {
                let _ = writeln!(message, "  - {}", suggestion);
            }
            message.push('\n');
        }

        let _ = writeln!(message, "Available skills ({}):", available_skills.len());
        for skill in &available_skills {
            let _ = writeln!(message, "  - {}", skill);
        }

        Self {
            skill_name,
            step_name,
            playbook_name,
            available_skills,
            suggestions,
            message,
        }
    }
}

/// A decision condition failed to parse or evaluate.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct TemplateError {
    pub template: String,
    pub reason: String,
    pub step_name: String,
    pub field_name: String,
    /// Variable name -> short type/value description at failure time.
    pub available_vars: Vec<(String, String)>,
    message: String,
}

impl TemplateError {
    pub fn new(
        template: impl Into<String>,
        reason: impl Into<String>,
        step_name: impl Into<String>,
        field_name: impl Into<String>,
        variables: &Variables,
    ) -> Self {
        let template = template.into();
        let reason = reason.into();
        let step_name = step_name.into();
        let field_name = field_name.into();

        let mut available_vars: Vec<(String, String)> = variables
            .iter()
            .map(|(name, v)| (name.clone(), value::describe(v)))
            .collect();
        available_vars.sort();

        let mut message = format!(
            "Template error in step '{}', field '{}'\n",
            step_name, field_name
        );
        let _ = writeln!(message, "  Template: {}", template);
        let _ = writeln!(message, "  Error: {}\n", reason);
        message.push_str("Available variables:\n");
        if available_vars.is_empty() {
            message.push_str("  (no variables available)\n");
        }
        for (name, description) in &available_vars {
            let _ = writeln!(message, "  - {}: {}", name, description);
        }

        Self {
            template,
            reason,
            step_name,
            field_name,
            available_vars,
            message,
        }
    }
}

/// A skill's `execute` returned an error.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct SkillExecutionError {
    pub skill_name: String,
    pub step_name: String,
    pub input: Payload,
    pub reasoning: Option<String>,
    #[source]
    pub source: SkillError,
    message: String,
}

impl SkillExecutionError {
    pub fn new(
        skill_name: impl Into<String>,
        step_name: impl Into<String>,
        input: Payload,
        source: SkillError,
    ) -> Self {
        let skill_name = skill_name.into();
        let step_name = step_name.into();
        let reasoning = source.reasoning().map(str::to_string);

        let mut message = format!("Skill execution failed: {}\n", skill_name);
        let _ = writeln!(message, "  Step: {}", step_name);
        let _ = writeln!(message, "  Error: {}\n", source);
        message.push_str("Input data:\n");
        format_payload(&mut message, &input, 2);

        if let Some(reasoning) = &reasoning {
            let _ = write!(message, "\nSkill reasoning:\n  {}\n", reasoning);
        }

        Self {
            skill_name,
            step_name,
            input,
            reasoning,
            source,
            message,
        }
    }
}

fn format_payload(out: &mut String, payload: &Payload, indent: usize) {
    let prefix = " ".repeat(indent);
    for (key, v) in payload {
        match v {
            Value::Object(nested) => {
                let _ = writeln!(out, "{}{}:", prefix, key);
                format_payload(out, nested, indent + 2);
            }
            Value::Array(items) => {
                let _ = writeln!(out, "{}{}: [{} items]", prefix, key, items.len());
            }
            other => {
                let _ = writeln!(out, "{}{}: {}", prefix, key, value::preview(other, 100));
            }
        }
    }
}

/// One rejected field of a skill input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The rendered input did not satisfy the skill's declared schema.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct InvalidInputError {
    pub skill_name: String,
    pub schema_name: String,
    pub violations: Vec<FieldViolation>,
    message: String,
}

impl InvalidInputError {
    pub fn new(
        skill_name: impl Into<String>,
        schema_name: impl Into<String>,
        input: &Payload,
        violations: Vec<FieldViolation>,
    ) -> Self {
        let skill_name = skill_name.into();
        let schema_name = schema_name.into();

        let mut message = format!("Invalid input for skill '{}'\n", skill_name);
        let _ = writeln!(message, "  Schema: {}\n", schema_name);
        message.push_str("Validation errors:\n");
        for violation in &violations {
            let _ = writeln!(message, "  - {}", violation);
        }
        message.push_str("\nInput data:\n");
        for (key, v) in input {
            let _ = writeln!(message, "  {}: {}", key, value::preview(v, 100));
        }

        Self {
            skill_name,
            schema_name,
            violations,
            message,
        }
    }
}

/// Durable storage failed during a checkpoint operation.
#[derive(Error, Debug, Clone)]
#[error("Checkpoint {operation} failed for execution '{execution_id}': {reason}")]
pub struct CheckpointError {
    pub operation: String,
    pub execution_id: String,
    pub reason: String,
}

impl CheckpointError {
    pub fn new(
        operation: impl Into<String>,
        execution_id: impl Into<String>,
        reason: impl fmt::Display,
    ) -> Self {
        Self {
            operation: operation.into(),
            execution_id: execution_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// Up to `n` candidates whose similarity to `word` is at least `cutoff`,
/// best first. Similarity is `1 - levenshtein / max(len)`.
pub(crate) fn close_matches(word: &str, candidates: &[String], n: usize, cutoff: f64) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = candidates
        .iter()
        .map(|candidate| (similarity(word, candidate), candidate))
        .filter(|(score, _)| *score >= cutoff)
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().take(n).map(|(_, c)| c.clone()).collect()
}

fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / longest as f64
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
