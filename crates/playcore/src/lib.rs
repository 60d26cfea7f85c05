//! Core abstractions for the playbook engine
//!
//! This crate provides the data model, the skill contract, the trace model
//! and the error taxonomy that every other crate depends on. It contains no
//! execution logic.

mod error;
pub mod events;
mod skill;
mod trace;
pub mod value;
mod workflow;

pub use error::{
    CheckpointError, ExecutionError, FieldViolation, InvalidInputError, RegistryError,
    SkillExecutionError, SkillNotFoundError, TemplateError, WorkflowError,
};
pub use events::{EventBus, ExecutionEvent};
pub use skill::{FieldKind, FieldSpec, InputSchema, Skill, SkillError, SkillOutput};
pub use trace::{ExecutionTrace, SkillTrace, StepKind, StepTrace};
pub use value::{Payload, Value, Variables};
pub use workflow::{Branch, DecisionStep, SkillStep, Step, Workflow, WorkflowMetadata};

/// Result type for playbook execution
pub type Result<T> = std::result::Result<T, ExecutionError>;
