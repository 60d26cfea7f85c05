//! Playbook execution runtime
//!
//! This crate runs playbooks: variable templating, skill resolution,
//! step-by-step execution with checkpoints, batch fan-out and metrics.

mod batch;
mod checkpoint;
mod context;
mod engine;
pub mod metrics;
mod registry;
mod runtime;

pub use batch::{BatchError, BatchOptions, BatchResult, BatchResults, BatchRunner, SummaryRow};
pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use context::VariableContext;
pub use engine::{ExecutionEngine, ExecutionOutcome, ExecutionRequest};
pub use metrics::{MetricsCollector, PrometheusExporter, StatsdExporter};
pub use registry::{SkillInfo, SkillRegistry, SkillResolver};
pub use runtime::{PlaybookRuntime, RuntimeConfig};
