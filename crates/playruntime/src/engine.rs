use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::context::VariableContext;
use crate::metrics::{self, MetricsCollector};
use crate::registry::SkillResolver;
use chrono::Utc;
use futures::future::BoxFuture;
use playcore::{
    DecisionStep, EventBus, ExecutionError, ExecutionEvent, ExecutionTrace, SkillExecutionError,
    SkillNotFoundError, SkillStep, SkillTrace, Step, StepKind, StepTrace, Value, Variables,
    Workflow,
};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// How to start an execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionRequest {
    /// Overrides for the playbook's default variables
    pub initial: Variables,
    /// Caller-chosen id; a v4 uuid is generated when absent
    pub execution_id: Option<String>,
    /// Resume this execution from its checkpoint instead of starting fresh
    pub resume_from: Option<String>,
}

impl ExecutionRequest {
    pub fn new(initial: Variables) -> Self {
        Self {
            initial,
            ..Self::default()
        }
    }

    pub fn resume(execution_id: impl Into<String>) -> Self {
        Self {
            resume_from: Some(execution_id.into()),
            ..Self::default()
        }
    }

    pub fn with_execution_id(mut self, execution_id: impl Into<String>) -> Self {
        self.execution_id = Some(execution_id.into());
        self
    }
}

/// Finished trace plus the error that stopped the run, if any
#[derive(Debug)]
pub struct ExecutionOutcome {
    pub trace: ExecutionTrace,
    pub error: Option<ExecutionError>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<ExecutionTrace, ExecutionError> {
        match self.error {
            None => Ok(self.trace),
            Some(e) => Err(e),
        }
    }
}

/// Runs playbooks step by step against a skill resolver.
///
/// Metrics, checkpointing and events are all optional and attached with the
/// `with_*` builders. One engine can serve any number of concurrent
/// executions; each execution owns its own variables and trace.
pub struct ExecutionEngine {
    skills: Arc<dyn SkillResolver>,
    metrics: Option<Arc<MetricsCollector>>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    events: Option<Arc<EventBus>>,
}

impl ExecutionEngine {
    pub fn new(skills: Arc<dyn SkillResolver>) -> Self {
        Self {
            skills,
            metrics: None,
            checkpoints: None,
            events: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        metrics::describe_engine_metrics(&metrics);
        self.metrics = Some(metrics);
        self
    }

    pub fn with_checkpoints(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = Some(store);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn skills(&self) -> &Arc<dyn SkillResolver> {
        &self.skills
    }

    pub fn checkpoint_store(&self) -> Option<&Arc<dyn CheckpointStore>> {
        self.checkpoints.as_ref()
    }

    /// Run `workflow` from the first step with `initial` overriding its defaults.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        initial: Variables,
    ) -> Result<ExecutionTrace, ExecutionError> {
        self.run(workflow, ExecutionRequest::new(initial))
            .await?
            .into_result()
    }

    /// Continue a failed or interrupted execution from its last checkpoint.
    pub async fn resume(
        &self,
        workflow: &Workflow,
        execution_id: &str,
    ) -> Result<ExecutionTrace, ExecutionError> {
        self.run(workflow, ExecutionRequest::resume(execution_id))
            .await?
            .into_result()
    }

    /// Run an execution and hand back its trace even when it fails.
    ///
    /// The outer error covers failures before the first step runs (e.g. a
    /// missing checkpoint on resume); step failures land in the outcome.
    pub async fn run(
        &self,
        workflow: &Workflow,
        request: ExecutionRequest,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let (execution_id, context, completed, start_index) = match request.resume_from {
            Some(id) => {
                let checkpoint = self.load_checkpoint(workflow, &id)?;
                tracing::info!(
                    execution_id = %id,
                    next_step_index = checkpoint.next_step_index,
                    "Resuming playbook '{}' from checkpoint",
                    workflow.name()
                );
                (
                    id,
                    VariableContext::new(checkpoint.variables),
                    checkpoint.completed_steps,
                    checkpoint.next_step_index,
                )
            }
            None => (
                request
                    .execution_id
                    .unwrap_or_else(|| Uuid::new_v4().to_string()),
                VariableContext::seeded(&workflow.variables, request.initial),
                Vec::new(),
                0,
            ),
        };

        let mut trace = ExecutionTrace::new(workflow.name(), &execution_id);
        trace.steps = completed;

        self.emit(ExecutionEvent::ExecutionStarted {
            execution_id: execution_id.clone(),
            playbook: workflow.name().to_string(),
            start_step: start_index,
            timestamp: Utc::now(),
        });
        tracing::info!(
            execution_id = %execution_id,
            "Starting playbook execution: {}",
            workflow.name()
        );

        let started = Instant::now();
        let mut run = Run {
            engine: self,
            workflow,
            execution_id,
            context,
        };
        let result = run.execute_from(start_index, &mut trace.steps).await;
        let elapsed = started.elapsed();

        let error = match result {
            Ok(()) => {
                trace.success = true;
                run.discard_checkpoint();
                tracing::info!(
                    execution_id = %run.execution_id,
                    duration_ms = elapsed.as_millis() as u64,
                    "Playbook '{}' completed",
                    workflow.name()
                );
                None
            }
            Err(e) => {
                trace.error = Some(e.to_string());
                tracing::error!(
                    execution_id = %run.execution_id,
                    "Playbook '{}' failed: {}",
                    workflow.name(),
                    e
                );
                if self.checkpoints.is_some() {
                    tracing::warn!(
                        execution_id = %run.execution_id,
                        "Checkpoint kept; resume with execution id {}",
                        run.execution_id
                    );
                }
                Some(e)
            }
        };

        trace.finalize(run.context.variables());

        if let Some(metrics) = &self.metrics {
            let status = if trace.success { "success" } else { "failure" };
            metrics.increment_counter(
                metrics::PLAYBOOK_EXECUTIONS_TOTAL,
                &[("playbook", workflow.name()), ("status", status)],
                1.0,
            );
            metrics.observe_histogram(
                metrics::PLAYBOOK_DURATION_SECONDS,
                elapsed.as_secs_f64(),
                &[("playbook", workflow.name())],
            );
        }

        self.emit(ExecutionEvent::ExecutionCompleted {
            execution_id: trace.execution_id.clone(),
            success: trace.success,
            duration_ms: trace.duration_ms.unwrap_or(0),
            timestamp: Utc::now(),
        });

        Ok(ExecutionOutcome { trace, error })
    }

    fn load_checkpoint(&self, workflow: &Workflow, execution_id: &str) -> Result<Checkpoint, ExecutionError> {
        let store = self
            .checkpoints
            .as_ref()
            .ok_or(ExecutionError::CheckpointingDisabled)?;

        let checkpoint = store
            .load(execution_id)?
            .ok_or_else(|| ExecutionError::CheckpointNotFound(execution_id.to_string()))?;

        if checkpoint.workflow_name != workflow.name() {
            return Err(ExecutionError::WorkflowMismatch {
                expected: workflow.name().to_string(),
                found: checkpoint.workflow_name,
            });
        }
        Ok(checkpoint)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

/// State of one in-flight execution
struct Run<'a> {
    engine: &'a ExecutionEngine,
    workflow: &'a Workflow,
    execution_id: String,
    context: VariableContext,
}

impl<'a> Run<'a> {
    async fn execute_from(&mut self, start: usize, traces: &mut Vec<StepTrace>) -> Result<(), ExecutionError> {
        let workflow = self.workflow;
        for (index, step) in workflow.steps.iter().enumerate().skip(start) {
            self.execute_step(step, traces).await?;
            self.save_checkpoint(index + 1, traces)?;
        }
        Ok(())
    }

    /// Execute one step and append its trace, successful or not.
    fn execute_step<'s>(
        &'s mut self,
        step: &'s Step,
        traces: &'s mut Vec<StepTrace>,
    ) -> BoxFuture<'s, Result<(), ExecutionError>> {
        Box::pin(async move {
            let kind = match step {
                Step::Skill(_) => StepKind::Skill,
                Step::Decision(_) => StepKind::Decision,
            };
            let mut trace = StepTrace::start(step.name(), kind);

            self.engine.emit(ExecutionEvent::StepStarted {
                execution_id: self.execution_id.clone(),
                step_name: step.name().to_string(),
                step_type: kind,
                timestamp: Utc::now(),
            });
            tracing::debug!(execution_id = %self.execution_id, step = step.name(), "Executing {} step", kind);

            let result = match step {
                Step::Skill(skill_step) => self.execute_skill(skill_step, &mut trace).await,
                Step::Decision(decision) => self.execute_decision(decision, &mut trace).await,
            };

            match &result {
                Ok(()) => {
                    trace.finish();
                    self.engine.emit(ExecutionEvent::StepCompleted {
                        execution_id: self.execution_id.clone(),
                        step_name: trace.step_name.clone(),
                        duration_ms: trace.duration_ms.unwrap_or(0),
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    let summary = step_error_summary(e);
                    tracing::error!(execution_id = %self.execution_id, step = step.name(), "Step failed: {}", summary);
                    self.engine.emit(ExecutionEvent::StepFailed {
                        execution_id: self.execution_id.clone(),
                        step_name: trace.step_name.clone(),
                        error: summary.clone(),
                        timestamp: Utc::now(),
                    });
                    trace.fail(summary);
                }
            }

            traces.push(trace);
            result
        })
    }

    async fn execute_skill(&mut self, step: &SkillStep, trace: &mut StepTrace) -> Result<(), ExecutionError> {
        let Some(skill) = self.engine.skills.resolve(&step.skill) else {
            self.record_skill(&step.skill, "not_found", None);
            return Err(SkillNotFoundError::new(
                &step.skill,
                &step.name,
                self.workflow.name(),
                self.engine.skills.skill_names(),
            )
            .into());
        };

        let input = self.context.render_payload(&step.input);
        if let Some(schema) = skill.input_schema() {
            schema.validate(&step.skill, &input)?;
        }

        let mut skill_trace = SkillTrace::start(&step.skill, input.clone());
        let started = Instant::now();
        let result = skill.execute(input.clone()).await;
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(output) => {
                skill_trace.complete(output.output.clone(), output.reasoning);
                trace.skill_trace = Some(skill_trace);
                self.record_skill(&step.skill, "success", Some(elapsed));

                if let Some(var) = &step.output_var {
                    self.context.set(var.clone(), Value::Object(output.output));
                }
                Ok(())
            }
            Err(e) => {
                skill_trace.fail(e.to_string(), e.reasoning().map(str::to_string));
                trace.skill_trace = Some(skill_trace);
                self.record_skill(&step.skill, "failure", Some(elapsed));
                Err(SkillExecutionError::new(&step.skill, &step.name, input, e).into())
            }
        }
    }

    async fn execute_decision(&mut self, step: &DecisionStep, trace: &mut StepTrace) -> Result<(), ExecutionError> {
        let mut selected = None;

        for (index, branch) in step.branches.iter().enumerate() {
            if self.context.evaluate_condition(&branch.condition, &step.name)? {
                trace.decision_taken = Some(format!("branch_{}: {}", index, branch.condition));
                self.record_branch(&step.name, &index.to_string());
                selected = Some(&branch.steps);
                break;
            }
        }

        if selected.is_none() {
            if let Some(default) = &step.default {
                trace.decision_taken = Some("default".to_string());
                self.record_branch(&step.name, "default");
                selected = Some(default);
            }
        }

        let Some(steps) = selected else {
            tracing::debug!(step = %step.name, "No branch matched and no default");
            return Ok(());
        };

        for nested in steps {
            self.execute_step(nested, &mut trace.nested_steps).await?;
        }
        Ok(())
    }

    fn save_checkpoint(&self, next_step_index: usize, completed: &[StepTrace]) -> Result<(), ExecutionError> {
        let Some(store) = &self.engine.checkpoints else {
            return Ok(());
        };

        let checkpoint = Checkpoint::new(
            &self.execution_id,
            self.workflow.name(),
            next_step_index,
            self.context.variables().clone(),
            completed.to_vec(),
        );
        store.save(&checkpoint)?;

        self.engine.emit(ExecutionEvent::CheckpointSaved {
            execution_id: self.execution_id.clone(),
            next_step_index,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    fn discard_checkpoint(&self) {
        if let Some(store) = &self.engine.checkpoints {
            if let Err(e) = store.delete(&self.execution_id) {
                tracing::warn!(execution_id = %self.execution_id, "Failed to delete checkpoint: {}", e);
            }
        }
    }

    fn record_skill(&self, skill: &str, status: &str, seconds: Option<f64>) {
        let Some(metrics) = &self.engine.metrics else {
            return;
        };
        metrics.increment_counter(
            metrics::SKILL_EXECUTIONS_TOTAL,
            &[("skill", skill), ("status", status)],
            1.0,
        );
        if let Some(seconds) = seconds {
            metrics.observe_histogram(metrics::SKILL_DURATION_SECONDS, seconds, &[("skill", skill)]);
        }
    }

    fn record_branch(&self, step: &str, branch: &str) {
        if let Some(metrics) = &self.engine.metrics {
            metrics.increment_counter(
                metrics::DECISION_BRANCHES_TAKEN_TOTAL,
                &[("step", step), ("branch", branch)],
                1.0,
            );
        }
    }
}

/// One-line error text for a step trace; the full message lives on the
/// execution trace.
fn step_error_summary(error: &ExecutionError) -> String {
    match error {
        ExecutionError::SkillNotFound(e) => format!("Skill '{}' not found", e.skill_name),
        ExecutionError::SkillExecution(e) => e.source.to_string(),
        ExecutionError::InvalidInput(e) => {
            let violations: Vec<String> = e.violations.iter().map(ToString::to_string).collect();
            format!("Invalid input: {}", violations.join("; "))
        }
        ExecutionError::Template(e) => format!("Template error: {}", e.reason),
        other => other.to_string(),
    }
}
