//! Run one playbook against many independent inputs under bounded
//! concurrency.

use crate::engine::{ExecutionEngine, ExecutionRequest};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use playcore::{EventBus, ExecutionError, ExecutionEvent, ExecutionTrace, Variables, Workflow};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;

#[derive(Error, Debug)]
pub enum BatchError {
    /// Raised only when `continue_on_error` is off
    #[error("Batch aborted: input {index} failed: {source}")]
    ExecutionFailed {
        index: usize,
        #[source]
        source: ExecutionError,
    },

    #[error("Batch task failed: {0}")]
    Join(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub max_concurrency: usize,
    pub continue_on_error: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            continue_on_error: true,
        }
    }
}

/// Outcome of one batch input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub index: usize,
    pub success: bool,
    pub duration_ms: f64,
    pub error: Option<String>,
    pub input_context: Variables,
    /// Present whenever the execution got as far as starting
    pub trace: Option<ExecutionTrace>,
}

/// Flattened reporting row; `error` keeps only the first line of the message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub index: usize,
    pub success: bool,
    pub duration_ms: f64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResults {
    /// Ordered by input index
    pub results: Vec<BatchResult>,
    pub total_duration_ms: f64,
}

impl BatchResults {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.total() - self.success_count()
    }

    /// Mean per-input duration
    pub fn avg_duration_ms(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(|r| r.duration_ms).sum::<f64>() / self.results.len() as f64
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn summary_rows(&self) -> Vec<SummaryRow> {
        self.results
            .iter()
            .map(|r| SummaryRow {
                index: r.index,
                success: r.success,
                duration_ms: r.duration_ms,
                error: r
                    .error
                    .as_deref()
                    .and_then(|e| e.lines().next())
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }

    /// Aggregates plus every result with its full trace
    pub fn to_json(&self) -> Result<String, BatchError> {
        let report = serde_json::json!({
            "total": self.total(),
            "success_count": self.success_count(),
            "failure_count": self.failure_count(),
            "total_duration_ms": self.total_duration_ms,
            "avg_duration_ms": self.avg_duration_ms(),
            "results": self.results,
        });
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), BatchError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// `index,success,duration_ms,error`, one row per input
    pub fn to_csv(&self) -> Result<String, BatchError> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(vec![]);
        writer.write_record(["index", "success", "duration_ms", "error"])?;
        for row in self.summary_rows() {
            writer.serialize(row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| BatchError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| BatchError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), BatchError> {
        std::fs::write(path, self.to_csv()?)?;
        Ok(())
    }
}

/// Fans a workflow out over many inputs through a shared engine
pub struct BatchRunner {
    engine: Arc<ExecutionEngine>,
    events: Option<Arc<EventBus>>,
}

impl BatchRunner {
    pub fn new(engine: Arc<ExecutionEngine>) -> Self {
        Self {
            engine,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Execute `workflow` once per input, at most `max_concurrency` at a time.
    ///
    /// With `continue_on_error` each failure is captured in its result. Without
    /// it, the first failure stops inputs that have not started yet; inputs
    /// already running finish, then the failure is returned.
    pub async fn run_batch(
        &self,
        workflow: &Workflow,
        inputs: Vec<Variables>,
        options: BatchOptions,
    ) -> Result<BatchResults, BatchError> {
        let started = Instant::now();
        let total = inputs.len();
        let workflow = Arc::new(workflow.clone());
        let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));

        tracing::info!(
            "Starting batch of {} inputs for '{}' (max_concurrency={})",
            total,
            workflow.name(),
            options.max_concurrency.max(1)
        );

        let mut running = FuturesUnordered::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let engine = self.engine.clone();
            let workflow = workflow.clone();
            let semaphore = semaphore.clone();

            running.push(tokio::spawn(async move {
                // A closed semaphore means the batch is stopping
                let _permit = semaphore.acquire_owned().await.ok()?;
                Some(execute_one(&engine, &workflow, index, input).await)
            }));
        }

        let mut results = Vec::with_capacity(total);
        let mut first_failure: Option<(usize, ExecutionError)> = None;

        while let Some(joined) = running.next().await {
            let item = joined.map_err(|e| BatchError::Join(e.to_string()))?;
            let Some((result, error)) = item else {
                continue;
            };

            if let Some(events) = &self.events {
                events.emit(ExecutionEvent::BatchItemCompleted {
                    index: result.index,
                    success: result.success,
                    duration_ms: result.duration_ms,
                    error: result.error.clone(),
                    timestamp: Utc::now(),
                });
            }

            if !result.success && !options.continue_on_error && first_failure.is_none() {
                tracing::warn!("Batch input {} failed; not starting remaining inputs", result.index);
                semaphore.close();
                if let Some(error) = error {
                    first_failure = Some((result.index, error));
                }
            }
            results.push(result);
        }

        if let Some((index, source)) = first_failure {
            return Err(BatchError::ExecutionFailed { index, source });
        }

        results.sort_by_key(|r| r.index);
        let batch = BatchResults {
            results,
            total_duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        tracing::info!(
            "Batch finished: {}/{} succeeded in {:.1}ms",
            batch.success_count(),
            batch.total(),
            batch.total_duration_ms
        );
        Ok(batch)
    }
}

async fn execute_one(
    engine: &ExecutionEngine,
    workflow: &Workflow,
    index: usize,
    input: Variables,
) -> (BatchResult, Option<ExecutionError>) {
    let started = Instant::now();
    let outcome = engine.run(workflow, ExecutionRequest::new(input.clone())).await;
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

    match outcome {
        Ok(outcome) => {
            let result = BatchResult {
                index,
                success: outcome.is_success() && outcome.trace.success,
                duration_ms,
                error: outcome.error.as_ref().map(ToString::to_string),
                input_context: input,
                trace: Some(outcome.trace),
            };
            (result, outcome.error)
        }
        Err(e) => {
            let result = BatchResult {
                index,
                success: false,
                duration_ms,
                error: Some(e.to_string()),
                input_context: input,
                trace: None,
            };
            (result, Some(e))
        }
    }
}
