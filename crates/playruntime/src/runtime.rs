use crate::batch::{BatchError, BatchOptions, BatchResults, BatchRunner};
use crate::checkpoint::{CheckpointStore, FileCheckpointStore};
use crate::engine::{ExecutionEngine, ExecutionOutcome, ExecutionRequest};
use crate::metrics::MetricsCollector;
use crate::registry::SkillRegistry;
use playcore::{CheckpointError, EventBus, ExecutionError, ExecutionEvent, ExecutionTrace, Variables, Workflow};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Main entry point bundling registry, engine, metrics, events and batching
pub struct PlaybookRuntime {
    registry: Arc<SkillRegistry>,
    engine: Arc<ExecutionEngine>,
    batch: BatchRunner,
    metrics: Arc<MetricsCollector>,
    event_bus: Arc<EventBus>,
    config: RuntimeConfig,
}

impl PlaybookRuntime {
    /// Runtime with an empty registry and default settings
    pub fn new() -> Self {
        Self::assemble(Arc::new(SkillRegistry::new()), RuntimeConfig::default(), None)
    }

    /// Create a runtime around a pre-populated registry.
    ///
    /// Fails only if `config.checkpoint_dir` is set and cannot be created.
    pub fn with_registry(registry: Arc<SkillRegistry>, config: RuntimeConfig) -> Result<Self, CheckpointError> {
        let store = match &config.checkpoint_dir {
            Some(dir) => Some(Arc::new(FileCheckpointStore::new(dir)?) as Arc<dyn CheckpointStore>),
            None => None,
        };
        Ok(Self::assemble(registry, config, store))
    }

    /// Same as [`with_registry`](Self::with_registry) but with a caller-supplied store
    pub fn with_checkpoint_store(
        registry: Arc<SkillRegistry>,
        config: RuntimeConfig,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self::assemble(registry, config, Some(store))
    }

    fn assemble(registry: Arc<SkillRegistry>, config: RuntimeConfig, store: Option<Arc<dyn CheckpointStore>>) -> Self {
        let metrics = Arc::new(MetricsCollector::with_retention(config.metrics_retention));
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));

        let mut engine = ExecutionEngine::new(registry.clone())
            .with_metrics(metrics.clone())
            .with_events(event_bus.clone());
        if let Some(store) = store {
            engine = engine.with_checkpoints(store);
        }
        let engine = Arc::new(engine);
        let batch = BatchRunner::new(engine.clone()).with_events(event_bus.clone());

        Self {
            registry,
            engine,
            batch,
            metrics,
            event_bus,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SkillRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub async fn execute(&self, workflow: &Workflow, initial: Variables) -> Result<ExecutionTrace, ExecutionError> {
        self.engine.execute(workflow, initial).await
    }

    /// Execute and keep the trace on failure
    pub async fn run(&self, workflow: &Workflow, request: ExecutionRequest) -> Result<ExecutionOutcome, ExecutionError> {
        self.engine.run(workflow, request).await
    }

    pub async fn resume(&self, workflow: &Workflow, execution_id: &str) -> Result<ExecutionTrace, ExecutionError> {
        self.engine.resume(workflow, execution_id).await
    }

    /// Batch with the configured concurrency and error policy
    pub async fn run_batch(&self, workflow: &Workflow, inputs: Vec<Variables>) -> Result<BatchResults, BatchError> {
        let options = BatchOptions {
            max_concurrency: self.config.max_concurrency,
            continue_on_error: self.config.continue_on_error,
        };
        self.batch.run_batch(workflow, inputs, options).await
    }

    pub async fn run_batch_with(
        &self,
        workflow: &Workflow,
        inputs: Vec<Variables>,
        options: BatchOptions,
    ) -> Result<BatchResults, BatchError> {
        self.batch.run_batch(workflow, inputs, options).await
    }

    /// Execution ids with a resumable checkpoint
    pub fn list_checkpoints(&self) -> Result<Vec<String>, ExecutionError> {
        let store = self
            .engine
            .checkpoint_store()
            .ok_or(ExecutionError::CheckpointingDisabled)?;
        Ok(store.list()?)
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }
}

impl Default for PlaybookRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub max_concurrency: usize,
    pub continue_on_error: bool,
    /// Enables file checkpoints when set
    pub checkpoint_dir: Option<PathBuf>,
    pub metrics_retention: Duration,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            continue_on_error: true,
            checkpoint_dir: None,
            metrics_retention: Duration::from_secs(3600),
            event_buffer_size: 1000,
        }
    }
}
