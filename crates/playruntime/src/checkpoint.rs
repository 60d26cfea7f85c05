//! Durable snapshots of in-flight executions.
//!
//! The engine writes a checkpoint after each top-level step succeeds and
//! deletes it once the whole execution succeeds. A failed execution leaves
//! its last checkpoint behind so it can be resumed by id.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use playcore::{CheckpointError, StepTrace, Variables};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub execution_id: String,
    pub workflow_name: String,
    /// Index of the first top-level step that has not completed yet
    pub next_step_index: usize,
    pub variables: Variables,
    pub completed_steps: Vec<StepTrace>,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(
        execution_id: impl Into<String>,
        workflow_name: impl Into<String>,
        next_step_index: usize,
        variables: Variables,
        completed_steps: Vec<StepTrace>,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow_name: workflow_name.into(),
            next_step_index,
            variables,
            completed_steps,
            saved_at: Utc::now(),
        }
    }
}

/// Storage backend for checkpoints, keyed by execution id
pub trait CheckpointStore: Send + Sync {
    /// Overwrite any previous checkpoint for the same execution
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;

    fn load(&self, execution_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Returns whether a checkpoint existed
    fn delete(&self, execution_id: &str) -> Result<bool, CheckpointError>;

    /// Execution ids that currently have a checkpoint, sorted
    fn list(&self) -> Result<Vec<String>, CheckpointError>;
}

/// One pretty-printed JSON file per execution: `<dir>/<execution_id>.json`
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CheckpointError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CheckpointError::new("init", "*", e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The execution id must be a single plain file name inside `dir`.
    fn path_for(&self, operation: &str, execution_id: &str) -> Result<PathBuf, CheckpointError> {
        let mut components = Path::new(execution_id).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(name)), None) if name == execution_id
        );
        if !single_normal || execution_id.contains(['/', '\\', '\0']) {
            return Err(CheckpointError::new(
                operation,
                execution_id,
                "execution id must be a plain file name",
            ));
        }
        Ok(self.dir.join(format!("{}.json", execution_id)))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let id = &checkpoint.execution_id;
        let json = serde_json::to_string_pretty(checkpoint)
            .map_err(|e| CheckpointError::new("save", id, e))?;

        // Write-then-rename so readers never see a half-written file
        let path = self.path_for("save", id)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| CheckpointError::new("save", id, e))?;
        fs::rename(&tmp, &path).map_err(|e| CheckpointError::new("save", id, e))?;

        tracing::debug!(
            execution_id = %id,
            next_step_index = checkpoint.next_step_index,
            "Saved checkpoint to {}",
            path.display()
        );
        Ok(())
    }

    fn load(&self, execution_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let json = match fs::read_to_string(self.path_for("load", execution_id)?) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CheckpointError::new("load", execution_id, e)),
        };

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| CheckpointError::new("load", execution_id, e))
    }

    fn delete(&self, execution_id: &str) -> Result<bool, CheckpointError> {
        match fs::remove_file(self.path_for("delete", execution_id)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CheckpointError::new("delete", execution_id, e)),
        }
    }

    fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CheckpointError::new("list", "*", e))?;

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CheckpointError::new("list", "*", e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-process store, useful for tests and short-lived runtimes
#[derive(Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        self.checkpoints
            .lock()
            .insert(checkpoint.execution_id.clone(), checkpoint.clone());
        Ok(())
    }

    fn load(&self, execution_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        Ok(self.checkpoints.lock().get(execution_id).cloned())
    }

    fn delete(&self, execution_id: &str) -> Result<bool, CheckpointError> {
        Ok(self.checkpoints.lock().remove(execution_id).is_some())
    }

    fn list(&self) -> Result<Vec<String>, CheckpointError> {
        let mut ids: Vec<String> = self.checkpoints.lock().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
