//! Progress tracking for long-running operations
//!
//! Callers poll a [`JobStore`] by task id. The in-memory store is a
//! stopgap: no persistence, no sharing across processes, no eviction, and
//! concurrent updates to one job are last-write-wins.

mod batch;
mod memory;


pub use batch::{import_batch, BatchOutcome, ImportInput};
pub use memory::{default_store, InMemoryJobStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle of a tracked job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one job as seen by pollers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub task_id: String,
    pub task_type: String,
    pub status: JobStatus,
    /// Fraction complete, 0.0 to 1.0
    pub progress: f64,
    pub current_step: String,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial update; unset fields keep their current value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<f64>,
    pub current_step: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Clamped to 0.0..=1.0
    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(clamp_progress(progress));
        self
    }

    pub fn current_step(mut self, step: impl Into<String>) -> Self {
        self.current_step = Some(step.into());
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Build an update from loose key/value pairs
    ///
    /// Only `status`, `progress`, `current_step`, `result` and `error` are
    /// read. Other keys, and values of the wrong type, are ignored.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        let mut update = Self::default();
        for (key, value) in fields {
            match key.as_str() {
                "status" => update.status = value.as_str().and_then(JobStatus::parse),
                "progress" => update.progress = value.as_f64().map(clamp_progress),
                "current_step" => update.current_step = value.as_str().map(str::to_string),
                "result" => update.result = Some(value.clone()),
                "error" => update.error = value.as_str().map(str::to_string),
                _ => {}
            }
        }
        update
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn apply(self, record: &mut JobRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(progress) = self.progress {
            record.progress = progress;
        }
        if let Some(step) = self.current_step {
            record.current_step = step;
        }
        if let Some(result) = self.result {
            record.result = Some(result);
        }
        if let Some(error) = self.error {
            record.error = Some(error);
        }
    }
}

fn clamp_progress(progress: f64) -> f64 {
    if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    }
}

/// Storage seam for job records
///
/// The in-memory store is the only implementation here; a durable backend
/// can replace it without touching callers.
pub trait JobStore: Send + Sync {
    /// Register a new pending job and return its id (`"{task_type}_{8 hex}"`)
    fn create_job(&self, task_type: &str) -> String;

    /// Apply `update` to a known job. Returns false for an unknown id.
    fn update_job(&self, task_id: &str, update: JobUpdate) -> bool;

    fn get_job(&self, task_id: &str) -> Option<JobRecord>;

    /// Drop every record
    fn clear_jobs(&self);
}
