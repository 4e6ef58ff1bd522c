use super::{JobRecord, JobStatus, JobStore, JobUpdate};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;
use uuid::Uuid;

static DEFAULT_STORE: Lazy<InMemoryJobStore> = Lazy::new(InMemoryJobStore::new);

/// Process-wide store shared by every caller that does not inject its own
pub fn default_store() -> &'static InMemoryJobStore {
    &DEFAULT_STORE
}

/// Job records in a mutex-guarded map
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panicked writer leaves plain data behind, so poisoning is ignored
    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn new_task_id(task_type: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}_{}", task_type, &suffix[..8])
    }
}

impl JobStore for InMemoryJobStore {
    fn create_job(&self, task_type: &str) -> String {
        let mut jobs = self.lock();
        let mut task_id = Self::new_task_id(task_type);
        while jobs.contains_key(&task_id) {
            task_id = Self::new_task_id(task_type);
        }

        let now = Utc::now();
        jobs.insert(
            task_id.clone(),
            JobRecord {
                task_id: task_id.clone(),
                task_type: task_type.to_string(),
                status: JobStatus::Pending,
                progress: 0.0,
                current_step: "Initializing".to_string(),
                result: None,
                error: None,
                created_at: now,
                updated_at: now,
            },
        );
        debug!(%task_id, "job created");
        task_id
    }

    fn update_job(&self, task_id: &str, update: JobUpdate) -> bool {
        let mut jobs = self.lock();
        let Some(record) = jobs.get_mut(task_id) else {
            debug!(%task_id, "update for unknown job ignored");
            return false;
        };

        update.apply(record);

        // Strictly after the previous stamp, even within one clock tick
        let now = Utc::now();
        record.updated_at = if now > record.updated_at {
            now
        } else {
            record.updated_at + Duration::microseconds(1)
        };
        true
    }

    fn get_job(&self, task_id: &str) -> Option<JobRecord> {
        self.lock().get(task_id).cloned()
    }

    fn clear_jobs(&self) {
        self.lock().clear();
    }
}
