//! Durable task records
//!
//! The task store is the long-lived source of truth for task state. The job
//! queue keeps its own short-lived copy of finished results; once that copy is
//! gone, status lookups fall back here. Entries expire after the task retention
//! window whether or not anyone read them.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::keys;
use crate::store::KvStore;
use crate::types::{TaskId, TaskRecord};

/// Task records in the expiring key-value store
#[derive(Clone)]
pub struct TaskStore {
    store: Arc<dyn KvStore>,
    retention: Duration,
}

impl TaskStore {
    /// Create a task store writing records with the given retention
    pub fn new(store: Arc<dyn KvStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    /// Write (or overwrite) a task record, resetting its retention window
    pub async fn put(&self, record: &TaskRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.store
            .set(&keys::task(&record.id), &json, Some(self.retention))
            .await
    }

    /// Fetch a task record; unknown and expired tasks are `NotFound`
    pub async fn get(&self, id: &TaskId) -> Result<TaskRecord> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("task {}", id)))
    }

    /// Fetch a task record if it exists
    pub async fn find(&self, id: &TaskId) -> Result<Option<TaskRecord>> {
        match self.store.get(&keys::task(id)).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Retention applied to every write
    pub fn retention(&self) -> Duration {
        self.retention
    }
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore")
            .field("store", &self.store.name())
            .field("retention", &self.retention)
            .finish()
    }
}
