//! Storage collaborator interface

mod memory;

pub use memory::MemoryStorage;

use crate::error::{PersistenceError, PersistenceResult};
use crate::types::{InventoryRecord, JobRecord, RegisteredThing, ScheduledJob, WorkflowDefinition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Record store holding workflows, jobs and inventory
#[async_trait]
pub trait Storage: Send + Sync {
    /// All stored versions of a workflow
    async fn workflows_named(&self, name: &str) -> PersistenceResult<Vec<WorkflowDefinition>>;

    /// Definitions matching an exact (name, version) pair
    async fn workflow_version(
        &self,
        name: &str,
        version: &str,
    ) -> PersistenceResult<Vec<WorkflowDefinition>>;

    /// Jobs of `instance` requested within `[lower, upper]`
    async fn jobs_in_window(
        &self,
        instance: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> PersistenceResult<Vec<ScheduledJob>>;

    /// Inventory records for a material name
    async fn inventory_for(&self, material: &str) -> PersistenceResult<Vec<InventoryRecord>>;

    /// Insert an accepted job and decrement `material_id` by `quantity` as a
    /// single unit.
    ///
    /// The requested quantity is checked against the sum over every record of
    /// the job's material, then taken from `material_id` alone. Implementations
    /// refuse the whole commit when that sum is short, or when a job for the
    /// same instance has landed in the record's conflict window since it was
    /// checked.
    async fn commit_job(
        &self,
        record: &JobRecord,
        material_id: &str,
        quantity: i64,
    ) -> PersistenceResult<()>;

    /// Fetch a stored job record
    async fn job(&self, job_id: &str) -> PersistenceResult<Option<JobRecord>>;
}

/// Initial contents for the in-memory collaborators
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedData {
    pub workflows: Vec<WorkflowDefinition>,
    pub inventory: Vec<InventoryRecord>,
    pub jobs: Vec<ScheduledJob>,
    pub instances: Vec<RegisteredThing>,
}

impl SeedData {
    pub fn from_json(raw: &str) -> PersistenceResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> PersistenceResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PersistenceError::Unavailable(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }
}
