//! In-memory storage backend

use super::{SeedData, Storage};
use crate::error::{PersistenceError, PersistenceResult};
use crate::inventory::available_quantity;
use crate::schedule::ConflictWindow;
use crate::types::{InventoryRecord, JobRecord, ScheduledJob, WorkflowDefinition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Tables {
    workflows: Vec<WorkflowDefinition>,
    inventory: Vec<InventoryRecord>,
    scheduled: Vec<ScheduledJob>,
    records: HashMap<String, JobRecord>,
    outage: Option<String>,
}

impl Tables {
    fn available(&self) -> PersistenceResult<()> {
        match &self.outage {
            Some(reason) => Err(PersistenceError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

/// Storage backed by process memory. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: &SeedData) -> Self {
        let storage = Self::new();
        {
            let mut tables = storage.tables.write();
            tables.workflows = seed.workflows.clone();
            tables.inventory = seed.inventory.clone();
            tables.scheduled = seed.jobs.clone();
        }
        storage
    }

    pub fn insert_workflow(&self, workflow: WorkflowDefinition) {
        self.tables.write().workflows.push(workflow);
    }

    pub fn insert_inventory(&self, record: InventoryRecord) {
        self.tables.write().inventory.push(record);
    }

    pub fn insert_scheduled(&self, job: ScheduledJob) {
        self.tables.write().scheduled.push(job);
    }

    /// Current quantity of one inventory record
    pub fn quantity_of(&self, material_id: &str) -> Option<i64> {
        self.tables
            .read()
            .inventory
            .iter()
            .find(|record| record.material_id == material_id)
            .map(|record| record.coupon_quantity)
    }

    pub fn job_count(&self) -> usize {
        self.tables.read().records.len()
    }

    /// Make every subsequent call fail as if the backend were unreachable
    pub fn set_outage(&self, reason: Option<String>) {
        self.tables.write().outage = reason;
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn workflows_named(&self, name: &str) -> PersistenceResult<Vec<WorkflowDefinition>> {
        let tables = self.tables.read();
        tables.available()?;
        Ok(tables
            .workflows
            .iter()
            .filter(|workflow| workflow.name == name)
            .cloned()
            .collect())
    }

    async fn workflow_version(
        &self,
        name: &str,
        version: &str,
    ) -> PersistenceResult<Vec<WorkflowDefinition>> {
        let tables = self.tables.read();
        tables.available()?;
        Ok(tables
            .workflows
            .iter()
            .filter(|workflow| workflow.name == name && workflow.version == version)
            .cloned()
            .collect())
    }

    async fn jobs_in_window(
        &self,
        instance: &str,
        lower: DateTime<Utc>,
        upper: DateTime<Utc>,
    ) -> PersistenceResult<Vec<ScheduledJob>> {
        let tables = self.tables.read();
        tables.available()?;
        let window = ConflictWindow { lower, upper };
        Ok(tables
            .scheduled
            .iter()
            .filter(|job| job.instance == instance && window.contains(job.job_requested_start_time))
            .cloned()
            .collect())
    }

    async fn inventory_for(&self, material: &str) -> PersistenceResult<Vec<InventoryRecord>> {
        let tables = self.tables.read();
        tables.available()?;
        Ok(tables
            .inventory
            .iter()
            .filter(|record| record.coupon_material == material)
            .cloned()
            .collect())
    }

    async fn commit_job(
        &self,
        record: &JobRecord,
        material_id: &str,
        quantity: i64,
    ) -> PersistenceResult<()> {
        let mut tables = self.tables.write();
        tables.available()?;

        let job_id = record.job_id.to_string();
        if tables.records.contains_key(&job_id) {
            return Err(PersistenceError::DuplicateJob(job_id));
        }

        let window = ConflictWindow::around(record.job_requested_start_time, record.workflow_timeout);
        if tables
            .scheduled
            .iter()
            .any(|job| job.instance == record.instance && window.contains(job.job_requested_start_time))
        {
            return Err(PersistenceError::ScheduleConflict(record.instance.clone()));
        }

        let available = available_quantity(&record.coupon_material, &tables.inventory).quantity;
        if available < quantity {
            return Err(PersistenceError::InsufficientQuantity {
                material_id: material_id.to_string(),
                available,
                requested: quantity,
            });
        }

        // The whole amount comes off the one target record, which may leave it
        // negative when the material is split across records.
        let stock = tables
            .inventory
            .iter_mut()
            .find(|stock| stock.material_id == material_id)
            .ok_or_else(|| PersistenceError::NotFound(format!("inventory record {material_id}")))?;
        stock.coupon_quantity = stock.coupon_quantity.saturating_sub(quantity);
        let remaining = stock.coupon_quantity;

        tables.scheduled.push(record.scheduled());
        tables.records.insert(job_id.clone(), record.clone());

        debug!(job_id = %job_id, material_id, remaining, "committed job");
        Ok(())
    }

    async fn job(&self, job_id: &str) -> PersistenceResult<Option<JobRecord>> {
        let tables = self.tables.read();
        tables.available()?;
        Ok(tables.records.get(job_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;
    use crate::types::{JobId, JobState};
    use chrono::Duration;

    fn wood(quantity: i64) -> InventoryRecord {
        InventoryRecord {
            material_id: "1234456".to_string(),
            coupon_material: "wood".to_string(),
            coupon_quantity: quantity,
            coupon_description: None,
        }
    }

    fn record(instance: &str, at: &str) -> JobRecord {
        JobRecord {
            job_id: JobId::new(),
            user_name: "test".to_string(),
            user_email: "test@test.com".to_string(),
            workflow: "coupon-prep".to_string(),
            workflow_version: "2.0.0".to_string(),
            workflow_timeout: 300,
            instance: instance.to_string(),
            coupon_material: "wood".to_string(),
            coupon_quantity: 1,
            job_requested_start_time: parse_timestamp(at).unwrap(),
            job_submitted_time: parse_timestamp(at).unwrap(),
            job_state: JobState::Queued,
            step_map: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_commit_inserts_and_decrements() {
        let storage = MemoryStorage::new();
        storage.insert_inventory(wood(1000));

        let job = record("zach", "2024-03-10T12:00:00Z");
        storage.commit_job(&job, "1234456", 1).await.unwrap();

        assert_eq!(storage.quantity_of("1234456"), Some(999));
        assert_eq!(storage.job_count(), 1);
        let stored = storage.job(&job.job_id.to_string()).await.unwrap().unwrap();
        assert_eq!(stored.instance, "zach");

        let at = job.job_requested_start_time;
        let found = storage
            .jobs_in_window("zach", at - Duration::seconds(1), at)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_refuses_overdraw() {
        let storage = MemoryStorage::new();
        storage.insert_inventory(wood(2));

        let job = record("zach", "2024-03-10T12:00:00Z");
        let err = storage.commit_job(&job, "1234456", 3).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InsufficientQuantity { available: 2, .. }));
        assert_eq!(storage.quantity_of("1234456"), Some(2));
        assert_eq!(storage.job_count(), 0);
    }

    #[tokio::test]
    async fn test_commit_checks_summed_material_quantity() {
        let storage = MemoryStorage::new();
        storage.insert_inventory(InventoryRecord {
            material_id: "a".to_string(),
            ..wood(10)
        });
        storage.insert_inventory(InventoryRecord {
            material_id: "c".to_string(),
            ..wood(5)
        });

        let job = record("zach", "2024-03-10T12:00:00Z");
        storage.commit_job(&job, "c", 12).await.unwrap();
        assert_eq!(storage.quantity_of("a"), Some(10));
        assert_eq!(storage.quantity_of("c"), Some(-7));

        let job = record("zach", "2024-03-11T12:00:00Z");
        let err = storage.commit_job(&job, "c", 4).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InsufficientQuantity { available: 3, .. }));
    }

    #[tokio::test]
    async fn test_commit_refuses_window_conflict() {
        let storage = MemoryStorage::new();
        storage.insert_inventory(wood(10));

        storage
            .commit_job(&record("zach", "2024-03-10T12:00:00Z"), "1234456", 1)
            .await
            .unwrap();
        let err = storage
            .commit_job(&record("zach", "2024-03-10T12:04:00Z"), "1234456", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::ScheduleConflict(_)));
        assert_eq!(storage.quantity_of("1234456"), Some(9));

        storage
            .commit_job(&record("zac", "2024-03-10T12:04:00Z"), "1234456", 1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_window_query_bounds_inclusive() {
        let storage = MemoryStorage::new();
        storage.insert_scheduled(record("zach", "2024-03-10T12:00:00Z").scheduled());

        let at = parse_timestamp("2024-03-10T12:00:00Z").unwrap();
        let hit = storage.jobs_in_window("zach", at, at + Duration::seconds(10)).await.unwrap();
        assert_eq!(hit.len(), 1);
        let hit = storage.jobs_in_window("zach", at - Duration::seconds(10), at).await.unwrap();
        assert_eq!(hit.len(), 1);
        let miss = storage
            .jobs_in_window("zach", at + Duration::seconds(1), at + Duration::seconds(10))
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn test_outage() {
        let storage = MemoryStorage::new();
        storage.set_outage(Some("connection reset".to_string()));
        let err = storage.workflows_named("coupon-prep").await.unwrap_err();
        assert!(matches!(err, PersistenceError::Unavailable(_)));
    }
}
