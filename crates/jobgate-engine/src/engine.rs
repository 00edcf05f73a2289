//! Submission orchestration
//!
//! A submission moves through fail-fast stages (top-level schema, workflow
//! resolution, per-step schemas) and then three independent business checks
//! whose failures are collected into one rejection. Accepted jobs are
//! committed to storage and published.

use crate::error::{PersistenceError, Result, SubmissionError, ValidationError};
use crate::instance::instance_exists;
use crate::inventory::{available_quantity, shortage_message};
use crate::payload::{AcceptedJob, workflow_timeout};
use crate::persistence::Storage;
use crate::queue::{NotificationSink, publish_job};
use crate::registry::InstanceRegistry;
use crate::schedule::{SchedulingPolicy, evaluate_schedule};
use crate::schema::{SubmissionSchema, validate_step_inputs};
use crate::time::format_timestamp;
use crate::types::{JobId, JobRecord};
use crate::workflow::resolve_workflow;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

pub const INVALID_INSTANCE: &str = "Invalid Instance Name";

/// Source of "now" for scheduling decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a single instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Serializes check-then-commit per contested resource
#[derive(Default)]
struct ResourceLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ResourceLocks {
    /// Acquire every key in sorted order so overlapping submissions cannot
    /// deadlock.
    async fn acquire(&self, mut keys: Vec<String>) -> ResourceLease<'_> {
        keys.sort();
        keys.dedup();

        let handles: Vec<_> = {
            let mut locks = self.locks.lock();
            keys.iter()
                .map(|key| locks.entry(key.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }

        ResourceLease {
            owner: self,
            keys,
            guards,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Held resource locks. Entries nobody else is waiting on are removed from
/// the map on release.
struct ResourceLease<'a> {
    owner: &'a ResourceLocks,
    keys: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl ResourceLease<'_> {
    #[cfg(test)]
    fn len(&self) -> usize {
        self.guards.len()
    }
}

impl Drop for ResourceLease<'_> {
    fn drop(&mut self) {
        self.guards.clear();

        let mut locks = self.owner.locks.lock();
        for key in &self.keys {
            if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(key);
            }
        }
    }
}

/// Validates job submissions and dispatches the accepted ones
pub struct SubmissionEngine {
    storage: Arc<dyn Storage>,
    sink: Arc<dyn NotificationSink>,
    registry: Arc<dyn InstanceRegistry>,
    schema: SubmissionSchema,
    policy: SchedulingPolicy,
    clock: Arc<dyn Clock>,
    locks: ResourceLocks,
}

impl SubmissionEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        sink: Arc<dyn NotificationSink>,
        registry: Arc<dyn InstanceRegistry>,
    ) -> Result<Self> {
        Ok(Self {
            storage,
            sink,
            registry,
            schema: SubmissionSchema::bundled()?,
            policy: SchedulingPolicy::default(),
            clock: Arc::new(SystemClock),
            locks: ResourceLocks::default(),
        })
    }

    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_schema(mut self, schema: SubmissionSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn policy(&self) -> &SchedulingPolicy {
        &self.policy
    }

    /// Validate a submission document and, if every check passes, commit and
    /// publish the resulting job.
    #[instrument(skip_all)]
    pub async fn submit(&self, document: &Value) -> Result<JobRecord> {
        let submission = self.schema.validate_top_level(document)?;
        info!(
            workflow = %submission.workflow,
            instance = %submission.instance,
            user = %submission.user_email,
            "validating submission"
        );

        let workflow = resolve_workflow(
            self.storage.as_ref(),
            &submission.workflow,
            submission.requested_version(),
        )
        .await?;

        let job_inputs = Value::Object(submission.job_inputs.clone());
        for step in &workflow.steps {
            debug!(function = %step.function, "validating step inputs");
            validate_step_inputs(&job_inputs, &step.step_data)?;
        }

        let timeout_secs = workflow_timeout(&workflow)?;
        let material = submission.coupon_material()?.to_string();
        let quantity = submission.coupon_quantity()?;
        let requested_start_time = submission.requested_start_time()?;

        let _lease = self
            .locks
            .acquire(vec![
                format!("instance/{}", submission.instance),
                format!("material/{material}"),
            ])
            .await;

        let now = self.clock.now();
        let (listing, inventory, schedule) = tokio::join!(
            self.registry.list_things(),
            self.storage.inventory_for(&material),
            evaluate_schedule(
                self.storage.as_ref(),
                &self.policy,
                now,
                requested_start_time,
                &submission.instance,
                timeout_secs,
            ),
        );
        let (listing, inventory, schedule) = (listing?, inventory?, schedule?);

        let availability = available_quantity(&material, &inventory);

        let mut messages = Vec::new();
        if !instance_exists(&submission.instance, &listing) {
            messages.push(INVALID_INSTANCE.to_string());
        }
        if !availability.satisfies(quantity) {
            messages.push(shortage_message(&material, availability.quantity));
        } else if !schedule.valid {
            messages.push(schedule.message);
        }

        if !messages.is_empty() {
            info!(instance = %submission.instance, ?messages, "submission rejected");
            return Err(ValidationError::Aggregated(messages).into());
        }

        let material_id = availability.material_id.ok_or_else(|| {
            SubmissionError::Internal(format!("no inventory record id for {material}"))
        })?;

        let record = AcceptedJob {
            submission: &submission,
            workflow: &workflow,
            timeout_secs,
            requested_start_time,
        }
        .into_record(JobId::new(), now)?;

        self.commit(&record, &material_id, now).await?;
        publish_job(self.sink.as_ref(), &record).await?;

        info!(
            job_id = %record.job_id,
            instance = %record.instance,
            workflow = %record.workflow,
            version = %record.workflow_version,
            "job accepted"
        );
        Ok(record)
    }

    /// Commit the record, turning a storage-side refusal back into the
    /// rejection the checks would have produced.
    async fn commit(
        &self,
        record: &JobRecord,
        material_id: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match self
            .storage
            .commit_job(record, material_id, record.coupon_quantity)
            .await
        {
            Ok(()) => Ok(()),
            Err(PersistenceError::InsufficientQuantity { available, .. }) => {
                warn!(material_id, available, "inventory changed before commit");
                Err(ValidationError::Aggregated(vec![shortage_message(
                    &record.coupon_material,
                    available,
                )])
                .into())
            }
            Err(PersistenceError::ScheduleConflict(instance)) => {
                warn!(instance = %instance, "schedule changed before commit");
                let decision = evaluate_schedule(
                    self.storage.as_ref(),
                    &self.policy,
                    now,
                    record.job_requested_start_time,
                    &record.instance,
                    record.workflow_timeout,
                )
                .await?;
                let message = if decision.valid {
                    format!(
                        "job cannot be scheduled at {}",
                        format_timestamp(&record.job_requested_start_time)
                    )
                } else {
                    decision.message
                };
                Err(ValidationError::Aggregated(vec![message]).into())
            }
            Err(other) => Err(other.into()),
        }
    }
}
