//! Core domain types for job submissions

use crate::error::{ValidationError, ValidationResult};
use crate::time::{self, timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for an accepted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job submission as sent by the client, after top-level schema validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    pub user_name: String,
    pub user_email: String,
    pub workflow: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_version: Option<String>,
    pub instance: String,
    pub job_inputs: Map<String, Value>,
}

impl JobSubmission {
    /// Requested workflow version; an empty string counts as absent
    pub fn requested_version(&self) -> Option<&str> {
        self.workflow_version
            .as_deref()
            .filter(|version| !version.is_empty())
    }

    pub fn coupon_material(&self) -> ValidationResult<&str> {
        self.job_inputs
            .get("coupon_material")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_input("coupon_material"))
    }

    pub fn coupon_quantity(&self) -> ValidationResult<i64> {
        self.job_inputs
            .get("coupon_quantity")
            .and_then(Value::as_i64)
            .ok_or_else(|| missing_input("coupon_quantity"))
    }

    pub fn requested_start_time(&self) -> ValidationResult<DateTime<Utc>> {
        let raw = self
            .job_inputs
            .get("job_requested_start_time")
            .and_then(Value::as_str)
            .ok_or_else(|| missing_input("job_requested_start_time"))?;

        time::parse_timestamp(raw).ok_or_else(|| {
            ValidationError::SchemaViolation(format!(
                "\"{raw}\" is not a valid job_requested_start_time"
            ))
        })
    }
}

fn missing_input(name: &str) -> ValidationError {
    ValidationError::SchemaViolation(format!("\"{name}\" is a required property"))
}

/// Workflow definition, keyed by (name, version)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    /// Dotted numeric version, e.g. "2.0.0"
    pub version: String,
    /// Seconds, as an integer-valued string
    pub timeout: String,
    pub steps: Vec<StepDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WorkflowDefinition {
    pub fn timeout_secs(&self) -> Option<i64> {
        self.timeout.trim().parse().ok()
    }
}

/// One stage of a workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    pub function: String,
    /// JSON schema for the inputs this step consumes
    pub step_data: Value,
    #[serde(default)]
    pub process_end: bool,
}

/// Raw material stock entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub material_id: String,
    pub coupon_material: String,
    pub coupon_quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_description: Option<String>,
}

/// Lifecycle state of a job record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Queued,
    InProgress,
    Completed,
    Failed,
}

/// Entry of the step map sent downstream with an accepted job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEntry {
    pub function: String,
    pub step_data: Map<String, Value>,
    pub start_topic: String,
    pub response_topic: String,
    pub is_done: bool,
    /// 1-based position in the workflow
    pub step_id: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_end: Option<bool>,
}

/// Job record persisted and published on acceptance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub user_name: String,
    pub user_email: String,
    pub workflow: String,
    pub workflow_version: String,
    pub workflow_timeout: i64,
    pub instance: String,
    pub coupon_material: String,
    pub coupon_quantity: i64,
    #[serde(with = "timestamp")]
    pub job_requested_start_time: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub job_submitted_time: DateTime<Utc>,
    pub job_state: JobState,
    pub step_map: Vec<StepEntry>,
}

impl JobRecord {
    pub fn scheduled(&self) -> ScheduledJob {
        ScheduledJob {
            job_id: self.job_id.to_string(),
            instance: self.instance.clone(),
            job_requested_start_time: self.job_requested_start_time,
            job_state: self.job_state,
        }
    }
}

/// Scheduling view of an existing job, as read for conflict detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub job_id: String,
    pub instance: String,
    #[serde(with = "timestamp")]
    pub job_requested_start_time: DateTime<Utc>,
    #[serde(default)]
    pub job_state: JobState,
}

/// Entry of the instance registry listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisteredThing {
    pub thing_name: String,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl RegisteredThing {
    pub fn instance_name(&self) -> Option<&str> {
        self.attributes.get("instance").map(String::as_str)
    }
}
