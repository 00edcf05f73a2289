//! Accepted job payload construction

use crate::error::{SubmissionError, ValidationResult};
use crate::types::{JobId, JobRecord, JobState, JobSubmission, StepDefinition, StepEntry, WorkflowDefinition};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

pub fn start_topic(instance: &str, function: &str, step_id: usize) -> String {
    format!("cmd/{instance}/{function}/{step_id}/start")
}

pub fn response_topic(instance: &str, function: &str, step_id: usize) -> String {
    format!("cmd/{instance}/{function}/{step_id}/results")
}

/// Values for the properties a step declares. A missing or empty input falls
/// back to the property's `default`; a property with neither is omitted.
fn resolve_step_data(step: &StepDefinition, job_inputs: &Map<String, Value>) -> Map<String, Value> {
    let Some(properties) = step.step_data.get("properties").and_then(Value::as_object) else {
        return Map::new();
    };

    let mut data = Map::new();
    for (name, property) in properties {
        let input = job_inputs.get(name);
        let blank = match input {
            None => true,
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        };

        match (blank, property.get("default"), input) {
            (true, Some(default), _) => {
                data.insert(name.clone(), default.clone());
            }
            (_, _, Some(value)) => {
                data.insert(name.clone(), value.clone());
            }
            _ => {}
        }
    }
    data
}

/// One entry per workflow step, in order, with 1-based ids; the last entry is
/// flagged as the end of the process.
pub fn build_step_map(
    instance: &str,
    workflow: &WorkflowDefinition,
    job_inputs: &Map<String, Value>,
) -> Vec<StepEntry> {
    let total = workflow.steps.len();

    workflow
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            let step_id = index + 1;
            StepEntry {
                function: step.function.clone(),
                step_data: resolve_step_data(step, job_inputs),
                start_topic: start_topic(instance, &step.function, step_id),
                response_topic: response_topic(instance, &step.function, step_id),
                is_done: false,
                step_id,
                process_end: (step_id == total).then_some(true),
            }
        })
        .collect()
}

/// Everything needed from a validated submission to build its record
pub struct AcceptedJob<'a> {
    pub submission: &'a JobSubmission,
    pub workflow: &'a WorkflowDefinition,
    pub timeout_secs: i64,
    pub requested_start_time: DateTime<Utc>,
}

impl AcceptedJob<'_> {
    pub fn into_record(self, job_id: JobId, submitted_at: DateTime<Utc>) -> ValidationResult<JobRecord> {
        let submission = self.submission;

        Ok(JobRecord {
            job_id,
            user_name: submission.user_name.clone(),
            user_email: submission.user_email.clone(),
            workflow: submission.workflow.clone(),
            workflow_version: self.workflow.version.clone(),
            workflow_timeout: self.timeout_secs,
            instance: submission.instance.clone(),
            coupon_material: submission.coupon_material()?.to_string(),
            coupon_quantity: submission.coupon_quantity()?,
            job_requested_start_time: self.requested_start_time,
            job_submitted_time: submitted_at,
            job_state: JobState::Queued,
            step_map: build_step_map(&submission.instance, self.workflow, &submission.job_inputs),
        })
    }
}

/// Longest timeout a stored workflow may declare
pub const MAX_WORKFLOW_TIMEOUT_SECS: i64 = 30 * 24 * 60 * 60;

/// Workflow timeout in seconds, within `0..=MAX_WORKFLOW_TIMEOUT_SECS`
pub fn workflow_timeout(workflow: &WorkflowDefinition) -> Result<i64, SubmissionError> {
    let timeout = workflow.timeout_secs().ok_or_else(|| {
        SubmissionError::Internal(format!(
            "workflow {} {} has a non-integer timeout: {}",
            workflow.name, workflow.version, workflow.timeout
        ))
    })?;

    if !(0..=MAX_WORKFLOW_TIMEOUT_SECS).contains(&timeout) {
        return Err(SubmissionError::Internal(format!(
            "workflow {} {} timeout {} is outside 0..={}",
            workflow.name, workflow.version, timeout, MAX_WORKFLOW_TIMEOUT_SECS
        )));
    }
    Ok(timeout)
}
