//! Workflow resolution by name and optional version

use crate::error::{Result, ValidationError};
use crate::persistence::Storage;
use crate::types::WorkflowDefinition;
use tracing::{debug, info};

/// Resolve the workflow a submission names.
///
/// Without a version, the highest dotted-numeric version stored under `name`
/// is selected. With a version, the exact (name, version) pair must exist.
pub async fn resolve_workflow(
    storage: &dyn Storage,
    name: &str,
    version: Option<&str>,
) -> Result<WorkflowDefinition> {
    match version {
        None => {
            let records = storage.workflows_named(name).await?;
            debug!(workflow = name, candidates = records.len(), "resolving latest version");
            let latest = latest_version(records).ok_or(ValidationError::InvalidWorkflow)?;
            info!(workflow = name, version = %latest.version, "resolved workflow");
            Ok(latest)
        }
        Some(version) => {
            let records = storage.workflow_version(name, version).await?;
            let workflow = records
                .into_iter()
                .next()
                .ok_or(ValidationError::InvalidWorkflowVersion)?;
            info!(workflow = name, version, "resolved workflow");
            Ok(workflow)
        }
    }
}

/// Pick the maximum version, comparing dot-separated components as integers.
///
/// The first record seen with the maximum version is kept. Records whose
/// version does not parse are skipped unless nothing else is available.
pub fn latest_version(records: Vec<WorkflowDefinition>) -> Option<WorkflowDefinition> {
    let mut best: Option<(Vec<u64>, WorkflowDefinition)> = None;
    let mut fallback = None;

    for record in records {
        let Some(components) = parse_version(&record.version) else {
            fallback.get_or_insert(record);
            continue;
        };

        match &best {
            Some((max, _)) if components <= *max => {}
            _ => best = Some((components, record)),
        }
    }

    best.map(|(_, record)| record).or(fallback)
}

/// Split a dotted version string into integer components
pub fn parse_version(version: &str) -> Option<Vec<u64>> {
    version
        .split('.')
        .map(|component| component.parse::<u64>().ok())
        .collect()
}
