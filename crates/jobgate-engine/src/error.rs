//! Error types for job submission handling

use thiserror::Error;

/// Top-level error for a submission run.
///
/// Validation failures are expected outcomes and are reported back to the
/// submitter. Every other variant is an infrastructure failure of one of the
/// collaborators and should be treated as retryable by the caller.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SubmissionError {
    pub fn is_validation(&self) -> bool {
        matches!(self, SubmissionError::Validation(_))
    }
}

/// Rejections of a submission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// First schema violation, or the schema's custom message for it
    #[error("{0}")]
    SchemaViolation(String),

    #[error("Invalid Workflow Name")]
    InvalidWorkflow,

    #[error("Invalid Workflow Name or Version")]
    InvalidWorkflowVersion,

    /// Independent business-rule failures, in evaluation order
    #[error("{}", .0.join("; "))]
    Aggregated(Vec<String>),
}

impl ValidationError {
    /// Messages carried by this error, one per failed rule
    pub fn messages(&self) -> Vec<String> {
        match self {
            ValidationError::Aggregated(messages) => messages.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Storage collaborator errors
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Data not found: {0}")]
    NotFound(String),

    #[error("Insufficient quantity on {material_id}: {available} available, {requested} requested")]
    InsufficientQuantity {
        material_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Schedule conflict for instance {0}")]
    ScheduleConflict(String),

    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Notification sink errors
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Queue closed")]
    Closed,
}

/// Instance registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Registry unavailable: {0}")]
    Unavailable(String),
}

/// Convenience result types
pub type Result<T> = std::result::Result<T, SubmissionError>;
pub type ValidationResult<T> = std::result::Result<T, ValidationError>;
pub type PersistenceResult<T> = std::result::Result<T, PersistenceError>;
pub type QueueResult<T> = std::result::Result<T, QueueError>;
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
