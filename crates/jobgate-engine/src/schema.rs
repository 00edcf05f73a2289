//! Declarative schema validation for submissions and workflow steps
//!
//! Validation is fail-fast: only the first violation is reported. A schema can
//! replace the generated message for a keyword by declaring an `errorMessage`
//! object next to it, keyed by keyword name:
//!
//! ```json
//! { "type": "string", "pattern": "^.+@.+$", "errorMessage": { "pattern": "Invalid user_email pattern" } }
//! ```

use crate::error::{SubmissionError, ValidationError, ValidationResult};
use crate::types::JobSubmission;
use serde_json::Value;
use tracing::debug;

/// Schema shipped with the engine for the top-level submission document
pub const SUBMISSION_SCHEMA: &str = include_str!("../schemas/job_submission.json");

const CUSTOM_MESSAGE_KEY: &str = "errorMessage";

/// Something that can accept or reject a JSON document
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value) -> ValidationResult<()>;
}

/// Validator compiled from a JSON schema value
pub struct SchemaValidator {
    schema: Value,
    compiled: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn new(schema: Value) -> Result<Self, SubmissionError> {
        let compiled = jsonschema::validator_for(&schema)
            .map_err(|e| SubmissionError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema, compiled })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, value: &Value) -> ValidationResult<()> {
        self.compiled.validate(value).map_err(|error| {
            let schema_path = error.schema_path.to_string();
            let message = custom_message(&self.schema, &schema_path)
                .unwrap_or_else(|| error.to_string());
            debug!(schema_path = %schema_path, message = %message, "schema violation");
            ValidationError::SchemaViolation(message)
        })
    }
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// Look up the custom message for the keyword at `schema_path`
/// (a JSON pointer such as `/properties/user_email/pattern`).
fn custom_message(schema: &Value, schema_path: &str) -> Option<String> {
    let (parent, keyword) = schema_path.rsplit_once('/')?;
    let subschema = if parent.is_empty() {
        schema
    } else {
        schema.pointer(parent)?
    };

    subschema
        .get(CUSTOM_MESSAGE_KEY)?
        .get(keyword)?
        .as_str()
        .map(str::to_owned)
}

/// Top-level submission validator
#[derive(Debug)]
pub struct SubmissionSchema {
    validator: SchemaValidator,
}

impl SubmissionSchema {
    /// Compile the bundled submission schema
    pub fn bundled() -> Result<Self, SubmissionError> {
        let schema: Value = serde_json::from_str(SUBMISSION_SCHEMA)
            .map_err(|e| SubmissionError::InvalidSchema(e.to_string()))?;
        Self::from_value(schema)
    }

    pub fn from_value(schema: Value) -> Result<Self, SubmissionError> {
        Ok(Self {
            validator: SchemaValidator::new(schema)?,
        })
    }

    /// Validate required fields, unknown fields and field patterns, then
    /// decode the submission.
    pub fn validate_top_level(&self, document: &Value) -> ValidationResult<JobSubmission> {
        self.validator.validate(document)?;
        serde_json::from_value(document.clone())
            .map_err(|e| ValidationError::SchemaViolation(e.to_string()))
    }
}

/// Validate job inputs against one step's declared input schema
pub fn validate_step_inputs(
    job_inputs: &Value,
    step_schema: &Value,
) -> Result<(), SubmissionError> {
    let validator = SchemaValidator::new(step_schema.clone())?;
    validator.validate(job_inputs)?;
    Ok(())
}
