//! Request/response envelopes for event-style invocation
//!
//! An inbound event carries the submission in `body`, either as a serialized
//! JSON string or inline. The response mirrors it: a status code, headers and
//! a serialized JSON body.

use crate::error::{Result, ServerError};
use axum::http::StatusCode;
use jobgate_engine::{JobRecord, SubmissionEngine};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::info;

pub const SUCCESS_MESSAGE: &str = "Job is Successful";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub body: Value,
    /// Accepted and ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
}

impl RequestEnvelope {
    /// The submission document carried in `body`
    pub fn submission(&self) -> Result<Value> {
        match &self.body {
            Value::String(raw) => serde_json::from_str(raw)
                .map_err(|e| ServerError::BadRequest(format!("body is not valid JSON: {e}"))),
            Value::Object(_) => Ok(self.body.clone()),
            _ => Err(ServerError::BadRequest(
                "body must be a JSON object or a JSON-encoded string".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// Serialized JSON
    pub body: String,
}

impl ResponseEnvelope {
    fn new(status: StatusCode, body: &Value) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: status.as_u16(),
            headers,
            body: body.to_string(),
        }
    }

    pub fn accepted(record: &JobRecord) -> Self {
        Self::new(StatusCode::OK, &accepted_body(record))
    }

    pub fn from_error(error: &ServerError) -> Self {
        Self::new(error.status(), &error.body())
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

pub fn accepted_body(record: &JobRecord) -> Value {
    json!({
        "message": SUCCESS_MESSAGE,
        "job_id": record.job_id.to_string(),
    })
}

/// Run one event through the engine. Every outcome, including collaborator
/// failures, is rendered into the response envelope.
pub async fn handle_event(engine: &SubmissionEngine, envelope: &RequestEnvelope) -> ResponseEnvelope {
    info!(version = ?envelope.version, "received event");

    let outcome = match envelope.submission() {
        Ok(document) => engine.submit(&document).await.map_err(ServerError::from),
        Err(e) => Err(e),
    };

    match outcome {
        Ok(record) => ResponseEnvelope::accepted(&record),
        Err(e) => ResponseEnvelope::from_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_body_is_decoded() {
        let envelope: RequestEnvelope = serde_json::from_value(json!({
            "version": "2.0",
            "body": "{\"workflow\": \"coupon-prep\"}"
        }))
        .unwrap();
        assert_eq!(envelope.submission().unwrap(), json!({ "workflow": "coupon-prep" }));
    }

    #[test]
    fn test_object_body_passes_through() {
        let envelope: RequestEnvelope =
            serde_json::from_value(json!({ "body": { "workflow": "coupon-prep" } })).unwrap();
        assert_eq!(envelope.submission().unwrap(), json!({ "workflow": "coupon-prep" }));
    }

    #[test]
    fn test_malformed_body() {
        for body in [json!("{not json"), json!(42), json!(null)] {
            let envelope = RequestEnvelope { body, version: None };
            assert!(matches!(envelope.submission(), Err(ServerError::BadRequest(_))));
        }
    }

    #[test]
    fn test_error_envelope_shape() {
        let response = ResponseEnvelope::from_error(&ServerError::BadRequest("bad".to_string()));
        assert_eq!(response.status_code, 400);
        assert_eq!(response.headers["Content-Type"], "application/json");

        let body: Value = serde_json::from_str(&response.body).unwrap();
        assert_eq!(body, json!({ "errorMessage": "bad" }));

        let wire = serde_json::to_value(&response).unwrap();
        assert_eq!(wire["statusCode"], json!(400));
    }
}
