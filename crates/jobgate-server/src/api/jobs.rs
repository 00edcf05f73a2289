use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use jobgate_engine::JobRecord;
use serde_json::Value;
use std::sync::Arc;

use crate::envelope::{RequestEnvelope, ResponseEnvelope, accepted_body, handle_event};
use crate::{AppState, Result, ServerError};

fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T> {
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("request body is not valid JSON: {e}")))
}

pub async fn submit(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>> {
    let document: Value = parse_json(&body)?;
    let record = state.engine.submit(&document).await?;
    Ok(Json(accepted_body(&record)))
}

pub async fn invoke(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (axum::http::StatusCode, Json<ResponseEnvelope>) {
    let response = match parse_json::<RequestEnvelope>(&body) {
        Ok(envelope) => handle_event(&state.engine, &envelope).await,
        Err(e) => ResponseEnvelope::from_error(&e),
    };
    (response.status(), Json(response))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobRecord>> {
    let record = state
        .engine
        .storage()
        .job(&job_id)
        .await
        .map_err(jobgate_engine::SubmissionError::from)?
        .ok_or_else(|| ServerError::NotFound(format!("Job not found: {job_id}")))?;
    Ok(Json(record))
}
