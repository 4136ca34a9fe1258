//! Job submission and lookup handlers.

use super::{get_object_param, require_str_param};
use crate::server::AppState;
use genforge_core::GenforgeError;
use serde_json::Value;

pub async fn submit_generation(state: &AppState, params: &Value) -> genforge_core::Result<Value> {
    let prompt = require_str_param(params, "prompt", "prompt")?;
    if prompt.trim().is_empty() {
        return Err(GenforgeError::InvalidParams {
            message: "prompt must not be empty".to_string(),
        });
    }
    let metadata = get_object_param(params, "metadata", "metadata").unwrap_or_default();

    let job_id = state.forge.submit(prompt, metadata).await?;
    Ok(Value::String(job_id))
}

pub async fn get_job(state: &AppState, params: &Value) -> genforge_core::Result<Value> {
    let job_id = require_str_param(params, "job_id", "jobId")?;
    let job = state.forge.get_job(&job_id)?;
    Ok(serde_json::to_value(job)?)
}

pub async fn list_jobs(state: &AppState, _params: &Value) -> genforge_core::Result<Value> {
    Ok(serde_json::to_value(state.forge.list_jobs())?)
}
