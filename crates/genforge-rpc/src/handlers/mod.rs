//! JSON-RPC request handlers, split by domain.

mod cache;
mod jobs;

use crate::server::AppState;
use crate::wrapper::wrap_response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use genforge_core::{GenforgeError, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// JSON-RPC code for a request that is not JSON-RPC 2.0.
const INVALID_REQUEST: i32 = -32600;
/// JSON-RPC code for an unknown method.
const METHOD_NOT_FOUND: i32 = -32601;

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> genforge_core::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| GenforgeError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract an optional object parameter.
pub(crate) fn get_object_param(params: &Value, snake: &str, camel: &str) -> Option<Metadata> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .and_then(|v| v.as_object())
        .cloned()
}

// ============================================================================
// HTTP handlers
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if request.jsonrpc != "2.0" {
        warn!("Rejected {} with jsonrpc version {:?}", method, request.jsonrpc);
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::error(
                id,
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"".to_string(),
            )),
        );
    }

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    let response = match dispatch_method(&state, method, &params).await {
        Some(Ok(value)) => JsonRpcResponse::success(id, wrap_response(method, value)),
        Some(Err(e)) => {
            error!("RPC error for {}: {}", method, e);
            JsonRpcResponse::error(id, e.to_rpc_error_code(), e.to_string())
        }
        None => {
            warn!("Method not found: {}", method);
            JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
        }
    };
    (StatusCode::OK, Json(response))
}

// ============================================================================
// Method dispatcher
// ============================================================================

/// Dispatch a method call to its handler; `None` for unknown methods.
async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> Option<genforge_core::Result<Value>> {
    let result = match method {
        // Jobs
        "submit_generation" => jobs::submit_generation(state, params).await,
        "get_job" => jobs::get_job(state, params).await,
        "list_jobs" => jobs::list_jobs(state, params).await,

        // Cache
        "get_cache_stats" => cache::get_cache_stats(state, params).await,
        "clear_cache" => cache::clear_cache(state, params).await,

        _ => return None,
    };
    Some(result)
}
