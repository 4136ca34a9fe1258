//! Semantic cache handlers.

use crate::server::AppState;
use serde_json::Value;

pub async fn get_cache_stats(state: &AppState, _params: &Value) -> genforge_core::Result<Value> {
    Ok(serde_json::to_value(state.forge.cache_stats())?)
}

pub async fn clear_cache(state: &AppState, _params: &Value) -> genforge_core::Result<Value> {
    state.forge.clear_cache().await?;
    Ok(Value::Null)
}
