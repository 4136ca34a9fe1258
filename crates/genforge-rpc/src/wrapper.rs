//! Response wrapping for client compatibility.
//!
//! Clients expect `{success: true, <field>: data}` objects rather than the
//! bare values the handlers produce.

use serde_json::{json, Value};

/// Wrap a handler result in the shape clients expect for `method`.
pub fn wrap_response(method: &str, result: Value) -> Value {
    match method {
        "submit_generation" => json!({ "success": true, "job_id": result }),
        "get_job" => json!({ "success": true, "job": result }),
        "list_jobs" => json!({
            "success": true,
            "jobs": if result.is_null() { json!([]) } else { result }
        }),
        "get_cache_stats" => json!({ "success": true, "stats": result }),
        "clear_cache" => json!({ "success": true }),
        _ => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_job_id() {
        assert_eq!(
            wrap_response("submit_generation", json!("abc")),
            json!({"success": true, "job_id": "abc"})
        );
    }

    #[test]
    fn test_null_list_becomes_empty() {
        assert_eq!(wrap_response("list_jobs", Value::Null)["jobs"], json!([]));
    }

    #[test]
    fn test_unknown_methods_pass_through() {
        assert_eq!(wrap_response("health_check", json!({"status": "ok"}))["status"], "ok");
    }
}
