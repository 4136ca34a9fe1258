//! Error types for genforge.
//!
//! Structural problems in generated output are never errors: the quality
//! engine repairs them locally. The variants here cover what can actually
//! fail: disk persistence, the transport, and caller mistakes.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the genforge library.
#[derive(Debug, Error)]
pub enum GenforgeError {
    // Transport errors
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        /// HTTP status returned by the generation service, if any
        status_code: Option<u16>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("Image search failed for {keyword}: {message}")]
    Enrichment { keyword: String, message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Job queue errors
    #[error("Job not found: {job_id}")]
    JobNotFound { job_id: String },

    #[error("Invalid job id: {0}")]
    InvalidJobId(String),

    #[error("Failed to persist job {job_id}: {message}")]
    JobPersistence { job_id: String, message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for genforge operations.
pub type Result<T> = std::result::Result<T, GenforgeError>;

impl From<std::io::Error> for GenforgeError {
    fn from(err: std::io::Error) -> Self {
        GenforgeError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for GenforgeError {
    fn from(err: serde_json::Error) -> Self {
        GenforgeError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

/// Timeouts map to `Transport`; only the code that configured the client
/// knows the limit to put in [`GenforgeError::Timeout`].
impl From<reqwest::Error> for GenforgeError {
    fn from(err: reqwest::Error) -> Self {
        GenforgeError::Transport {
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()),
        }
    }
}

impl GenforgeError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        GenforgeError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Transport/connectivity error
    /// - -32002: Job not found
    /// - -32005: Validation error
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            GenforgeError::Transport { .. }
            | GenforgeError::Timeout(_)
            | GenforgeError::RateLimited { .. }
            | GenforgeError::Enrichment { .. } => -32000,

            GenforgeError::JobNotFound { .. } | GenforgeError::InvalidJobId(_) => -32002,

            GenforgeError::InvalidParams { .. } => -32602,

            GenforgeError::Validation { .. } => -32005,

            _ => -32603,
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenforgeError::Timeout(_) | GenforgeError::RateLimited { .. } => true,
            GenforgeError::Transport { status_code, .. } => match status_code {
                None => true,
                Some(code) => *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }
}
