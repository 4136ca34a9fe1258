//! Semantic cache configuration and entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CacheDefaults;
use crate::models::{Metadata, StructuredOutput};

/// Configuration for cache behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Maximum number of entries; the least recently accessed entry is
    /// evicted before an insert that would exceed it.
    pub capacity: usize,
    /// Minimum similarity for an approximate hit.
    pub similarity_threshold: f64,
    /// Normalized keys are truncated to this many characters.
    pub max_key_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: CacheDefaults::CAPACITY,
            similarity_threshold: CacheDefaults::SIMILARITY_THRESHOLD,
            max_key_chars: CacheDefaults::MAX_KEY_CHARS,
        }
    }
}

/// A cached generation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Normalized prompt this entry is stored under.
    pub key: String,
    pub result: StructuredOutput,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    #[serde(default)]
    pub hit_count: u64,
}

/// Outcome of a successful lookup.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub key: String,
    pub result: StructuredOutput,
    /// 1.0 for exact key matches.
    pub similarity: f64,
    pub exact: bool,
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub total_hits: u64,
    pub average_hits: f64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}
