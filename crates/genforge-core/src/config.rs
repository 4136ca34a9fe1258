//! Centralized configuration for genforge.
//!
//! This module provides configuration constants for the semantic cache, the
//! quality engine, the generation pipeline, the transport and on-disk layout.

use std::time::Duration;

/// Semantic cache defaults.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const CAPACITY: usize = 100;
    pub const SIMILARITY_THRESHOLD: f64 = 0.75;
    pub const MAX_KEY_CHARS: usize = 500;
    /// Tokens shorter than this are ignored by the similarity score.
    pub const MIN_TOKEN_CHARS: usize = 4;
    pub const LENGTH_PENALTY: f64 = 0.3;
    pub const FILE_NAME: &'static str = "semantic-cache.json";
}

/// Quality scoring and repair defaults.
pub struct QualityDefaults;

impl QualityDefaults {
    pub const MIN_SCORE: f64 = 8.0;
    pub const MAX_SCORE: f64 = 10.0;
    pub const UNPARSEABLE_SCORE: f64 = 3.0;
    pub const REPAIR_PASSES: usize = 1;
    pub const MAX_REPAIR_PASSES: usize = 5;
}

/// Generation pipeline stage percentages and enrichment limits.
pub struct PipelineDefaults;

impl PipelineDefaults {
    pub const CACHE_CHECK_PROGRESS: u8 = 5;
    pub const PROMPT_ENHANCEMENT_PROGRESS: u8 = 10;
    pub const MAIN_GENERATION_PROGRESS: u8 = 20;
    /// Streaming sub-events never report past this value.
    pub const STREAMING_PROGRESS_CEILING: u8 = 79;
    pub const QUALITY_PROGRESS: u8 = 80;
    pub const IMAGE_FETCHING_PROGRESS: u8 = 90;
    pub const CACHING_PROGRESS: u8 = 95;
    pub const COMPLETE_PROGRESS: u8 = 100;

    pub const MAX_IMAGE_KEYWORDS: usize = 3;
    pub const IMAGES_PER_KEYWORD: usize = 2;

    pub const STREAM_EVENT_EVERY_CHUNKS: usize = 10;
    pub const STREAM_PREVIEW_CHARS: usize = 200;
}

/// Generation service transport defaults.
pub struct TransportDefaults;

impl TransportDefaults {
    pub const API_BASE_URL: &'static str = "https://api.anthropic.com/";
    pub const API_VERSION: &'static str = "2023-06-01";
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";
    pub const FAST_MODEL: &'static str = "claude-3-5-haiku-20241022";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
}

/// Directory names below the data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const JOBS_DIR_NAME: &'static str = "jobs";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress_is_monotonic() {
        let stages = [
            PipelineDefaults::CACHE_CHECK_PROGRESS,
            PipelineDefaults::PROMPT_ENHANCEMENT_PROGRESS,
            PipelineDefaults::MAIN_GENERATION_PROGRESS,
            PipelineDefaults::STREAMING_PROGRESS_CEILING,
            PipelineDefaults::QUALITY_PROGRESS,
            PipelineDefaults::IMAGE_FETCHING_PROGRESS,
            PipelineDefaults::CACHING_PROGRESS,
            PipelineDefaults::COMPLETE_PROGRESS,
        ];
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_quality_bounds() {
        assert!(QualityDefaults::UNPARSEABLE_SCORE < QualityDefaults::MIN_SCORE);
        assert!(QualityDefaults::MIN_SCORE <= QualityDefaults::MAX_SCORE);
        assert!(QualityDefaults::REPAIR_PASSES <= QualityDefaults::MAX_REPAIR_PASSES);
    }

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(TransportDefaults::REQUEST_TIMEOUT > Duration::ZERO);
        assert!(TransportDefaults::RETRY_BASE_DELAY < TransportDefaults::RETRY_MAX_DELAY);
    }
}
