//! Progress stages and event delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::config::PipelineDefaults;

/// Named stage of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CacheCheck,
    CacheHit,
    PromptEnhancement,
    MainGeneration,
    /// Partial output arriving from the transport.
    Streaming,
    QualityEnhancement,
    ImageFetching,
    Caching,
    Complete,
    Error,
}

impl Stage {
    /// Percent complete reported when the stage starts.
    ///
    /// Streaming events compute their own value between main generation and
    /// quality enhancement.
    pub fn progress(&self) -> u8 {
        match self {
            Stage::CacheCheck => PipelineDefaults::CACHE_CHECK_PROGRESS,
            Stage::CacheHit | Stage::Complete => PipelineDefaults::COMPLETE_PROGRESS,
            Stage::PromptEnhancement => PipelineDefaults::PROMPT_ENHANCEMENT_PROGRESS,
            Stage::MainGeneration | Stage::Streaming => PipelineDefaults::MAIN_GENERATION_PROGRESS,
            Stage::QualityEnhancement => PipelineDefaults::QUALITY_PROGRESS,
            Stage::ImageFetching => PipelineDefaults::IMAGE_FETCHING_PROGRESS,
            Stage::Caching => PipelineDefaults::CACHING_PROGRESS,
            Stage::Error => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CacheCheck => "cache_check",
            Stage::CacheHit => "cache_hit",
            Stage::PromptEnhancement => "prompt_enhancement",
            Stage::MainGeneration => "main_generation",
            Stage::Streaming => "streaming",
            Stage::QualityEnhancement => "quality_enhancement",
            Stage::ImageFetching => "image_fetching",
            Stage::Caching => "caching",
            Stage::Complete => "complete",
            Stage::Error => "error",
        }
    }
}

/// Progress for streamed output: main generation plus a tenth of the chunk
/// count, held below the quality stage.
pub fn streaming_progress(processed_chunks: usize) -> u8 {
    let advanced = PipelineDefaults::MAIN_GENERATION_PROGRESS as usize + processed_chunks / 10;
    advanced.min(PipelineDefaults::STREAMING_PROGRESS_CEILING as usize) as u8
}

/// One progress record; jobs keep these in their `steps` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub step: Stage,
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Event at the stage's nominal progress.
    pub fn stage(step: Stage, message: impl Into<String>) -> Self {
        Self::at(step, step.progress(), message)
    }

    pub fn at(step: Stage, progress: u8, message: impl Into<String>) -> Self {
        Self {
            step,
            progress: progress.min(100),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Receiver of progress events.
///
/// Emission is best effort and must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // A closed receiver means nobody is listening any more.
        let _ = self.send(event);
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

/// Records events in memory.
#[derive(Debug, Default)]
pub struct ProgressLog {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().expect("progress lock poisoned").clone()
    }

    /// Stages in emission order.
    pub fn stages(&self) -> Vec<Stage> {
        self.events
            .lock()
            .expect("progress lock poisoned")
            .iter()
            .map(|e| e.step)
            .collect()
    }
}

impl ProgressSink for ProgressLog {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .expect("progress lock poisoned")
            .push(event);
    }
}
