//! End-to-end execution of one generation request.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::collaborators::{GenerationTransport, ImageSearch, PromptEnhancer, StreamProgress};
use super::fallback::fallback_output;
use super::keywords::image_keywords;
use super::progress::{streaming_progress, ProgressEvent, ProgressSink, Stage};
use crate::cache::SemanticCache;
use crate::config::{PipelineDefaults, QualityDefaults};
use crate::models::{Metadata, OutputMetadata, StructuredOutput};
use crate::quality::QualityEngine;
use crate::Result;

/// Metadata keys owned by the pipeline; request metadata cannot override them.
const RESERVED_METADATA_KEYS: &[&str] = &[
    "cached",
    "fallback",
    "qualityScore",
    "improvements",
    "processingTimeMs",
    "generatedAt",
    "prompt",
    "error",
];

/// A prompt plus caller metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Application domain the caller asked for, if any.
    pub fn domain_hint(&self) -> Option<&str> {
        self.metadata.get("domain").and_then(Value::as_str)
    }
}

/// Switches for the optional pipeline stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineOptions {
    pub use_cache: bool,
    pub enhance_prompts: bool,
    pub quality_check: bool,
    pub max_image_keywords: usize,
    pub images_per_keyword: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            enhance_prompts: true,
            quality_check: true,
            max_image_keywords: PipelineDefaults::MAX_IMAGE_KEYWORDS,
            images_per_keyword: PipelineDefaults::IMAGES_PER_KEYWORD,
        }
    }
}

/// Something that turns a request into a result.
///
/// The job queue runs requests through this seam and treats an `Err` as a
/// failed job.
#[async_trait]
pub trait GenerationPipeline: Send + Sync {
    async fn run(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressSink,
    ) -> Result<StructuredOutput>;
}

/// Drives a request through cache, prompt enhancement, generation, quality
/// repair, image enrichment and caching.
pub struct Orchestrator {
    cache: SemanticCache,
    quality: QualityEngine,
    enhancer: Option<Arc<dyn PromptEnhancer>>,
    transport: Arc<dyn GenerationTransport>,
    images: Option<Arc<dyn ImageSearch>>,
    options: PipelineOptions,
}

impl Orchestrator {
    pub fn new(cache: SemanticCache, transport: Arc<dyn GenerationTransport>) -> Self {
        Self {
            cache,
            quality: QualityEngine::default(),
            enhancer: None,
            transport,
            images: None,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn PromptEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn with_image_search(mut self, images: Arc<dyn ImageSearch>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_quality(mut self, quality: QualityEngine) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn cache(&self) -> &SemanticCache {
        &self.cache
    }

    /// Run a request to completion.
    ///
    /// Never fails: errors and panics inside the pipeline produce an `error`
    /// progress event and a fallback result carrying the error message.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressSink,
    ) -> StructuredOutput {
        let started = Instant::now();
        info!("Generation started");

        let outcome = AssertUnwindSafe(self.run_stages(request, progress, started))
            .catch_unwind()
            .await;

        let message = match outcome {
            Ok(Ok(output)) => return output,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => panic_message(panic.as_ref()),
        };

        error!("Generation failed: {}", message);
        progress.emit(ProgressEvent::stage(Stage::Error, format!("Error: {message}")));
        fallback_output(&request.prompt, &message)
    }

    async fn run_stages(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressSink,
        started: Instant,
    ) -> Result<StructuredOutput> {
        let prompt = request.prompt.as_str();

        if self.options.use_cache {
            progress.emit(ProgressEvent::stage(Stage::CacheCheck, "Checking semantic cache..."));
            if let Some(hit) = self.cache.lookup_detailed(prompt) {
                info!("Serving result from cache (similarity {:.2})", hit.similarity);
                progress.emit(ProgressEvent::stage(Stage::CacheHit, "Result found in cache"));
                let mut output = hit.result;
                output.metadata.cached = true;
                output.metadata.processing_time_ms = Some(elapsed_ms(started));
                return Ok(output);
            }
        }

        progress.emit(ProgressEvent::stage(
            Stage::PromptEnhancement,
            "Enhancing prompt...",
        ));
        let enhanced_prompt = match (&self.enhancer, self.options.enhance_prompts) {
            (Some(enhancer), true) => enhancer.enhance(prompt, request.domain_hint()),
            _ => prompt.to_string(),
        };

        progress.emit(ProgressEvent::stage(
            Stage::MainGeneration,
            "Streaming generation in progress...",
        ));
        let on_partial = |update: StreamProgress| {
            let message = if update.preview.is_empty() {
                "Streaming...".to_string()
            } else {
                format!("Generating: ...{}", update.preview)
            };
            progress.emit(ProgressEvent::at(
                Stage::Streaming,
                streaming_progress(update.processed_chunks),
                message,
            ));
        };
        let raw = self.transport.generate(&enhanced_prompt, &on_partial).await?;

        progress.emit(ProgressEvent::stage(
            Stage::QualityEnhancement,
            "Improving output quality...",
        ));
        let (text, score, improvements) = if self.options.quality_check {
            let report = self.quality.enhance(&raw, prompt);
            (report.enhanced, report.score, report.improvements)
        } else {
            (raw, QualityDefaults::MAX_SCORE, Vec::new())
        };
        let mut output = StructuredOutput::from_json(&text)?;

        progress.emit(ProgressEvent::stage(Stage::ImageFetching, "Adding images..."));
        self.enrich_with_images(&mut output, prompt).await;

        output.metadata = final_metadata(&request.metadata, score, improvements, started);

        progress.emit(ProgressEvent::stage(Stage::Caching, "Caching result..."));
        if self.options.use_cache && score >= self.quality.min_score() {
            let mut entry_metadata = request.metadata.clone();
            entry_metadata.insert("qualityScore".into(), json!(score));
            entry_metadata.insert("generatedAt".into(), json!(Utc::now()));
            entry_metadata.insert("processingTimeMs".into(), json!(elapsed_ms(started)));
            self.cache.store(prompt, output.clone(), entry_metadata);
        } else if self.options.use_cache {
            info!("Not caching result with quality score {:.1}", score);
        }

        progress.emit(ProgressEvent::stage(
            Stage::Complete,
            "Generation completed successfully",
        ));
        info!("Generation complete in {}ms", elapsed_ms(started));
        Ok(output)
    }

    /// Replace the output's images with a lookup per derived keyword.
    ///
    /// A failed lookup records an empty list for its keyword.
    async fn enrich_with_images(&self, output: &mut StructuredOutput, prompt: &str) {
        let Some(images) = &self.images else {
            return;
        };

        let mut found = BTreeMap::new();
        for keyword in image_keywords(prompt, &output.name)
            .into_iter()
            .take(self.options.max_image_keywords)
        {
            let refs = match images.search(keyword, self.options.images_per_keyword).await {
                Ok(refs) => refs,
                Err(e) => {
                    warn!("Images for '{}' unavailable: {}", keyword, e);
                    Vec::new()
                }
            };
            found.insert(keyword.to_string(), refs);
        }
        output.images = found;
    }
}

#[async_trait]
impl GenerationPipeline for Orchestrator {
    async fn run(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressSink,
    ) -> Result<StructuredOutput> {
        Ok(self.generate(request, progress).await)
    }
}

fn final_metadata(
    request_metadata: &Metadata,
    score: f64,
    improvements: Vec<String>,
    started: Instant,
) -> OutputMetadata {
    let mut metadata = OutputMetadata {
        cached: false,
        quality_score: Some(score),
        improvements,
        processing_time_ms: Some(elapsed_ms(started)),
        generated_at: Some(Utc::now()),
        ..Default::default()
    };
    for (key, value) in request_metadata {
        if !RESERVED_METADATA_KEYS.contains(&key.as_str()) {
            metadata.extra.insert(key.clone(), value.clone());
        }
    }
    metadata
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("pipeline panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("pipeline panicked: {s}")
    } else {
        "pipeline panicked".to_string()
    }
}
