//! Staged generation pipeline.
//!
//! The [`Orchestrator`] takes a request through cache lookup, prompt
//! enhancement, streamed generation, quality repair, image enrichment and
//! cache storage, reporting each stage to a [`ProgressSink`]. It always
//! resolves; failures produce a fallback result.

mod collaborators;
mod fallback;
mod keywords;
mod orchestrator;
mod progress;

pub use collaborators::{
    GenerationTransport, ImageSearch, PartialCallback, PromptEnhancer, StreamProgress,
};
pub use fallback::{extract_app_name, fallback_output};
pub use keywords::image_keywords;
pub use orchestrator::{GenerationPipeline, GenerationRequest, Orchestrator, PipelineOptions};
pub use progress::{streaming_progress, NoopProgress, ProgressEvent, ProgressLog, ProgressSink, Stage};
