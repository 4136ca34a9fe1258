//! Genforge Core - headless pipeline that turns prompts into structured
//! application code.
//!
//! Requests are accepted as durable jobs, run one at a time through a staged
//! pipeline (semantic cache, prompt enhancement, streamed generation,
//! quality repair, image enrichment) and recorded on disk with their
//! progress history. Transports, prompt enhancers and image lookups are
//! pluggable collaborators.
//!
//! # Example
//!
//! ```rust,ignore
//! use genforge_core::{Genforge, providers::AnthropicTransport};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> genforge_core::Result<()> {
//!     let transport = AnthropicTransport::new(std::env::var("ANTHROPIC_API_KEY").unwrap())?;
//!     let forge = Genforge::builder("./data")
//!         .auto_create_dirs(true)
//!         .with_transport(Arc::new(transport))
//!         .build()
//!         .await?;
//!
//!     let job_id = forge.submit("an ecommerce store with a cart", Default::default()).await?;
//!     forge.wait_until_idle().await;
//!     println!("{:?}", forge.get_job(&job_id)?.status);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod providers;
pub mod quality;
pub mod queue;

mod api;

// Re-export commonly used types
pub use api::GenforgeBuilder;
pub use cache::{CacheConfig, CacheEntry, CacheHit, CacheStats, SemanticCache};
pub use error::{GenforgeError, Result};
pub use models::{FileKind, GeneratedFile, ImageRef, Metadata, OutputMetadata, StructuredOutput};
pub use pipeline::{
    GenerationPipeline, GenerationRequest, GenerationTransport, ImageSearch, Orchestrator,
    PipelineOptions, ProgressEvent, ProgressSink, PromptEnhancer, Stage,
};
pub use quality::{EnhanceReport, QualityEngine};
pub use queue::{GenerationQueue, Job, JobStatus, QueueEvent};

use std::path::PathBuf;
use std::sync::Arc;

/// Main entry point: a job queue running an [`Orchestrator`] over a
/// persistent [`SemanticCache`].
///
/// Built with [`Genforge::builder`]; methods live in the `api` submodules.
pub struct Genforge {
    data_dir: PathBuf,
    cache: SemanticCache,
    orchestrator: Arc<Orchestrator>,
    queue: GenerationQueue,
}

impl Genforge {
    /// Create a builder rooted at `data_dir`.
    pub fn builder(data_dir: impl Into<PathBuf>) -> GenforgeBuilder {
        GenforgeBuilder::new(data_dir)
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    /// The pipeline jobs run through, for direct synchronous use.
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}
