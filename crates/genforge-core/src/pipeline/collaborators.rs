//! Interfaces of the services the pipeline delegates to.

use async_trait::async_trait;

use crate::models::ImageRef;
use crate::Result;

/// Rewrites a user prompt before it is sent for generation.
pub trait PromptEnhancer: Send + Sync {
    /// Return the prompt to send. `domain_hint` names the kind of
    /// application when the caller already knows it.
    fn enhance(&self, prompt: &str, domain_hint: Option<&str>) -> String;
}

/// Partial-output notification from a streaming transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamProgress {
    /// Text chunks received so far.
    pub processed_chunks: usize,
    /// Tail of the text received so far.
    pub preview: String,
}

/// Callback a transport invokes as output streams in.
pub type PartialCallback<'a> = dyn Fn(StreamProgress) + Send + Sync + 'a;

/// Performs the call to the generation service.
#[async_trait]
pub trait GenerationTransport: Send + Sync {
    /// Generate raw output for `prompt`.
    ///
    /// `on_partial` is progress reporting only; the returned string is the
    /// complete output.
    async fn generate(&self, prompt: &str, on_partial: &PartialCallback<'_>) -> Result<String>;
}

/// Looks up images for cosmetic enrichment.
#[async_trait]
pub trait ImageSearch: Send + Sync {
    async fn search(&self, keyword: &str, count: usize) -> Result<Vec<ImageRef>>;
}
