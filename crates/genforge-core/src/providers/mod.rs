//! Concrete collaborators for the generation pipeline.
//!
//! - [`AnthropicTransport`]: streamed Messages API calls with retry
//! - [`StructuredPromptEnhancer`] and [`PassthroughEnhancer`]
//! - Retry with exponential backoff and jitter

mod anthropic;
mod prompt;
mod retry;
mod sse;

pub use anthropic::{compress_prompt, AnthropicTransport, ModelConfig, PromptComplexity};
pub use prompt::{
    estimate_complexity, extract_features, AppType, Complexity, PassthroughEnhancer,
    StructuredPromptEnhancer,
};
pub use retry::{retry_async, RetryConfig, RetryStats};
pub use sse::{parse_stream_event, SseDecoder, SseEvent, StreamEvent};
