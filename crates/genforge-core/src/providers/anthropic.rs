//! Streaming transport for the Anthropic Messages API.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use regex::Regex;
use reqwest::{header, Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::retry::{retry_async, RetryConfig};
use super::sse::{parse_stream_event, SseDecoder, StreamEvent};
use crate::config::{PipelineDefaults, TransportDefaults};
use crate::pipeline::{GenerationTransport, PartialCallback, StreamProgress};
use crate::{GenforgeError, Result};

static FILLER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)please|could you|would you|can you").expect("filler regex must compile")
});

static WHITESPACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex must compile"));

static ELLIPSIS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.{2,}").expect("ellipsis regex must compile"));

/// How much architecture the system prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptComplexity {
    Simple,
    Detailed,
    Comprehensive,
}

impl PromptComplexity {
    pub fn system_prompt(&self) -> &'static str {
        match self {
            PromptComplexity::Simple => SIMPLE_SYSTEM_PROMPT,
            PromptComplexity::Detailed => DETAILED_SYSTEM_PROMPT,
            PromptComplexity::Comprehensive => COMPREHENSIVE_SYSTEM_PROMPT,
        }
    }
}

/// Per-model request settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    pub max_tokens: u32,
    pub temperature: f64,
    pub complexity: PromptComplexity,
}

impl ModelConfig {
    /// Settings for a model id. Unknown models get the detailed profile.
    pub fn for_model(model: &str) -> Self {
        let (max_tokens, complexity) = if model.contains("haiku") {
            (2000, PromptComplexity::Simple)
        } else if model.contains("sonnet-4") || model.contains("opus-4") {
            (12000, PromptComplexity::Comprehensive)
        } else {
            (8000, PromptComplexity::Detailed)
        };
        Self {
            max_tokens,
            temperature: 0.7,
            complexity,
        }
    }
}

/// Drop politeness fillers and collapse whitespace.
pub fn compress_prompt(prompt: &str) -> String {
    let stripped = FILLER_PATTERN.replace_all(prompt, "");
    let collapsed = WHITESPACE_PATTERN.replace_all(&stripped, " ");
    ELLIPSIS_PATTERN
        .replace_all(&collapsed, "...")
        .trim()
        .to_string()
}

/// Last `n` characters of `text`.
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

/// [`GenerationTransport`] backed by a streamed `POST /v1/messages` call.
pub struct AnthropicTransport {
    client: Client,
    api_key: String,
    model: String,
    base_url: Url,
    timeout: Duration,
    retry: RetryConfig,
}

impl AnthropicTransport {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, TransportDefaults::REQUEST_TIMEOUT)
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(GenforgeError::Config {
                message: "an API key is required for the generation service".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("genforge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GenforgeError::Config {
                message: format!("Failed to create HTTP client: {e}"),
            })?;

        let base_url = Url::parse(TransportDefaults::API_BASE_URL).map_err(|e| {
            GenforgeError::Config {
                message: format!("Invalid API base URL: {e}"),
            }
        })?;

        Ok(Self {
            client,
            api_key,
            model: TransportDefaults::DEFAULT_MODEL.to_string(),
            base_url,
            timeout,
            retry: RetryConfig::default(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = Url::parse(base_url).map_err(|e| GenforgeError::Config {
            message: format!("Invalid API base URL {base_url}: {e}"),
        })?;
        Ok(self)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &str) -> Value {
        let config = ModelConfig::for_model(&self.model);
        json!({
            "model": self.model,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
            "stream": true,
            "system": config.complexity.system_prompt(),
            "messages": [{
                "role": "user",
                "content": compress_prompt(prompt),
            }],
        })
    }

    fn map_reqwest(&self, err: reqwest::Error) -> GenforgeError {
        if err.is_timeout() {
            GenforgeError::Timeout(self.timeout)
        } else {
            GenforgeError::from(err)
        }
    }

    async fn stream_once(&self, body: &Value, on_partial: &PartialCallback<'_>) -> Result<String> {
        let url = self
            .base_url
            .join("v1/messages")
            .map_err(|e| GenforgeError::Config {
                message: format!("Invalid messages endpoint: {e}"),
            })?;

        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", TransportDefaults::API_VERSION)
            .header(header::ACCEPT, "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(GenforgeError::RateLimited {
                service: self.base_url.host_str().unwrap_or("generation service").to_string(),
                retry_after_secs: retry_after,
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("generation request failed with status {status}"));
            return Err(GenforgeError::Transport {
                message,
                status_code: Some(status.as_u16()),
            });
        }

        let mut decoder = SseDecoder::new();
        let mut output = String::new();
        let mut chunks = 0usize;
        let mut stream = response.bytes_stream();

        'read: while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(|e| self.map_reqwest(e))?;
            for event in decoder.feed(&bytes) {
                match parse_stream_event(&event.data) {
                    Ok(StreamEvent::TextDelta(text)) => {
                        output.push_str(&text);
                        chunks += 1;
                        if chunks % PipelineDefaults::STREAM_EVENT_EVERY_CHUNKS == 0 {
                            on_partial(StreamProgress {
                                processed_chunks: chunks,
                                preview: tail_chars(&output, PipelineDefaults::STREAM_PREVIEW_CHARS)
                                    .to_string(),
                            });
                        }
                    }
                    Ok(StreamEvent::MessageStop) => break 'read,
                    Ok(StreamEvent::Error(message)) => {
                        return Err(GenforgeError::Transport {
                            message,
                            status_code: None,
                        });
                    }
                    Ok(StreamEvent::Other) => {}
                    Err(e) => debug!("Ignoring undecodable stream event: {}", e),
                }
            }
        }

        if let Some(event) = decoder.finish() {
            if let Ok(StreamEvent::TextDelta(text)) = parse_stream_event(&event.data) {
                output.push_str(&text);
                chunks += 1;
            }
        }

        debug!("Stream finished after {} chunks ({} chars)", chunks, output.len());
        Ok(output)
    }
}

#[async_trait]
impl GenerationTransport for AnthropicTransport {
    async fn generate(&self, prompt: &str, on_partial: &PartialCallback<'_>) -> Result<String> {
        let body = self.request_body(prompt);
        info!("Requesting generation from {}", self.model);

        let this = self;
        let body = &body;
        let (result, stats) = retry_async(
            &self.retry,
            move || this.stream_once(body, on_partial),
            GenforgeError::is_retryable,
        )
        .await;

        if stats.attempts > 1 {
            match &result {
                Ok(_) => info!("Generation succeeded after {} attempts", stats.attempts),
                Err(e) => warn!("Generation failed after {} attempts: {}", stats.attempts, e),
            }
        }
        result
    }
}

const SIMPLE_SYSTEM_PROMPT: &str = r#"You are a web application generator. Create simple, clean React components and applications.
Output valid JSON:
{
  "name": "app-name",
  "description": "brief description",
  "files": [{"path": "component.jsx", "content": "React code", "type": "component"}],
  "dependencies": ["react", "tailwindcss"]
}"#;

const DETAILED_SYSTEM_PROMPT: &str = r#"You are an expert web application generator.
Generate complete, production-ready applications with:
- Modern React/Next.js architecture
- Tailwind CSS styling
- Complete file structure
- Working components and pages
- API routes when needed
- Responsive design

Output ONLY valid JSON in this structure:
{
  "name": "app-name",
  "description": "brief description",
  "files": [
    {
      "path": "relative/path/to/file",
      "content": "complete file content",
      "type": "component|page|api|style|config"
    }
  ],
  "dependencies": ["list", "of", "npm", "packages"],
  "instructions": ["setup", "steps"]
}"#;

const COMPREHENSIVE_SYSTEM_PROMPT: &str = r#"You are an expert full-stack web application architect and developer.
Generate complete, enterprise-grade applications with:
- Modern React/Next.js architecture with the App Router
- Tailwind CSS with a custom design system
- Complete file structure with proper organization
- Reusable components with TypeScript
- API routes with error handling
- Database integration patterns
- Authentication and authorization
- Mobile-first responsive design
- Performance optimizations
- SEO best practices
- Testing structure

Output ONLY valid JSON in this structure:
{
  "name": "app-name",
  "description": "detailed description",
  "files": [
    {
      "path": "relative/path/to/file",
      "content": "complete file content with proper imports and exports",
      "type": "component|page|api|style|config|middleware|hook|util"
    }
  ],
  "dependencies": ["comprehensive", "list", "of", "packages"],
  "devDependencies": ["development", "packages"],
  "scripts": {"dev": "next dev", "build": "next build"},
  "instructions": ["detailed", "setup", "steps"],
  "architecture": {
    "framework": "Next.js",
    "styling": "Tailwind CSS",
    "state": "React Hooks + Context",
    "database": "recommended solution"
  }
}"#;
