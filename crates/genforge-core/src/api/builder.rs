//! Builder for configuring Genforge initialization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheConfig, SemanticCache};
use crate::config::{CacheDefaults, PathsConfig};
use crate::error::{GenforgeError, Result};
use crate::pipeline::{
    GenerationTransport, ImageSearch, Orchestrator, PipelineOptions, PromptEnhancer,
};
use crate::providers::StructuredPromptEnhancer;
use crate::quality::QualityEngine;
use crate::queue::GenerationQueue;
use crate::Genforge;

/// Builder for configuring [`Genforge`] initialization.
///
/// # Example
///
/// ```rust,ignore
/// let forge = Genforge::builder("./data")
///     .auto_create_dirs(true)
///     .with_transport(transport)
///     .with_quality_passes(3)
///     .build()
///     .await?;
/// ```
pub struct GenforgeBuilder {
    data_dir: PathBuf,
    auto_create_dirs: bool,
    cache_config: CacheConfig,
    options: PipelineOptions,
    quality_passes: Option<usize>,
    transport: Option<Arc<dyn GenerationTransport>>,
    enhancer: Option<Arc<dyn PromptEnhancer>>,
    images: Option<Arc<dyn ImageSearch>>,
}

impl GenforgeBuilder {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            auto_create_dirs: false,
            cache_config: CacheConfig::default(),
            options: PipelineOptions::default(),
            quality_passes: None,
            transport: None,
            enhancer: None,
            images: None,
        }
    }

    /// Create `<data>/cache/` and `<data>/jobs/` if they don't exist.
    ///
    /// Default: `false` (the data directory must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Maximum repair passes per generation. Default: 1
    pub fn with_quality_passes(mut self, passes: usize) -> Self {
        self.quality_passes = Some(passes);
        self
    }

    /// The generation service transport. Required.
    pub fn with_transport(mut self, transport: Arc<dyn GenerationTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Prompt enhancer. Default: [`StructuredPromptEnhancer`]
    pub fn with_enhancer(mut self, enhancer: Arc<dyn PromptEnhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    /// Image lookup for enrichment. Without one the stage is skipped.
    pub fn with_image_search(mut self, images: Arc<dyn ImageSearch>) -> Self {
        self.images = Some(images);
        self
    }

    fn create_directory_structure(data_dir: &Path) -> Result<()> {
        let dirs = [
            data_dir.to_path_buf(),
            data_dir.join(PathsConfig::CACHE_DIR_NAME),
            data_dir.join(PathsConfig::JOBS_DIR_NAME),
        ];

        for dir in &dirs {
            if !dir.exists() {
                debug!("Creating {}", dir.display());
                std::fs::create_dir_all(dir).map_err(|e| GenforgeError::Io {
                    message: format!("Failed to create directory: {}", dir.display()),
                    path: Some(dir.clone()),
                    source: Some(e),
                })?;
            }
        }
        Ok(())
    }

    /// Open the cache, recover unfinished jobs and start processing them.
    pub async fn build(self) -> Result<Genforge> {
        if self.auto_create_dirs {
            Self::create_directory_structure(&self.data_dir)?;
        } else if !self.data_dir.exists() {
            return Err(GenforgeError::Config {
                message: format!("Data directory does not exist: {}", self.data_dir.display()),
            });
        }

        let transport = self.transport.ok_or_else(|| GenforgeError::Config {
            message: "a generation transport is required".to_string(),
        })?;

        let cache_path = self
            .data_dir
            .join(PathsConfig::CACHE_DIR_NAME)
            .join(CacheDefaults::FILE_NAME);
        let cache = SemanticCache::open(cache_path, self.cache_config);

        let mut quality = QualityEngine::default();
        if let Some(passes) = self.quality_passes {
            quality = quality.with_max_passes(passes);
        }

        let enhancer = self
            .enhancer
            .unwrap_or_else(|| Arc::new(StructuredPromptEnhancer::new()));
        let mut orchestrator = Orchestrator::new(cache.clone(), transport)
            .with_enhancer(enhancer)
            .with_quality(quality)
            .with_options(self.options);
        if let Some(images) = self.images {
            orchestrator = orchestrator.with_image_search(images);
        }
        let orchestrator = Arc::new(orchestrator);

        let queue = GenerationQueue::new(
            self.data_dir.join(PathsConfig::JOBS_DIR_NAME),
            orchestrator.clone(),
        );
        let recovered = queue.init().await?;

        info!(
            "Genforge ready at {} ({} cached results, {} recovered jobs)",
            self.data_dir.display(),
            cache.len(),
            recovered
        );

        Ok(Genforge {
            data_dir: self.data_dir,
            cache,
            orchestrator,
            queue,
        })
    }
}
