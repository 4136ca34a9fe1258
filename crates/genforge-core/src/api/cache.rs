//! Cache inspection and maintenance on Genforge.

use crate::cache::{CacheEntry, CacheStats};
use crate::error::Result;
use crate::models::StructuredOutput;
use crate::Genforge;

impl Genforge {
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Look up a prompt without generating.
    pub fn cached_result(&self, prompt: &str) -> Option<StructuredOutput> {
        self.cache.lookup(prompt)
    }

    pub fn cache_entries(&self) -> Vec<CacheEntry> {
        self.cache.snapshot()
    }

    /// Drop every cached result, in memory and on disk.
    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.clear().await
    }

    /// Write the cache to disk and wait for it.
    pub async fn flush_cache(&self) -> Result<()> {
        self.cache.flush().await
    }
}
