//! Similarity-matching result cache with LRU eviction and file persistence.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::similarity::{normalize_prompt, similarity};
use super::types::{CacheConfig, CacheEntry, CacheHit, CacheStats};
use crate::models::{Metadata, StructuredOutput};
use crate::persist::{atomic_read_json, atomic_write_json};
use crate::{GenforgeError, Result};

/// Maps free-text prompts to previously generated results, tolerating
/// paraphrase.
///
/// Cloning is cheap and every clone shares the same entries. Lookups scan
/// entries in insertion order and return the first one at or above the
/// similarity threshold, not the best one.
#[derive(Clone)]
pub struct SemanticCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    config: CacheConfig,
    entries: Mutex<IndexMap<String, CacheEntry>>,
    path: Option<PathBuf>,
    /// Serializes file writes so the newest snapshot always lands last.
    write_lock: tokio::sync::Mutex<()>,
}

impl SemanticCache {
    /// Create a cache that lives only in memory.
    pub fn in_memory(config: CacheConfig) -> Self {
        Self::build(config, None, IndexMap::new())
    }

    /// Open a cache backed by `path`.
    ///
    /// A missing or unreadable file yields an empty cache.
    pub fn open(path: impl Into<PathBuf>, config: CacheConfig) -> Self {
        let path = path.into();
        let entries = load_entries(&path, config.capacity);
        Self::build(config, Some(path), entries)
    }

    fn build(
        config: CacheConfig,
        path: Option<PathBuf>,
        entries: IndexMap<String, CacheEntry>,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                entries: Mutex::new(entries),
                path,
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Normalize a prompt into this cache's key space.
    pub fn normalize(&self, prompt: &str) -> String {
        normalize_prompt(prompt, self.inner.config.max_key_chars)
    }

    /// Look up a prompt; see [`SemanticCache::lookup_detailed`].
    pub fn lookup(&self, prompt: &str) -> Option<StructuredOutput> {
        self.lookup_detailed(prompt).map(|hit| hit.result)
    }

    /// Look up a prompt, exact key first, then by similarity scan.
    ///
    /// Any hit, exact or approximate, refreshes the entry's access time and
    /// increments its hit count.
    pub fn lookup_detailed(&self, prompt: &str) -> Option<CacheHit> {
        let key = self.normalize(prompt);
        let threshold = self.inner.config.similarity_threshold;
        let mut entries = self.inner.entries.lock().expect("cache lock poisoned");
        let now = Utc::now();

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_accessed_at = now;
            entry.hit_count += 1;
            debug!("Cache hit (exact) for '{}'", key);
            return Some(CacheHit {
                key,
                result: entry.result.clone(),
                similarity: 1.0,
                exact: true,
            });
        }

        for (stored_key, entry) in entries.iter_mut() {
            let score = similarity(&key, stored_key);
            if score >= threshold {
                entry.last_accessed_at = now;
                entry.hit_count += 1;
                info!("Cache hit with {:.1}% similarity", score * 100.0);
                return Some(CacheHit {
                    key: stored_key.clone(),
                    result: entry.result.clone(),
                    similarity: score,
                    exact: false,
                });
            }
        }

        debug!("Cache miss for '{}'", key);
        None
    }

    /// Store a result under the prompt's normalized key.
    ///
    /// Overwrites an existing entry with the same key in place. Otherwise, if
    /// the cache is full, the least recently accessed entry is evicted first.
    /// The file is rewritten in the background; failures are logged only.
    pub fn store(&self, prompt: &str, result: StructuredOutput, metadata: Metadata) {
        if self.inner.config.capacity == 0 {
            debug!("Cache capacity is zero; not storing");
            return;
        }

        let key = self.normalize(prompt);
        let size = {
            let mut entries = self.inner.entries.lock().expect("cache lock poisoned");
            if !entries.contains_key(&key) && entries.len() >= self.inner.config.capacity {
                if let Some(evicted) = evict_lru(&mut entries) {
                    info!("Evicted least recently used cache entry '{}'", evicted);
                }
            }

            let now = Utc::now();
            entries.insert(
                key.clone(),
                CacheEntry {
                    key,
                    result,
                    metadata,
                    created_at: now,
                    last_accessed_at: now,
                    hit_count: 0,
                },
            );
            entries.len()
        };

        info!("Stored result in cache (size: {})", size);
        self.persist_in_background();
    }

    /// Evict the entry with the oldest access time.
    pub fn evict_oldest(&self) -> Option<String> {
        let evicted = {
            let mut entries = self.inner.entries.lock().expect("cache lock poisoned");
            evict_lru(&mut entries)
        };
        if evicted.is_some() {
            self.persist_in_background();
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all entries in insertion order.
    pub fn snapshot(&self) -> Vec<CacheEntry> {
        self.inner.snapshot()
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.inner.entries.lock().expect("cache lock poisoned");
        let total_hits: u64 = entries.values().map(|e| e.hit_count).sum();
        let size = entries.len();

        CacheStats {
            size,
            capacity: self.inner.config.capacity,
            total_hits,
            average_hits: if size > 0 {
                total_hits as f64 / size as f64
            } else {
                0.0
            },
            oldest_entry: entries.values().map(|e| e.created_at).min(),
            newest_entry: entries.values().map(|e| e.created_at).max(),
        }
    }

    /// Drop every entry and delete the backing file.
    ///
    /// Runs under the write lock, so no queued write can restore old entries.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.inner.write_lock.lock().await;
        self.inner
            .entries
            .lock()
            .expect("cache lock poisoned")
            .clear();

        if let Some(path) = &self.inner.path {
            remove_cache_file(path).await?;
            info!("Cache cleared, removed {}", path.display());
        }
        Ok(())
    }

    /// Write the current entries to disk and wait for the write.
    pub async fn flush(&self) -> Result<()> {
        self.inner.clone().write_latest().await
    }

    fn persist_in_background(&self) {
        if self.inner.path.is_none() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = self.inner.clone();
                handle.spawn(async move {
                    if let Err(e) = inner.write_latest().await {
                        warn!("Failed to persist semantic cache: {}", e);
                    }
                });
            }
            Err(_) => {
                if let Err(e) = self.inner.write_blocking() {
                    warn!("Failed to persist semantic cache: {}", e);
                }
            }
        }
    }
}

impl CacheInner {
    fn snapshot(&self) -> Vec<CacheEntry> {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Write whatever the entries are at the time the write lock is taken.
    async fn write_latest(self: Arc<Self>) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return remove_cache_file(&path).await;
        }
        tokio::task::spawn_blocking(move || atomic_write_json(&path, &snapshot, false))
            .await
            .map_err(|e| GenforgeError::Other(format!("Cache write task failed: {}", e)))?
    }

    fn write_blocking(&self) -> Result<()> {
        match &self.path {
            Some(path) => atomic_write_json(path, &self.snapshot(), false),
            None => Ok(()),
        }
    }
}

/// An empty cache has no file.
async fn remove_cache_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GenforgeError::io_with_path(e, path.to_path_buf())),
    }
}

/// Remove the least recently accessed entry. Ties go to the earliest inserted.
fn evict_lru(entries: &mut IndexMap<String, CacheEntry>) -> Option<String> {
    let victim = entries
        .iter()
        .min_by_key(|(_, entry)| entry.last_accessed_at)
        .map(|(key, _)| key.clone())?;
    entries.shift_remove(&victim);
    Some(victim)
}

fn load_entries(path: &Path, capacity: usize) -> IndexMap<String, CacheEntry> {
    let mut entries = IndexMap::new();
    match atomic_read_json::<Vec<CacheEntry>>(path) {
        Ok(Some(stored)) => {
            for entry in stored {
                entries.insert(entry.key.clone(), entry);
            }
            while entries.len() > capacity {
                evict_lru(&mut entries);
            }
            info!("Restored {} cache entries from {}", entries.len(), path.display());
        }
        Ok(None) => {
            debug!("No cache file at {}, starting empty", path.display());
        }
        Err(e) => {
            warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn output(name: &str) -> StructuredOutput {
        StructuredOutput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn small_cache(capacity: usize) -> SemanticCache {
        SemanticCache::in_memory(CacheConfig {
            capacity,
            ..Default::default()
        })
    }

    fn tick() {
        std::thread::sleep(Duration::from_millis(2));
    }

    #[test]
    fn test_exact_hit_updates_stats() {
        let cache = small_cache(10);
        cache.store("Create an ecommerce store!", output("Shop"), Metadata::new());

        let hit = cache.lookup_detailed("create an ECOMMERCE store").unwrap();
        assert!(hit.exact);
        assert_eq!(hit.result.name, "Shop");

        let entries = cache.snapshot();
        assert_eq!(entries[0].hit_count, 1);
        assert!(entries[0].last_accessed_at >= entries[0].created_at);
    }

    #[test]
    fn test_paraphrase_hits_and_counts() {
        let cache = small_cache(10);
        cache.store(
            "create ecommerce store with shopping cart",
            output("Shop"),
            Metadata::new(),
        );

        let hit = cache
            .lookup_detailed("Create an ecommerce store with shopping cart")
            .unwrap();
        assert!(!hit.exact);
        assert!(hit.similarity >= 0.75);
        assert_eq!(cache.snapshot()[0].hit_count, 1);
    }

    #[test]
    fn test_dissimilar_prompt_misses() {
        let cache = small_cache(10);
        cache.store(
            "create ecommerce store with shopping cart",
            output("Shop"),
            Metadata::new(),
        );

        assert!(cache
            .lookup("build analytics dashboard for marketing team")
            .is_none());
        assert_eq!(cache.snapshot()[0].hit_count, 0);
    }

    #[test]
    fn test_first_match_wins_over_best_match() {
        let cache = small_cache(10);
        cache.store(
            "create ecommerce store with shopping cart",
            output("First"),
            Metadata::new(),
        );
        cache.store(
            "please create ecommerce store with shopping cart now",
            output("Closer"),
            Metadata::new(),
        );

        let hit = cache
            .lookup_detailed("create ecommerce store with shopping cart now please")
            .unwrap();
        assert_eq!(hit.result.name, "First");
        assert!(hit.similarity < 1.0);
    }

    #[test]
    fn test_evicts_least_recently_accessed() {
        let cache = small_cache(3);
        cache.store("alpha prompt text", output("a"), Metadata::new());
        tick();
        cache.store("bravo prompt words", output("b"), Metadata::new());
        tick();
        cache.store("charlie request here", output("c"), Metadata::new());
        tick();

        // Touch the oldest insert so "bravo" becomes least recently used.
        assert!(cache.lookup("alpha prompt text").is_some());
        tick();
        cache.store("delta something else", output("d"), Metadata::new());

        let names: Vec<String> = cache.snapshot().into_iter().map(|e| e.result.name).collect();
        assert_eq!(names, vec!["a", "c", "d"]);
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let cache = small_cache(3);
        let words = ["apple", "banana", "cherry", "damson", "elder", "figtree", "grape"];
        for word in words {
            cache.store(&format!("{word} orchard planner"), output(word), Metadata::new());
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let cache = small_cache(2);
        cache.store("same prompt here", output("v1"), Metadata::new());
        cache.store("Same prompt, here!", output("v2"), Metadata::new());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("same prompt here").unwrap().name, "v2");
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let cache = small_cache(0);
        cache.store("anything at all", output("x"), Metadata::new());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_oldest_on_empty_cache() {
        let cache = small_cache(2);
        assert!(cache.evict_oldest().is_none());
    }

    #[test]
    fn test_stats() {
        let cache = small_cache(5);
        cache.store("first prompt words", output("1"), Metadata::new());
        cache.store("second prompt words", output("2"), Metadata::new());
        cache.lookup("first prompt words");
        cache.lookup("first prompt words");

        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.capacity, 5);
        assert_eq!(stats.total_hits, 2);
        assert!((stats.average_hits - 1.0).abs() < f64::EPSILON);
        assert!(stats.oldest_entry <= stats.newest_entry);
    }

    #[tokio::test]
    async fn test_persists_and_reloads() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("semantic-cache.json");

        let cache = SemanticCache::open(&path, CacheConfig::default());
        cache.store("landing page for a bakery", output("Bakery"), Metadata::new());
        cache.flush().await.unwrap();

        let reopened = SemanticCache::open(&path, CacheConfig::default());
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.lookup("Landing page for a bakery").unwrap().name, "Bakery");
    }

    #[test]
    fn test_store_without_runtime_writes_synchronously() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("semantic-cache.json");

        let cache = SemanticCache::open(&path, CacheConfig::default());
        cache.store("portfolio site for a painter", output("Folio"), Metadata::new());

        assert!(path.exists());
        assert_eq!(SemanticCache::open(&path, CacheConfig::default()).len(), 1);
    }

    #[test]
    fn test_corrupt_file_yields_empty_cache() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("semantic-cache.json");
        std::fs::write(&path, "[{ this is not json").unwrap();

        let cache = SemanticCache::open(&path, CacheConfig::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_yields_empty_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = SemanticCache::open(tmp.path().join("absent.json"), CacheConfig::default());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("semantic-cache.json");

        let cache = SemanticCache::open(&path, CacheConfig::default());
        cache.store("recipe sharing app", output("Recipes"), Metadata::new());
        cache.flush().await.unwrap();
        assert!(path.exists());

        cache.clear().await.unwrap();
        assert!(cache.is_empty());
        assert!(!path.exists());

        // Clearing again with no file is fine.
        cache.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_clear_wins_over_pending_background_writes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("semantic-cache.json");

        let cache = SemanticCache::open(&path, CacheConfig::default());
        for topic in ["gardening", "woodworking", "astronomy", "pottery"] {
            cache.store(&format!("community forum about {topic}"), output(topic), Metadata::new());
        }
        cache.clear().await.unwrap();

        // Let every queued writer run.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.flush().await.unwrap();

        assert!(!path.exists());
        assert!(SemanticCache::open(&path, CacheConfig::default()).is_empty());
    }
}
