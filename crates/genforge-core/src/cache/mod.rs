//! Semantic result cache.
//!
//! Prompts are normalized into keys; lookups first try the exact key and then
//! fall back to a token-overlap similarity scan so that paraphrased prompts
//! reuse earlier results. Capacity is bounded with LRU eviction and the
//! whole cache is mirrored to a single JSON file.

mod semantic;
mod similarity;
mod types;

pub use semantic::SemanticCache;
pub use similarity::{normalize_prompt, similarity};
pub use types::{CacheConfig, CacheEntry, CacheHit, CacheStats};
