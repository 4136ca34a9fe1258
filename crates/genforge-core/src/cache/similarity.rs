//! Prompt normalization and approximate matching.

use std::collections::HashSet;

use crate::config::CacheDefaults;

/// Normalize a prompt into a cache key.
///
/// Lowercases, strips punctuation, collapses whitespace and truncates to
/// `max_chars` characters. Trailing whitespace left by truncation is
/// trimmed so that normalizing twice is a no-op.
pub fn normalize_prompt(prompt: &str, max_chars: usize) -> String {
    let lowered = prompt.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

/// Similarity between two normalized keys, in `[0, 1]`.
///
/// Jaccard index over the sets of tokens longer than three characters,
/// scaled by a length-closeness factor so that keys of very different
/// length score lower.
pub fn similarity(a: &str, b: &str) -> f64 {
    let tokens_a = significant_tokens(a);
    let tokens_b = significant_tokens(b);

    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    let jaccard = intersection as f64 / union as f64;

    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    let longest = len_a.max(len_b);
    let closeness = if longest > 0.0 {
        1.0 - CacheDefaults::LENGTH_PENALTY * ((len_a - len_b).abs() / longest)
    } else {
        1.0
    };

    (jaccard * closeness).clamp(0.0, 1.0)
}

fn significant_tokens(key: &str) -> HashSet<&str> {
    key.split(' ')
        .filter(|token| token.chars().count() >= CacheDefaults::MIN_TOKEN_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = CacheDefaults::MAX_KEY_CHARS;

    #[test]
    fn test_normalize_strips_punctuation_and_case() {
        assert_eq!(
            normalize_prompt("  Create an E-commerce STORE, with   cart!! ", MAX),
            "create an ecommerce store with cart"
        );
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let samples = [
            "Build a SaaS dashboard... with charts?",
            "\tmake\n\na   landing page\t",
            "Ünïcode prompts — keep letters",
            "",
        ];
        for sample in samples {
            let once = normalize_prompt(sample, MAX);
            assert_eq!(normalize_prompt(&once, MAX), once);
        }
    }

    #[test]
    fn test_normalize_truncation_is_idempotent() {
        // Cut lands right after a word boundary.
        let prompt = format!("{} tail", "a".repeat(9));
        let once = normalize_prompt(&prompt, 10);
        assert_eq!(once, "aaaaaaaaa");
        assert_eq!(normalize_prompt(&once, 10), once);
    }

    #[test]
    fn test_identical_keys_score_one() {
        let key = "create ecommerce store with cart";
        assert!((similarity(key, key) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_short_tokens_are_ignored() {
        // Only "the", "a", "an" style tokens: no significant vocabulary.
        assert_eq!(similarity("an a the", "the an a"), 0.0);
    }

    #[test]
    fn test_paraphrase_crosses_threshold() {
        let stored = normalize_prompt("create ecommerce store with shopping cart", MAX);
        let query = normalize_prompt("create an ecommerce store with shopping cart", MAX);
        assert!(similarity(&stored, &query) >= CacheDefaults::SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_unrelated_prompts_stay_below_threshold() {
        let a = normalize_prompt("create ecommerce store with shopping cart", MAX);
        let b = normalize_prompt("build analytics dashboard for marketing team", MAX);
        assert!(similarity(&a, &b) < CacheDefaults::SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_length_difference_is_penalized() {
        let short = "ecommerce store";
        let long = "ecommerce store ecommerce store ecommerce store ecommerce store";
        // Same token set, so the score is the closeness factor alone.
        let score = similarity(short, long);
        assert!(score < 1.0);
        assert!(score >= 0.7);
    }
}
