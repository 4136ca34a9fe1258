//! Image search keywords derived from a prompt and its result.

/// Keyword groups keyed by prompt vocabulary; the first matching group wins.
const PROMPT_KEYWORDS: &[(&[&str], [&str; 3])] = &[
    (&["ecommerce", "shop"], ["products", "shopping", "business"]),
    (&["food", "restaurant"], ["food", "restaurant", "cooking"]),
    (&["travel", "vacation"], ["travel", "vacation", "landscape"]),
    (&["tech", "software"], ["technology", "software", "computer"]),
];

const DEFAULT_KEYWORDS: [&str; 3] = ["business", "office", "modern"];

/// Topics picked up from the generated app's name.
const NAME_KEYWORDS: &[&str] = &["music", "fitness", "education"];

/// Ordered, de-duplicated keywords for image enrichment.
pub fn image_keywords(prompt: &str, app_name: &str) -> Vec<&'static str> {
    let prompt = prompt.to_lowercase();
    let base = PROMPT_KEYWORDS
        .iter()
        .find(|(triggers, _)| triggers.iter().any(|t| prompt.contains(t)))
        .map(|(_, keywords)| *keywords)
        .unwrap_or(DEFAULT_KEYWORDS);

    let name = app_name.to_lowercase();
    let mut keywords: Vec<&'static str> = base.to_vec();
    for topic in NAME_KEYWORDS {
        if name.contains(topic) && !keywords.contains(topic) {
            keywords.push(*topic);
        }
    }
    keywords
}
