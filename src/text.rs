//! Lightweight text helpers shared by the knowledge graph and the reasoners.

use std::collections::HashSet;

/// Words too common to carry meaning as concepts.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "have", "will", "what", "when", "where",
    "which",
];

/// Maximum number of concepts extracted from one text.
pub const MAX_CONCEPTS: usize = 10;

/// Lowercased words longer than three characters, stop words removed,
/// deduplicated in first-seen order and capped at [`MAX_CONCEPTS`].
pub fn extract_concepts(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .filter(|w| !STOP_WORDS.contains(w))
        .filter(|w| seen.insert(w.to_string()))
        .take(MAX_CONCEPTS)
        .map(str::to_string)
        .collect()
}

/// The set of lowercased whitespace-separated words.
pub fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Shared words divided by the size of the larger word set.
pub fn word_overlap(a: &str, b: &str) -> f64 {
    let a = word_set(a);
    let b = word_set(b);
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / larger as f64
}

pub(crate) fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concepts_drop_short_and_stop_words() {
        let concepts = extract_concepts("Write THE report with data from the Report archive");
        assert_eq!(concepts, vec!["write", "report", "data", "archive"]);
    }

    #[test]
    fn concepts_are_capped() {
        let text = (0..20).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        assert_eq!(extract_concepts(&text).len(), MAX_CONCEPTS);
    }

    #[test]
    fn overlap_uses_larger_set() {
        assert!((word_overlap("analyze the data", "analyze data now please") - 0.5).abs() < 1e-9);
        assert_eq!(word_overlap("", ""), 0.0);
    }
}
