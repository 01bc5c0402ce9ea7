//! `#tag` extraction from note text.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]+)").expect("tag regex"));

/// Collect every `#word` in `text`, lower-cased and deduplicated.
pub fn extract_tags(text: &str) -> BTreeSet<String> {
    TAG_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_tags() {
        assert!(extract_tags("no tags here").is_empty());
        assert!(extract_tags("").is_empty());
    }

    #[test]
    fn test_dedupes_case_insensitively() {
        assert_eq!(extract_tags("#Work #work #play"), set(&["work", "play"]));
    }

    #[test]
    fn test_lone_hash_is_not_a_tag() {
        assert!(extract_tags("# heading and a # sign").is_empty());
    }

    #[test]
    fn test_tag_stops_at_punctuation() {
        assert_eq!(
            extract_tags("todo: #errands, #home-improvement!"),
            set(&["errands", "home"])
        );
    }

    #[test]
    fn test_tags_adjacent_and_inside_words() {
        assert_eq!(extract_tags("a#b#c_1"), set(&["b", "c_1"]));
    }

    #[test]
    fn test_entries_are_lowercase_and_non_empty() {
        let inputs = [
            "#ALPHA beta #Gamma_2 ##double #",
            "mixed #Rust #rust #RUST and #42",
            "url https://example.com/#Section",
        ];
        for input in inputs {
            let tags = extract_tags(input);
            for tag in &tags {
                assert!(!tag.is_empty());
                assert_eq!(tag, &tag.to_lowercase());
            }
        }
        assert_eq!(extract_tags(inputs[1]), set(&["rust", "42"]));
    }
}
