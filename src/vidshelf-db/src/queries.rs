//! Catalog query helpers

use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

use crate::schema::MediaItem;

/// Every tag in use, sorted and deduplicated
pub fn all_tags(items: &[MediaItem]) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tag usage counts, most used first (ties broken by name)
pub fn tag_stats(items: &[MediaItem]) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for tag in items.iter().flat_map(|item| item.tags.iter()) {
        *counts.entry(tag.as_str()).or_default() += 1;
    }

    let mut stats: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    stats.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    stats
}

/// Normalize client tag input.
///
/// Accepts either a comma-separated string or a list. Entries are trimmed,
/// empties dropped and duplicates removed keeping the first occurrence.
/// Anything else clears the tags.
pub fn normalize_tags(input: &Value) -> Vec<String> {
    let raw: Vec<String> = match input {
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Array(values) => values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    let mut seen = BTreeSet::new();
    raw.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Position of the record whose file is `path`
pub fn find_by_path(items: &[MediaItem], path: &str) -> Option<usize> {
    items.iter().position(|item| item.path == path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tagged(tags: &[&str]) -> MediaItem {
        MediaItem {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_tags_sorted_unique() {
        let items = vec![tagged(&["b", "a"]), tagged(&["a", "c"])];
        assert_eq!(all_tags(&items), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tag_stats_order() {
        let items = vec![tagged(&["x", "y"]), tagged(&["y", "z"]), tagged(&["y", "x"])];
        assert_eq!(
            tag_stats(&items),
            vec![
                ("y".to_string(), 3),
                ("x".to_string(), 2),
                ("z".to_string(), 1)
            ]
        );
    }

    #[test]
    fn test_normalize_tags() {
        assert_eq!(normalize_tags(&json!(" a, b ,,a")), vec!["a", "b"]);
        assert_eq!(normalize_tags(&json!(["x", " y ", "", "x", 3])), vec!["x", "y", "3"]);
        assert!(normalize_tags(&json!(null)).is_empty());
    }
}
