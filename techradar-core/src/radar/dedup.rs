//! Element deduplication keyed by case-insensitive name.

use crate::types::TechnologyElement;
use std::collections::HashMap;

/// Merge `incoming` into `existing`.
///
/// Last-wins: a later record with the same key replaces the earlier one
/// wholesale, but keeps the position where the key was first seen. Existing
/// duplicates are collapsed the same way.
pub fn merge_elements(
    existing: Vec<TechnologyElement>,
    incoming: Vec<TechnologyElement>,
) -> Vec<TechnologyElement> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<TechnologyElement> = Vec::with_capacity(existing.len() + incoming.len());

    for element in existing.into_iter().chain(incoming) {
        match positions.get(&element.key()) {
            Some(&pos) => merged[pos] = element,
            None => {
                positions.insert(element.key(), merged.len());
                merged.push(element);
            }
        }
    }
    merged
}

/// Deduplicate a single collection with the same policy as [`merge_elements`].
pub fn dedup_elements(elements: Vec<TechnologyElement>) -> Vec<TechnologyElement> {
    merge_elements(elements, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Quadrant, Ring};

    fn element(name: &str, rationale: &str) -> TechnologyElement {
        TechnologyElement {
            name: name.into(),
            description: format!("{name} description"),
            quadrant: Quadrant::Platforms,
            ring: Ring::Trial,
            score: 6,
            rationale: rationale.into(),
            source_url: String::new(),
        }
    }

    #[test]
    fn test_case_insensitive_collapse() {
        let merged = merge_elements(vec![], vec![element("Redis", "a"), element("redis", "b")]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "redis");
        assert_eq!(merged[0].rationale, "b");
    }

    #[test]
    fn test_last_wins_keeps_first_position() {
        let existing = vec![element("Redis", "old"), element("Memcached", "m")];
        let incoming = vec![element("Valkey", "v"), element("REDIS", "new")];
        let merged = merge_elements(existing, incoming);

        let names: Vec<&str> = merged.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["REDIS", "Memcached", "Valkey"]);
        assert_eq!(merged[0].rationale, "new");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let merged = dedup_elements(vec![element("Redis", "a"), element(" redis ", "b")]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_disjoint_sets_concatenate() {
        let merged = merge_elements(vec![element("A", "")], vec![element("B", "")]);
        assert_eq!(merged.len(), 2);
    }
}
