//! Post categories
//!
//! The category list is fixed at build time. Posts store category keys as
//! plain strings.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Category {
    pub key: &'static str,
    pub label: &'static str,
}

/// Categories offered to clients
pub const CATEGORIES: &[Category] = &[
    Category {
        key: "sports",
        label: "Sports",
    },
    Category {
        key: "video-games",
        label: "video-games",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_keys_are_unique() {
        let mut keys: Vec<_> = CATEGORIES.iter().map(|c| c.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), CATEGORIES.len());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(CATEGORIES).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"key": "sports", "label": "Sports"},
                {"key": "video-games", "label": "video-games"}
            ])
        );
    }
}
