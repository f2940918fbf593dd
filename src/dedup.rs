//! Duplicate detection for history items.
//!
//! Two items are the same entry when they share a kind and their canonical
//! content is byte-identical. Previews and representations never take part.

use crate::types::{content_digest, Item};
use std::sync::Arc;

/// Check if two items are the same logical entry
pub fn is_duplicate(a: &Item, b: &Item) -> bool {
    a.kind == b.kind && a.content == b.content
}

/// Index of the first entry (scanning from the front) equal to `candidate`
pub fn find_duplicate(candidate: &Item, history: &[Arc<Item>]) -> Option<usize> {
    history
        .iter()
        .position(|existing| is_duplicate(candidate, existing))
}

/// Compute SHA-256 hash of an item's content
pub fn compute_hash(item: &Item) -> String {
    content_digest(&item.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemKind;

    fn item(kind: ItemKind, content: &[u8], preview: &str) -> Item {
        Item::new(kind, content.to_vec(), preview)
    }

    #[test]
    fn test_same_kind_and_bytes() {
        let a = item(ItemKind::Text, b"hello", "hello");
        let b = item(ItemKind::Text, b"hello", "different preview");
        assert!(is_duplicate(&a, &b));
    }

    #[test]
    fn test_kind_participates() {
        let text = item(ItemKind::Text, b"same", "same");
        let image = item(ItemKind::Image, b"same", "same");
        assert!(!is_duplicate(&text, &image));
    }

    #[test]
    fn test_content_differs() {
        let a = item(ItemKind::RichText, b"{\\rtf1 a}", "a");
        let b = item(ItemKind::RichText, b"{\\rtf1 b}", "a");
        assert!(!is_duplicate(&a, &b));
    }

    #[test]
    fn test_find_duplicate_returns_first_match() {
        let history: Vec<Arc<Item>> = vec![
            Arc::new(item(ItemKind::Text, b"x", "x")),
            Arc::new(item(ItemKind::Image, b"y", "y")),
            Arc::new(item(ItemKind::Text, b"y", "y")),
        ];

        let candidate = item(ItemKind::Text, b"y", "y");
        assert_eq!(find_duplicate(&candidate, &history), Some(2));

        let missing = item(ItemKind::Text, b"z", "z");
        assert_eq!(find_duplicate(&missing, &history), None);
    }

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash(&item(ItemKind::Text, b"hello world", ""));
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
