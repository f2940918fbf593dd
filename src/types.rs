//! Core types used throughout the clipboard engine.
//!
//! This module defines the history item model: the closed kind taxonomy,
//! the canonical content used for identity, and the alternate
//! representations kept for byte-faithful paste-back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Unique identifier for a history item
pub type ItemId = Uuid;

/// Alternate encodings of one item, keyed by pasteboard format identifier
pub type Representations = BTreeMap<String, Vec<u8>>;

/// Kind of clipboard content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ItemKind {
    /// Plain string
    Text,
    /// RTF or HTML document
    RichText,
    /// Raster image
    Image,
    /// Anything else (including unrecognized tags read from disk)
    Unknown,
}

impl ItemKind {
    /// Stable integer tag used by the history file
    pub fn tag(self) -> u8 {
        match self {
            ItemKind::Text => 0,
            ItemKind::RichText => 1,
            ItemKind::Image => 2,
            ItemKind::Unknown => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => ItemKind::Text,
            1 => ItemKind::RichText,
            2 => ItemKind::Image,
            _ => ItemKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::RichText => "rich-text",
            ItemKind::Image => "image",
            ItemKind::Unknown => "unknown",
        }
    }
}

impl From<u8> for ItemKind {
    fn from(tag: u8) -> Self {
        ItemKind::from_tag(tag)
    }
}

impl From<ItemKind> for u8 {
    fn from(kind: ItemKind) -> Self {
        kind.tag()
    }
}

/// One entry of clipboard history
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Assigned once at creation, kept across promotion and reloads
    pub id: ItemId,
    pub kind: ItemKind,
    /// Canonical bytes, used for dedup and the single-format paste path
    pub content: Vec<u8>,
    /// Short human-readable summary, fixed at capture time
    pub preview: String,
    /// Capture or last-promotion time
    pub timestamp: DateTime<Utc>,
    /// Scaled PNG for image items
    pub thumbnail: Option<Vec<u8>>,
    /// Every format the pasteboard exposed at capture time
    pub representations: Representations,
}

impl Item {
    /// Create a new item with a fresh id, stamped now
    pub fn new(kind: ItemKind, content: Vec<u8>, preview: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            content,
            preview: preview.into(),
            timestamp: Utc::now(),
            thumbnail: None,
            representations: Representations::new(),
        }
    }

    pub fn with_thumbnail(mut self, thumbnail: Vec<u8>) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    pub fn with_representations(mut self, representations: Representations) -> Self {
        self.representations = representations;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Refresh the timestamp after a promotion
    pub fn touch(&mut self, now: DateTime<Utc>) {
        // Keep the timestamp monotonic per item even if the wall clock steps back
        if now > self.timestamp {
            self.timestamp = now;
        } else {
            self.timestamp += chrono::Duration::microseconds(1);
        }
    }

    /// Content as UTF-8 text (text items)
    pub fn text(&self) -> Option<&str> {
        match self.kind {
            ItemKind::Text => std::str::from_utf8(&self.content).ok(),
            _ => None,
        }
    }

    /// Case-insensitive match on the preview
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim();
        query.is_empty() || self.preview.to_lowercase().contains(&query.to_lowercase())
    }

    /// Short content digest for log lines
    pub fn short_digest(&self) -> String {
        content_digest(&self.content)[..12].to_string()
    }

    /// Age relative to `now` for display ("just now", "3m ago", "2h ago", "5d ago")
    pub fn relative_time(&self, now: DateTime<Utc>) -> String {
        let secs = now.signed_duration_since(self.timestamp).num_seconds().max(0);
        match secs {
            0..=59 => "just now".to_string(),
            60..=3599 => format!("{}m ago", secs / 60),
            3600..=86_399 => format!("{}h ago", secs / 3600),
            _ => format!("{}d ago", secs / 86_400),
        }
    }
}

/// SHA-256 hex digest of content bytes
pub fn content_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

/// Truncate a string to at most `max_chars` characters for preview use
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
