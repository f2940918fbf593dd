//! Privacy filtering for pasteboard captures.
//!
//! Password managers and other apps mark sensitive or transient pasteboard
//! writes with marker types (see nspasteboard.org). Snapshots carrying any of
//! those markers, or any type matching a configured pattern, are not captured.

use crate::config::PrivacyConfig;
use crate::pasteboard::PasteboardSnapshot;
use tracing::debug;

/// Marker types that always suppress capture and cannot be allowed.
pub const ALWAYS_IGNORED_TYPES: &[&str] = &[
    "org.nspasteboard.ConcealedType",
    "org.nspasteboard.TransientType",
    "org.nspasteboard.AutoGeneratedType",
    // 1Password predates the nspasteboard.org markers
    "com.agilebits.onepassword",
];

/// Privacy filter applied before classification
pub struct PrivacyFilter {
    config: PrivacyConfig,
    /// Compiled patterns for ignored types
    ignored_patterns: Vec<glob::Pattern>,
}

impl PrivacyFilter {
    /// Create a new privacy filter with the given configuration
    pub fn new(config: PrivacyConfig) -> Self {
        let ignored_patterns = compile_patterns(&config.ignored_types);
        Self {
            config,
            ignored_patterns,
        }
    }

    /// Check whether a single pasteboard type suppresses capture
    pub fn is_ignored_type(&self, pasteboard_type: &str) -> bool {
        if ALWAYS_IGNORED_TYPES.contains(&pasteboard_type) {
            return true;
        }

        self.ignored_patterns
            .iter()
            .any(|pattern| pattern.matches(pasteboard_type))
    }

    /// Returns the first type that makes this snapshot private, if any
    pub fn blocking_type<'a>(&self, snapshot: &'a PasteboardSnapshot) -> Option<&'a str> {
        let found = snapshot.types().find(|ty| self.is_ignored_type(ty));
        if let Some(ty) = found {
            debug!("Snapshot #{} skipped: marked {}", snapshot.change_count, ty);
        }
        found
    }

    pub fn allows(&self, snapshot: &PasteboardSnapshot) -> bool {
        self.blocking_type(snapshot).is_none()
    }

    /// Ignore an additional type pattern at runtime
    pub fn ignore_type(&mut self, pattern: &str) {
        if !self.config.ignored_types.iter().any(|p| p == pattern) {
            self.config.ignored_types.push(pattern.to_string());
            self.ignored_patterns = compile_patterns(&self.config.ignored_types);
        }
    }

    /// Stop ignoring a configured pattern (markers in [`ALWAYS_IGNORED_TYPES`] stay)
    pub fn allow_type(&mut self, pattern: &str) {
        self.config.ignored_types.retain(|p| p != pattern);
        self.ignored_patterns = compile_patterns(&self.config.ignored_types);
    }
}

fn compile_patterns(patterns: &[String]) -> Vec<glob::Pattern> {
    patterns
        .iter()
        .filter_map(|pattern| {
            glob::Pattern::new(pattern)
                .map_err(|e| {
                    tracing::warn!("Invalid ignored type pattern '{}': {}", pattern, e);
                    e
                })
                .ok()
        })
        .collect()
}
