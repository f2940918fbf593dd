//! The clipboard history list.
//!
//! [`HistoryStore`] owns the ordered items and the capacity. Order is purely
//! recency of use: captures and promotions go to the front, overflow drops the
//! tail. Every mutation is finished before observers hear about it, and each
//! one hands the new snapshot to the persistence writer.

use crate::dedup::find_duplicate;
use crate::persistence::{HistorySnapshot, PersistenceHandle};
use crate::types::{Item, ItemId, ItemKind};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

pub const MIN_CAPACITY: usize = 10;
pub const MAX_CAPACITY: usize = 200;
pub const DEFAULT_CAPACITY: usize = 50;

/// Buffered events per subscriber before it starts lagging
const EVENT_BUFFER: usize = 64;

/// Clamp a requested capacity into the allowed range
pub fn clamp_capacity(requested: usize) -> usize {
    requested.clamp(MIN_CAPACITY, MAX_CAPACITY)
}

/// What a capture did to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// New entry at the front
    Inserted(ItemId),
    /// Existing entry moved to the front with a fresh timestamp
    Promoted(ItemId),
    /// The change was our own paste-back; nothing happened
    SuppressedEcho,
}

/// Kind of mutation carried by a [`HistoryEvent`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryChange {
    Inserted(ItemId),
    Promoted(ItemId),
    Removed(ItemId),
    Cleared,
    CapacityChanged(usize),
}

/// Notification sent to subscribers after a mutation completes
#[derive(Debug, Clone)]
pub struct HistoryEvent {
    pub change: HistoryChange,
    /// Full list after the mutation
    pub items: HistorySnapshot,
}

pub struct HistoryStore {
    items: Vec<Arc<Item>>,
    capacity: usize,
    /// (kind, content) written by the last paste-back, not yet seen again
    echo_guard: Option<(ItemKind, Vec<u8>)>,
    events: broadcast::Sender<HistoryEvent>,
    persistence: Option<PersistenceHandle>,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            items: Vec::new(),
            capacity: clamp_capacity(capacity),
            echo_guard: None,
            events,
            persistence: None,
        }
    }

    /// Restore a previously saved list (front to back)
    pub fn with_items(items: Vec<Item>, capacity: usize) -> Self {
        let mut store = Self::new(capacity);
        for item in items {
            if find_duplicate(&item, &store.items).is_some() {
                debug!("Dropping duplicate restored item {}", item.id);
                continue;
            }
            store.items.push(Arc::new(item));
        }
        store.items.truncate(store.capacity);
        store
    }

    /// Mirror every mutation to disk through the writer
    pub fn attach_persistence(&mut self, handle: PersistenceHandle) {
        self.persistence = Some(handle);
    }

    /// Take the writer back (for an ordered shutdown)
    pub fn detach_persistence(&mut self) -> Option<PersistenceHandle> {
        self.persistence.take()
    }

    /// Merge a freshly classified candidate into the history
    pub fn capture(&mut self, candidate: Item) -> CaptureOutcome {
        let guard = self.echo_guard.take();
        if let Some((kind, content)) = guard {
            let is_echo = kind == candidate.kind
                && content == candidate.content
                && self
                    .items
                    .first()
                    .map_or(false, |head| head.kind == kind && head.content == content);
            if is_echo {
                debug!("Ignoring paste-back echo of {}", candidate.short_digest());
                return CaptureOutcome::SuppressedEcho;
            }
        }

        match find_duplicate(&candidate, &self.items) {
            Some(index) => {
                let mut existing = self.items.remove(index);
                Arc::make_mut(&mut existing).touch(candidate.timestamp);
                let id = existing.id;
                self.items.insert(0, existing);
                debug!("Promoted duplicate {} (was #{})", id, index);
                self.commit(HistoryChange::Promoted(id));
                CaptureOutcome::Promoted(id)
            }
            None => {
                let id = candidate.id;
                debug!(
                    "Captured {} item {} ({})",
                    candidate.kind.as_str(),
                    id,
                    candidate.short_digest()
                );
                self.items.insert(0, Arc::new(candidate));
                self.trim();
                self.commit(HistoryChange::Inserted(id));
                CaptureOutcome::Inserted(id)
            }
        }
    }

    /// Move an entry to the front with a fresh timestamp
    pub fn promote(&mut self, id: ItemId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        let mut item = self.items.remove(index);
        Arc::make_mut(&mut item).touch(Utc::now());
        self.items.insert(0, item);
        self.commit(HistoryChange::Promoted(id));
        true
    }

    /// Delete an entry; returns false if it was not present
    pub fn remove(&mut self, id: ItemId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        self.items.remove(index);
        self.commit(HistoryChange::Removed(id));
        true
    }

    pub fn clear(&mut self) {
        let dropped = self.items.len();
        self.items.clear();
        self.echo_guard = None;
        info!("Cleared {} history items", dropped);
        self.commit(HistoryChange::Cleared);
    }

    /// Change the capacity (clamped), trimming the tail if needed.
    ///
    /// Returns the capacity actually applied.
    pub fn set_capacity(&mut self, requested: usize) -> usize {
        let capacity = clamp_capacity(requested);
        if capacity != requested {
            debug!("Capacity {} clamped to {}", requested, capacity);
        }

        self.capacity = capacity;
        self.trim();
        if let Some(persistence) = &self.persistence {
            persistence.save_capacity(capacity);
        }
        info!("History capacity set to {}", capacity);
        self.commit(HistoryChange::CapacityChanged(capacity));
        capacity
    }

    /// Remember what a paste-back is about to write so its echo is ignored
    pub fn note_paste_back(&mut self, kind: ItemKind, content: &[u8]) {
        self.echo_guard = Some((kind, content.to_vec()));
    }

    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    /// Current list as a cheap shared snapshot
    pub fn snapshot(&self) -> HistorySnapshot {
        self.items.iter().cloned().collect()
    }

    pub fn get(&self, id: ItemId) -> Option<Arc<Item>> {
        self.items.iter().find(|item| item.id == id).cloned()
    }

    pub fn head(&self) -> Option<&Arc<Item>> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries whose preview contains `query` (case-insensitive), in order
    pub fn search(&self, query: &str) -> Vec<Arc<Item>> {
        self.items
            .iter()
            .filter(|item| item.matches_query(query))
            .cloned()
            .collect()
    }

    /// Receive an event after every mutation; drop the receiver to unsubscribe
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn trim(&mut self) {
        if self.items.len() > self.capacity {
            let dropped = self.items.len() - self.capacity;
            self.items.truncate(self.capacity);
            debug!("Trimmed {} items beyond capacity {}", dropped, self.capacity);
        }
    }

    fn commit(&mut self, change: HistoryChange) {
        let items = self.snapshot();
        if let Some(persistence) = &self.persistence {
            persistence.save(Arc::clone(&items));
        }
        // No receivers is fine
        let _ = self.events.send(HistoryEvent { change, items });
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::Persistence;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn text(s: &str) -> Item {
        Item::new(ItemKind::Text, s.as_bytes().to_vec(), s)
    }

    fn contents(store: &HistoryStore) -> Vec<String> {
        store
            .items()
            .iter()
            .map(|item| String::from_utf8_lossy(&item.content).into_owned())
            .collect()
    }

    #[test]
    fn test_capture_inserts_at_front() {
        let mut store = HistoryStore::default();
        store.capture(text("a"));
        store.capture(text("b"));
        assert_eq!(contents(&store), vec!["b", "a"]);
    }

    #[test]
    fn test_duplicate_capture_promotes_keeping_id() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut store = HistoryStore::default();

        let first = text("hello").with_timestamp(t0);
        let first_id = first.id;
        store.capture(first);
        store.capture(text("other").with_timestamp(t0 + Duration::seconds(1)));

        let second_time = t0 + Duration::seconds(5);
        let outcome = store.capture(text("hello").with_timestamp(second_time));

        assert_eq!(outcome, CaptureOutcome::Promoted(first_id));
        assert_eq!(store.len(), 2);
        assert_eq!(store.items()[0].id, first_id);
        assert_eq!(store.items()[0].timestamp, second_time);
    }

    #[test]
    fn test_promote() {
        let mut store = HistoryStore::default();
        let a = text("a");
        let a_id = a.id;
        let before = a.timestamp;
        store.capture(a);
        store.capture(text("b"));

        assert!(store.promote(a_id));
        let head = store.head().unwrap();
        assert_eq!(head.id, a_id);
        assert_eq!(head.preview, "a");
        assert!(head.timestamp > before);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_promote_unknown_id() {
        let mut store = HistoryStore::default();
        store.capture(text("a"));
        assert!(!store.promote(ItemId::new_v4()));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = HistoryStore::default();
        let a = text("a");
        let id = a.id;
        store.capture(a);

        assert!(store.remove(id));
        assert!(!store.remove(id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_order_ignores_timestamps() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut store = HistoryStore::default();
        store.capture(text("newer").with_timestamp(t0 + Duration::hours(1)));
        store.capture(text("older").with_timestamp(t0));
        assert_eq!(contents(&store), vec!["older", "newer"]);
    }

    #[test]
    fn test_kind_separates_duplicates() {
        let mut store = HistoryStore::default();
        store.capture(Item::new(ItemKind::Text, b"same".to_vec(), "same"));
        store.capture(Item::new(ItemKind::Image, b"same".to_vec(), "Image (1x1)"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_overflow_drops_tail() {
        let mut store = HistoryStore::new(10);
        for c in 'A'..='L' {
            store.capture(text(&c.to_string()));
        }
        assert_eq!(
            contents(&store),
            vec!["L", "K", "J", "I", "H", "G", "F", "E", "D", "C"]
        );
    }

    #[test]
    fn test_text_image_text_sequence() {
        let mut store = HistoryStore::default();
        store.capture(text("hello"));
        store.capture(Item::new(ItemKind::Image, vec![1, 2, 3], "Image (1x1)"));
        store.capture(text("hello"));

        let kinds: Vec<_> = store.items().iter().map(|item| item.kind).collect();
        assert_eq!(kinds, vec![ItemKind::Text, ItemKind::Image]);
        assert_eq!(store.items()[0].content, b"hello");
    }

    #[test]
    fn test_set_capacity_trims() {
        let mut store = HistoryStore::new(50);
        for i in 0..10 {
            store.capture(text(&i.to_string()));
        }

        // Below the minimum is clamped up
        assert_eq!(store.set_capacity(5), MIN_CAPACITY);
        assert_eq!(store.len(), 10);

        assert_eq!(store.set_capacity(1000), MAX_CAPACITY);
        assert_eq!(store.capacity(), MAX_CAPACITY);
    }

    #[test]
    fn test_set_capacity_keeps_most_recent() {
        let mut store = HistoryStore::new(50);
        for i in 0..20 {
            store.capture(text(&i.to_string()));
        }
        assert_eq!(store.set_capacity(12), 12);
        assert_eq!(store.len(), 12);
        assert_eq!(store.items()[0].content, b"19");
        assert_eq!(store.items()[11].content, b"8");
    }

    #[test]
    fn test_echo_is_suppressed_once() {
        let mut store = HistoryStore::default();
        store.capture(text("a"));
        store.capture(text("b"));

        let a_id = store.items()[1].id;
        assert!(store.promote(a_id));
        store.note_paste_back(ItemKind::Text, b"a");

        assert_eq!(store.capture(text("a")), CaptureOutcome::SuppressedEcho);
        // A later real copy of the same content promotes normally
        assert_eq!(store.capture(text("a")), CaptureOutcome::Promoted(a_id));
    }

    #[test]
    fn test_guard_ignored_when_head_differs() {
        let mut store = HistoryStore::default();
        store.capture(text("a"));
        store.note_paste_back(ItemKind::Text, b"a");
        store.capture(text("b"));

        // Guard was consumed by the unrelated capture
        let outcome = store.capture(text("a"));
        assert!(matches!(outcome, CaptureOutcome::Promoted(_)));
        assert_eq!(contents(&store), vec!["a", "b"]);
    }

    #[test]
    fn test_search() {
        let mut store = HistoryStore::default();
        store.capture(text("Hello World"));
        store.capture(text("goodbye"));
        store.capture(text("WORLD peace"));

        let found: Vec<_> = store.search("world").iter().map(|i| i.preview.clone()).collect();
        assert_eq!(found, vec!["WORLD peace", "Hello World"]);
        assert_eq!(store.search("").len(), 3);
    }

    #[test]
    fn test_with_items_truncates_and_dedups() {
        let items: Vec<Item> = (0..15).map(|i| text(&i.to_string())).chain([text("0")]).collect();
        let store = HistoryStore::with_items(items, 10);
        assert_eq!(store.len(), 10);
        assert_eq!(store.items()[0].content, b"0");
    }

    #[test]
    fn test_subscribers_see_completed_state() {
        let mut store = HistoryStore::default();
        let mut rx = store.subscribe();

        store.capture(text("a"));
        let event = rx.try_recv().unwrap();
        assert!(matches!(event.change, HistoryChange::Inserted(_)));
        assert_eq!(event.items.len(), 1);

        store.clear();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.change, HistoryChange::Cleared);
        assert!(event.items.is_empty());
    }

    #[test]
    fn test_no_event_for_noop() {
        let mut store = HistoryStore::default();
        let mut rx = store.subscribe();
        assert!(!store.remove(ItemId::new_v4()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_mutations_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()));

        let mut store = HistoryStore::new(persistence.load_capacity());
        store.attach_persistence(Arc::clone(&persistence).spawn_writer());

        store.capture(text("one"));
        store.capture(text("two"));
        store.set_capacity(20);

        if let Some(handle) = store.detach_persistence() {
            handle.close().await;
        }

        let loaded = persistence.load(persistence.load_capacity());
        let loaded: Vec<_> = loaded.iter().map(|item| item.preview.clone()).collect();
        assert_eq!(loaded, vec!["two", "one"]);
        assert_eq!(persistence.load_capacity(), 20);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Capture(u8),
        SetCapacity(usize),
        PromoteLast,
        RemoveFirst,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (0u8..40).prop_map(Op::Capture),
            1 => (0usize..300).prop_map(Op::SetCapacity),
            1 => Just(Op::PromoteLast),
            1 => Just(Op::RemoveFirst),
        ]
    }

    proptest! {
        #[test]
        fn prop_history_invariants(ops in prop::collection::vec(op(), 1..200)) {
            let mut store = HistoryStore::new(10);

            for op in ops {
                match op {
                    Op::Capture(n) => {
                        let candidate = text(&n.to_string());
                        let content = candidate.content.clone();
                        store.capture(candidate);
                        prop_assert_eq!(&store.items()[0].content, &content);
                    }
                    Op::SetCapacity(n) => {
                        let applied = store.set_capacity(n);
                        prop_assert!((MIN_CAPACITY..=MAX_CAPACITY).contains(&applied));
                    }
                    Op::PromoteLast => {
                        if let Some(last) = store.items().last().map(|item| item.id) {
                            store.promote(last);
                            prop_assert_eq!(store.items()[0].id, last);
                        }
                    }
                    Op::RemoveFirst => {
                        if let Some(first) = store.head().map(|item| item.id) {
                            store.remove(first);
                        }
                    }
                }

                prop_assert!(store.len() <= store.capacity());

                let mut seen = std::collections::HashSet::new();
                for item in store.items() {
                    prop_assert!(seen.insert((item.kind, item.content.clone())));
                }
            }
        }
    }
}
