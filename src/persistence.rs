//! On-disk history and settings.
//!
//! History is a JSON array of item records, front to back, with byte fields
//! base64-encoded. Every write goes to a temp file in the same directory and
//! is renamed over the target, so a crash never leaves a torn file.
//!
//! Saves triggered by history mutations go through a [`PersistenceHandle`]:
//! a writer task fed by `watch` channels, so bursts of mutations collapse into
//! the latest snapshot. Serialization runs on the blocking pool.

use crate::history::clamp_capacity;
use crate::settings::Settings;
use crate::types::{Item, ItemKind};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const HISTORY_FILE: &str = "history.json";
pub const SETTINGS_FILE: &str = "settings.json";

/// Immutable view of the history list handed to the writer and observers
pub type HistorySnapshot = Arc<[Arc<Item>]>;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid base64 in record: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// One history entry as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemRecord {
    id: Uuid,
    kind_tag: ItemKind,
    content: String,
    preview: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    representations: BTreeMap<String, String>,
}

impl From<&Item> for ItemRecord {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id,
            kind_tag: item.kind,
            content: BASE64.encode(&item.content),
            preview: item.preview.clone(),
            timestamp: item.timestamp,
            thumbnail: item.thumbnail.as_ref().map(|t| BASE64.encode(t)),
            representations: item
                .representations
                .iter()
                .map(|(format, bytes)| (format.clone(), BASE64.encode(bytes)))
                .collect(),
        }
    }
}

impl TryFrom<ItemRecord> for Item {
    type Error = PersistenceError;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let thumbnail = record
            .thumbnail
            .map(|t| BASE64.decode(t))
            .transpose()?;

        let mut representations = BTreeMap::new();
        for (format, encoded) in record.representations {
            representations.insert(format, BASE64.decode(encoded)?);
        }

        Ok(Item {
            id: record.id,
            kind: record.kind_tag,
            content: BASE64.decode(record.content)?,
            preview: record.preview,
            timestamp: record.timestamp,
            thumbnail,
            representations,
        })
    }
}

/// File locations for history and settings
#[derive(Debug, Clone)]
pub struct Persistence {
    history_path: PathBuf,
    settings_path: PathBuf,
    /// Held across every settings read-modify-write; shared by clones
    settings_lock: Arc<Mutex<()>>,
}

impl Persistence {
    /// Store files under `data_dir` (created on first write)
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            history_path: data_dir.join(HISTORY_FILE),
            settings_path: data_dir.join(SETTINGS_FILE),
            settings_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn history_path(&self) -> &Path {
        &self.history_path
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Read the history file, surfacing any failure
    pub fn try_load(&self) -> Result<Vec<Item>, PersistenceError> {
        let bytes = std::fs::read(&self.history_path)?;
        let records: Vec<ItemRecord> = serde_json::from_slice(&bytes)?;
        records.into_iter().map(Item::try_from).collect()
    }

    /// Read the history file, truncated to `capacity`.
    ///
    /// A missing or undecodable file yields an empty history.
    pub fn load(&self, capacity: usize) -> Vec<Item> {
        match self.try_load() {
            Ok(mut items) => {
                items.truncate(capacity);
                info!("Loaded {} history items from {:?}", items.len(), self.history_path);
                items
            }
            Err(PersistenceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No history file at {:?}, starting empty", self.history_path);
                Vec::new()
            }
            Err(e) => {
                warn!("Failed to load history from {:?}: {}, starting empty", self.history_path, e);
                Vec::new()
            }
        }
    }

    /// Serialize and write the history before returning
    pub fn save_sync(&self, items: &[Arc<Item>]) -> Result<(), PersistenceError> {
        let records: Vec<ItemRecord> = items.iter().map(|item| ItemRecord::from(item.as_ref())).collect();
        let json = serde_json::to_vec(&records)?;
        write_atomic(&self.history_path, &json)?;
        debug!("Saved {} history items ({} bytes)", items.len(), json.len());
        Ok(())
    }

    pub fn try_load_settings(&self) -> Result<Settings, PersistenceError> {
        let bytes = std::fs::read(&self.settings_path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read settings, falling back to defaults
    pub fn load_settings(&self) -> Settings {
        match self.try_load_settings() {
            Ok(settings) => settings,
            Err(PersistenceError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Settings::default()
            }
            Err(e) => {
                warn!("Failed to load settings from {:?}: {}, using defaults", self.settings_path, e);
                Settings::default()
            }
        }
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        let _guard = self.lock_settings();
        self.write_settings(settings)
    }

    /// Read-modify-write the settings file.
    ///
    /// Capacity saves from the writer task and hotkey updates from the UI
    /// both land here, so the whole cycle runs under one lock.
    pub fn update_settings(
        &self,
        change: impl FnOnce(&mut Settings),
    ) -> Result<Settings, PersistenceError> {
        let _guard = self.lock_settings();
        let mut settings = self.load_settings();
        change(&mut settings);
        settings.history_limit = clamp_capacity(settings.history_limit);
        self.write_settings(&settings)?;
        Ok(settings)
    }

    fn lock_settings(&self) -> std::sync::MutexGuard<'_, ()> {
        // The guarded data is (), so a poisoned lock is still usable
        self.settings_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_settings(&self, settings: &Settings) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(settings)?;
        write_atomic(&self.settings_path, &json)?;
        debug!("Saved settings to {:?}", self.settings_path);
        Ok(())
    }

    /// Stored history capacity (default 50, always clamped)
    pub fn load_capacity(&self) -> usize {
        self.load_settings().history_limit
    }

    pub fn save_capacity(&self, capacity: usize) -> Result<(), PersistenceError> {
        self.update_settings(|settings| settings.history_limit = capacity)?;
        Ok(())
    }

    /// Start the background writer
    pub fn spawn_writer(self: Arc<Self>) -> PersistenceHandle {
        let (history_tx, history_rx) = watch::channel::<HistorySnapshot>(Arc::from(Vec::new()));
        let (capacity_tx, capacity_rx) = watch::channel(0usize);

        let task = tokio::spawn(run_writer(self, history_rx, capacity_rx));

        PersistenceHandle {
            history_tx,
            capacity_tx,
            task,
        }
    }
}

/// Write `bytes` to `path` via a temp file in the same directory
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Sender side of the background writer
pub struct PersistenceHandle {
    history_tx: watch::Sender<HistorySnapshot>,
    capacity_tx: watch::Sender<usize>,
    task: JoinHandle<()>,
}

impl PersistenceHandle {
    /// Queue a history snapshot; replaces any snapshot not yet written
    pub fn save(&self, items: HistorySnapshot) {
        self.history_tx.send_replace(items);
    }

    /// Queue a capacity change for settings.json
    pub fn save_capacity(&self, capacity: usize) {
        self.capacity_tx.send_replace(capacity);
    }

    /// Stop accepting saves and wait until queued writes are on disk
    pub async fn close(self) {
        let PersistenceHandle {
            history_tx,
            capacity_tx,
            task,
        } = self;
        drop(history_tx);
        drop(capacity_tx);

        if let Err(e) = task.await {
            error!("Persistence writer task failed: {}", e);
        }
    }
}

async fn run_writer(
    persistence: Arc<Persistence>,
    mut history_rx: watch::Receiver<HistorySnapshot>,
    mut capacity_rx: watch::Receiver<usize>,
) {
    let mut history_open = true;
    let mut capacity_open = true;

    while history_open || capacity_open {
        tokio::select! {
            changed = history_rx.changed(), if history_open => match changed {
                Ok(()) => {
                    let items = history_rx.borrow_and_update().clone();
                    let persistence = Arc::clone(&persistence);
                    let result = tokio::task::spawn_blocking(move || persistence.save_sync(&items)).await;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("Failed to save history: {}", e),
                        Err(e) => error!("History save task panicked: {}", e),
                    }
                }
                Err(_) => history_open = false,
            },
            changed = capacity_rx.changed(), if capacity_open => match changed {
                Ok(()) => {
                    let capacity = *capacity_rx.borrow_and_update();
                    let persistence = Arc::clone(&persistence);
                    let result = tokio::task::spawn_blocking(move || persistence.save_capacity(capacity)).await;
                    match result {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => error!("Failed to save capacity: {}", e),
                        Err(e) => error!("Capacity save task panicked: {}", e),
                    }
                }
                Err(_) => capacity_open = false,
            },
        }
    }

    debug!("Persistence writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn sample_items() -> Vec<Arc<Item>> {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let mut reps = BTreeMap::new();
        reps.insert("public.png".to_string(), vec![0x89, b'P', b'N', b'G']);
        reps.insert("public.tiff".to_string(), vec![b'I', b'I', 42, 0]);

        vec![
            Arc::new(Item::new(ItemKind::Text, b"hello".to_vec(), "hello").with_timestamp(t)),
            Arc::new(
                Item::new(ItemKind::Image, vec![0x89, b'P', b'N', b'G'], "Image (1x1)")
                    .with_timestamp(t)
                    .with_thumbnail(vec![1, 2, 3])
                    .with_representations(reps),
            ),
            Arc::new(Item::new(ItemKind::RichText, b"{\\rtf1 x}".to_vec(), "x").with_timestamp(t)),
        ]
    }

    fn unwrap_all(items: &[Arc<Item>]) -> Vec<Item> {
        items.iter().map(|item| item.as_ref().clone()).collect()
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());
        let items = sample_items();

        persistence.save_sync(&items).unwrap();
        let loaded = persistence.load(50);

        assert_eq!(loaded, unwrap_all(&items));
    }

    #[test]
    fn test_load_truncates_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());
        let items = sample_items();

        persistence.save_sync(&items).unwrap();
        let loaded = persistence.load(2);

        assert_eq!(loaded, unwrap_all(&items[..2]));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path().join("never-created"));
        assert!(persistence.load(50).is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());
        std::fs::write(persistence.history_path(), b"[{\"id\": 12").unwrap();

        assert!(persistence.load(50).is_empty());
        assert!(matches!(
            persistence.try_load(),
            Err(PersistenceError::Serialization(_))
        ));
    }

    #[test]
    fn test_bad_base64_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());
        let json = r#"[{"id":"5f1c7d2e-8a4b-4c1e-9f3a-2b6d8e0a1c3f","kindTag":0,"content":"***","preview":"x","timestamp":"2024-05-01T12:00:00Z"}]"#;
        std::fs::write(persistence.history_path(), json).unwrap();

        assert!(matches!(persistence.try_load(), Err(PersistenceError::Base64(_))));
        assert!(persistence.load(50).is_empty());
    }

    #[test]
    fn test_record_format() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());
        persistence.save_sync(&sample_items()[..1]).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(persistence.history_path()).unwrap()).unwrap();
        let record = &raw[0];
        assert_eq!(record["kindTag"], 0);
        assert_eq!(record["content"], "aGVsbG8=");
        assert_eq!(record["timestamp"], "2024-05-01T12:00:00Z");
        assert!(record.get("thumbnail").is_none());
        assert!(record.get("representations").is_none());
    }

    #[test]
    fn test_unknown_kind_tag_loads_as_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());
        let json = r#"[{"id":"5f1c7d2e-8a4b-4c1e-9f3a-2b6d8e0a1c3f","kindTag":9,"content":"eA==","preview":"x","timestamp":"2024-05-01T12:00:00Z"}]"#;
        std::fs::write(persistence.history_path(), json).unwrap();

        let loaded = persistence.load(50);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].kind, ItemKind::Unknown);
        assert_eq!(loaded[0].content, b"x");
    }

    #[test]
    fn test_capacity_round_trip_and_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());

        assert_eq!(persistence.load_capacity(), 50);

        persistence.save_capacity(120).unwrap();
        assert_eq!(persistence.load_capacity(), 120);

        persistence.save_capacity(5).unwrap();
        assert_eq!(persistence.load_capacity(), 10);

        std::fs::write(persistence.settings_path(), r#"{"historyLimit": 900}"#).unwrap();
        assert_eq!(persistence.load_capacity(), 200);
    }

    #[test]
    fn test_capacity_save_keeps_hotkey() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());

        let hotkey = crate::hotkey::HotKey::new(0x08, crate::hotkey::modifiers::CMD);
        persistence
            .update_settings(|settings| settings.hotkey = hotkey)
            .unwrap();
        persistence.save_capacity(30).unwrap();

        let settings = persistence.load_settings();
        assert_eq!(settings.hotkey, hotkey);
        assert_eq!(settings.history_limit, 30);
    }

    #[test]
    fn test_concurrent_settings_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()));
        let hotkey = crate::hotkey::HotKey::new(0x08, crate::hotkey::modifiers::CMD);

        let capacity_writer = {
            let persistence = Arc::clone(&persistence);
            std::thread::spawn(move || {
                for capacity in 100..=150 {
                    persistence.save_capacity(capacity).unwrap();
                }
            })
        };
        let hotkey_writer = {
            let persistence = Arc::clone(&persistence);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    persistence
                        .update_settings(|settings| settings.hotkey = hotkey)
                        .unwrap();
                }
            })
        };
        capacity_writer.join().unwrap();
        hotkey_writer.join().unwrap();

        let settings = persistence.load_settings();
        assert_eq!(settings.history_limit, 150);
        assert_eq!(settings.hotkey, hotkey);
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Persistence::new(dir.path());
        persistence.save_sync(&sample_items()).unwrap();
        persistence.save_sync(&sample_items()).unwrap();

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(HISTORY_FILE)]);
    }

    #[tokio::test]
    async fn test_writer_flushes_latest_snapshot_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = Arc::new(Persistence::new(dir.path()));
        let handle = Arc::clone(&persistence).spawn_writer();

        let items = sample_items();
        handle.save(Arc::from(items[..1].to_vec()));
        handle.save(Arc::from(items.clone()));
        handle.save_capacity(75);
        handle.close().await;

        assert_eq!(persistence.load(50), unwrap_all(&items));
        assert_eq!(persistence.load_capacity(), 75);
    }
}
