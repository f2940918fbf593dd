//! PasteQuick - Clipboard history engine
//!
//! This crate watches the system pasteboard and keeps a bounded, deduplicated,
//! most-recent-first history of everything copied:
//!
//! - **Capture**: the pasteboard change counter is polled; each change is
//!   snapshotted and classified as text, rich text or image
//! - **History**: duplicates are promoted instead of re-added, overflow drops
//!   the oldest entries
//! - **Paste-back**: any entry can be written back with all of its original
//!   formats, optionally followed by a simulated ⌘V
//! - **Persistence**: history and settings survive restarts
//!
//! # Architecture
//!
//! [`ClipboardEngine`] owns the [`HistoryStore`] and runs a single loop that
//! serializes poll ticks and commands from an [`EngineHandle`]. Mutations are
//! mirrored to disk by a background writer (see [`persistence`]).

pub mod change_detector;
pub mod classifier;
pub mod config;
pub mod dedup;
pub mod engine;
pub mod history;
pub mod hotkey;
pub mod pasteboard;
pub mod persistence;
pub mod privacy;
pub mod qr;
pub mod restore;
pub mod settings;
pub mod types;

// Re-export commonly used types
pub use change_detector::ChangeDetector;
pub use classifier::Classifier;
pub use config::Config;
pub use dedup::{find_duplicate, is_duplicate};
pub use engine::{ClipboardEngine, EngineCommand, EngineError, EngineHandle, EngineStatus};
pub use history::{
    CaptureOutcome, HistoryChange, HistoryEvent, HistoryStore, DEFAULT_CAPACITY, MAX_CAPACITY,
    MIN_CAPACITY,
};
pub use hotkey::{HotKey, HotkeyError, HotkeyManager, HotkeyRegistrar};
pub use pasteboard::{MemoryPasteboard, Pasteboard, PasteboardError, PasteboardSnapshot};
pub use persistence::{HistorySnapshot, Persistence, PersistenceError, PersistenceHandle};
pub use privacy::{PrivacyFilter, ALWAYS_IGNORED_TYPES};
pub use qr::{QrDecoder, QrError, QrOutcome};
pub use restore::{KeystrokeSender, RestoreError};
pub use settings::Settings;
pub use types::{Item, ItemId, ItemKind, Representations};
