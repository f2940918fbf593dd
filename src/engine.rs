//! The clipboard engine: poll loop, command handling and paste-back.
//!
//! [`ClipboardEngine`] is the single owner of the history. One
//! `tokio::select!` loop serializes poll ticks and commands arriving from UI
//! layers through an [`EngineHandle`], so every mutation happens on one task.

use crate::change_detector::ChangeDetector;
use crate::classifier::Classifier;
use crate::config::Config;
use crate::history::{CaptureOutcome, HistoryEvent, HistoryStore};
use crate::pasteboard::{Pasteboard, PasteboardError, PasteboardSnapshot};
use crate::persistence::{HistorySnapshot, Persistence};
use crate::privacy::PrivacyFilter;
use crate::qr::{self, QrDecoder, QrError, QrOutcome};
use crate::restore::{self, KeystrokeSender, RestoreError};
use crate::types::{Item, ItemId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace};

/// Pending commands before senders wait
const COMMAND_BUFFER: usize = 32;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Engine is not running")]
    Closed,
    #[error(transparent)]
    Restore(#[from] RestoreError),
    #[error(transparent)]
    Pasteboard(#[from] PasteboardError),
    #[error(transparent)]
    Qr(#[from] QrError),
}

/// Requests handled by the engine loop
#[derive(Debug)]
pub enum EngineCommand {
    Restore {
        id: ItemId,
        paste: bool,
        reply: oneshot::Sender<Result<(), RestoreError>>,
    },
    Promote {
        id: ItemId,
        reply: oneshot::Sender<bool>,
    },
    Remove {
        id: ItemId,
        reply: oneshot::Sender<bool>,
    },
    Clear {
        reply: oneshot::Sender<()>,
    },
    SetCapacity {
        capacity: usize,
        reply: oneshot::Sender<usize>,
    },
    Get {
        id: ItemId,
        reply: oneshot::Sender<Option<Arc<Item>>>,
    },
    Items {
        reply: oneshot::Sender<HistorySnapshot>,
    },
    Search {
        query: String,
        reply: oneshot::Sender<Vec<Arc<Item>>>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<HistoryEvent>>,
    },
    /// Read everything on the pasteboard right now
    Snapshot {
        reply: oneshot::Sender<PasteboardSnapshot>,
    },
    CopyText {
        text: String,
        reply: oneshot::Sender<Result<(), PasteboardError>>,
    },
    SetPaused {
        paused: bool,
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
    Shutdown,
}

/// Engine status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub paused: bool,
    pub items: usize,
    pub capacity: usize,
    pub last_change_count: i64,
}

pub struct ClipboardEngine<P: Pasteboard> {
    pasteboard: P,
    classifier: Classifier,
    privacy_filter: PrivacyFilter,
    change_detector: ChangeDetector,
    history: HistoryStore,
    keystroke: Arc<dyn KeystrokeSender>,
    /// Used for the final synchronous save
    persistence: Option<Arc<Persistence>>,
    poll_interval: Duration,
    keystroke_delay: Duration,
    paused: bool,
}

impl<P: Pasteboard> ClipboardEngine<P> {
    /// Create an engine; whatever is on the pasteboard now is the baseline
    pub fn new(
        config: &Config,
        pasteboard: P,
        history: HistoryStore,
        keystroke: Arc<dyn KeystrokeSender>,
    ) -> Self {
        let baseline = pasteboard.change_count();
        debug!("Pasteboard baseline change count {}", baseline);

        Self {
            pasteboard,
            classifier: Classifier::new(&config.capture),
            privacy_filter: PrivacyFilter::new(config.privacy.clone()),
            change_detector: ChangeDetector::new(baseline),
            history,
            keystroke,
            persistence: None,
            poll_interval: config.polling.interval(),
            keystroke_delay: Duration::from_millis(config.paste.keystroke_delay_ms),
            paused: false,
        }
    }

    /// Save the final state here on shutdown
    pub fn with_persistence(mut self, persistence: Arc<Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Create the command channel for this engine
    pub fn channel() -> (EngineHandle, mpsc::Receiver<EngineCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        (EngineHandle { tx }, rx)
    }

    /// Sample the pasteboard once and capture any new content
    pub fn tick(&mut self) -> Option<CaptureOutcome> {
        let change_count = self.pasteboard.change_count();

        if self.paused {
            // Keep up with the counter so resuming ignores what was copied meanwhile
            self.change_detector.observe(change_count);
            return None;
        }

        if !self.change_detector.has_changed(change_count) {
            return None;
        }

        let snapshot = PasteboardSnapshot::capture(&self.pasteboard);
        if let Some(marker) = self.privacy_filter.blocking_type(&snapshot) {
            info!("Skipping private pasteboard content ({})", marker);
            return None;
        }

        let candidate = self.classifier.classify(&snapshot)?;
        let outcome = self.history.capture(candidate);
        trace!("Capture outcome {:?}", outcome);
        Some(outcome)
    }

    /// Write an item back to the pasteboard, optionally followed by ⌘V
    pub fn restore(&mut self, id: ItemId, paste: bool) -> Result<(), RestoreError> {
        let item = self.history.get(id).ok_or(RestoreError::NotFound(id))?;

        restore::write_item(&mut self.pasteboard, &item)?;
        self.history.note_paste_back(item.kind, &item.content);
        self.history.promote(id);

        if paste {
            restore::schedule_paste(Arc::clone(&self.keystroke), self.keystroke_delay);
        }

        info!("Restored item {} (paste: {})", id, paste);
        Ok(())
    }

    /// Put plain text on the pasteboard (captured on the next tick)
    pub fn copy_text(&mut self, text: &str) -> Result<(), PasteboardError> {
        self.pasteboard.write_string(text)
    }

    pub fn pause(&mut self) {
        info!("Capture paused");
        self.paused = true;
    }

    pub fn resume(&mut self) {
        info!("Capture resumed");
        self.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            paused: self.paused,
            items: self.history.len(),
            capacity: self.history.capacity(),
            last_change_count: self.change_detector.last_seen(),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut HistoryStore {
        &mut self.history
    }

    pub fn pasteboard(&self) -> &P {
        &self.pasteboard
    }

    pub fn pasteboard_mut(&mut self) -> &mut P {
        &mut self.pasteboard
    }

    /// Ignore an additional pasteboard type pattern at runtime
    pub fn ignore_type(&mut self, pattern: &str) {
        self.privacy_filter.ignore_type(pattern);
    }

    /// Poll and serve commands until `shutdown` resolves or a
    /// [`EngineCommand::Shutdown`] arrives
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut commands_open = true;
        info!("Engine running with {:?} poll interval", self.poll_interval);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
                command = commands.recv(), if commands_open => match command {
                    Some(EngineCommand::Shutdown) => {
                        info!("Shutdown requested");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("All engine handles dropped");
                        commands_open = false;
                    }
                },
            }
        }
    }

    fn handle_command(&mut self, command: EngineCommand) {
        // A dropped reply receiver only means the caller stopped waiting
        match command {
            EngineCommand::Restore { id, paste, reply } => {
                let _ = reply.send(self.restore(id, paste));
            }
            EngineCommand::Promote { id, reply } => {
                let _ = reply.send(self.history.promote(id));
            }
            EngineCommand::Remove { id, reply } => {
                let _ = reply.send(self.history.remove(id));
            }
            EngineCommand::Clear { reply } => {
                self.history.clear();
                let _ = reply.send(());
            }
            EngineCommand::SetCapacity { capacity, reply } => {
                let _ = reply.send(self.history.set_capacity(capacity));
            }
            EngineCommand::Get { id, reply } => {
                let _ = reply.send(self.history.get(id));
            }
            EngineCommand::Items { reply } => {
                let _ = reply.send(self.history.snapshot());
            }
            EngineCommand::Search { query, reply } => {
                let _ = reply.send(self.history.search(&query));
            }
            EngineCommand::Subscribe { reply } => {
                let _ = reply.send(self.history.subscribe());
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(PasteboardSnapshot::capture(&self.pasteboard));
            }
            EngineCommand::CopyText { text, reply } => {
                let _ = reply.send(self.copy_text(&text));
            }
            EngineCommand::SetPaused { paused, reply } => {
                if paused {
                    self.pause();
                } else {
                    self.resume();
                }
                let _ = reply.send(());
            }
            EngineCommand::Status { reply } => {
                let _ = reply.send(self.status());
            }
            EngineCommand::Shutdown => {}
        }
    }

    /// Flush the writer, then save the final state synchronously
    pub async fn shutdown(mut self) {
        if let Some(writer) = self.history.detach_persistence() {
            writer.close().await;
        }

        if let Some(persistence) = &self.persistence {
            match persistence.save_sync(self.history.items()) {
                Ok(()) => info!("Saved {} history items on shutdown", self.history.len()),
                Err(e) => error!("Failed to save history on shutdown: {}", e),
            }
        }
    }
}

/// Cloneable client for a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> EngineCommand,
    ) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| EngineError::Closed)?;
        response.await.map_err(|_| EngineError::Closed)
    }

    /// Write an item back to the pasteboard, optionally simulating ⌘V
    pub async fn restore(&self, id: ItemId, paste: bool) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Restore { id, paste, reply })
            .await??;
        Ok(())
    }

    pub async fn promote(&self, id: ItemId) -> Result<bool, EngineError> {
        self.request(|reply| EngineCommand::Promote { id, reply }).await
    }

    pub async fn remove(&self, id: ItemId) -> Result<bool, EngineError> {
        self.request(|reply| EngineCommand::Remove { id, reply }).await
    }

    pub async fn clear(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::Clear { reply }).await
    }

    /// Returns the capacity actually applied
    pub async fn set_capacity(&self, capacity: usize) -> Result<usize, EngineError> {
        self.request(|reply| EngineCommand::SetCapacity { capacity, reply })
            .await
    }

    pub async fn get(&self, id: ItemId) -> Result<Option<Arc<Item>>, EngineError> {
        self.request(|reply| EngineCommand::Get { id, reply }).await
    }

    pub async fn items(&self) -> Result<HistorySnapshot, EngineError> {
        self.request(|reply| EngineCommand::Items { reply }).await
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Arc<Item>>, EngineError> {
        let query = query.to_string();
        self.request(|reply| EngineCommand::Search { query, reply })
            .await
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<HistoryEvent>, EngineError> {
        self.request(|reply| EngineCommand::Subscribe { reply }).await
    }

    pub async fn copy_text(&self, text: &str) -> Result<(), EngineError> {
        let text = text.to_string();
        self.request(|reply| EngineCommand::CopyText { text, reply })
            .await??;
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetPaused { paused: true, reply })
            .await
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineCommand::SetPaused { paused: false, reply })
            .await
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request(|reply| EngineCommand::Status { reply }).await
    }

    /// Scan a history image for a QR code; text payloads are copied to the pasteboard
    pub async fn scan_item_qr(
        &self,
        decoder: &dyn QrDecoder,
        id: ItemId,
    ) -> Result<QrOutcome, EngineError> {
        let item = self
            .get(id)
            .await?
            .ok_or(RestoreError::NotFound(id))?;
        let outcome = qr::scan_item(decoder, &item).await?;
        self.deliver_qr(&outcome).await?;
        Ok(outcome)
    }

    /// Scan the image currently on the pasteboard
    pub async fn scan_pasteboard_qr(&self, decoder: &dyn QrDecoder) -> Result<QrOutcome, EngineError> {
        let snapshot = self
            .request(|reply| EngineCommand::Snapshot { reply })
            .await?;
        let outcome = qr::scan_snapshot(decoder, &snapshot).await?;
        self.deliver_qr(&outcome).await?;
        Ok(outcome)
    }

    /// Web addresses are left to the caller (prompt to open); text is copied
    async fn deliver_qr(&self, outcome: &QrOutcome) -> Result<(), EngineError> {
        if let QrOutcome::Text(text) = outcome {
            self.copy_text(text).await?;
        }
        Ok(())
    }

    /// Ask the loop to stop
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.tx
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| EngineError::Closed)
    }
}
