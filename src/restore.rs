//! Paste-back: writing a history item to the pasteboard and triggering ⌘V.

use crate::pasteboard::{formats, Pasteboard, PasteboardError};
use crate::types::{Item, ItemId, ItemKind};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Item {0} is not in the history")]
    NotFound(ItemId),
    #[error("Item {0} has nothing that can be written to the pasteboard")]
    NothingToWrite(ItemId),
    #[error("Pasteboard error: {0}")]
    Pasteboard(#[from] PasteboardError),
    #[error("Failed to post paste keystroke: {0}")]
    Keystroke(String),
    #[error("Keystroke simulation is not available on this platform")]
    Unsupported,
}

/// Posts the system paste shortcut to the frontmost app
pub trait KeystrokeSender: Send + Sync {
    fn send_paste(&self) -> Result<(), RestoreError>;
}

/// Formats and bytes to write for an item, in write order
pub fn payload(item: &Item) -> Vec<(String, Vec<u8>)> {
    let mut payload: Vec<(String, Vec<u8>)> = item
        .representations
        .iter()
        .map(|(format, bytes)| (format.clone(), bytes.clone()))
        .collect();

    if payload.is_empty() {
        payload = fallback_payload(item);
    } else if item.kind == ItemKind::Image
        && !item.representations.contains_key(formats::PNG)
    {
        payload.push((formats::PNG.to_string(), item.content.clone()));
    }

    payload
}

/// Single-format rendition when no representations were saved
fn fallback_payload(item: &Item) -> Vec<(String, Vec<u8>)> {
    let format = match item.kind {
        ItemKind::Text => formats::TEXT,
        ItemKind::Image => formats::PNG,
        ItemKind::RichText if item.content.starts_with(b"{\\rtf") => formats::RTF,
        ItemKind::RichText if std::str::from_utf8(&item.content).is_ok() => formats::HTML,
        ItemKind::RichText | ItemKind::Unknown => return Vec::new(),
    };
    vec![(format.to_string(), item.content.clone())]
}

/// Replace the pasteboard contents with an item; returns formats written
pub fn write_item(pasteboard: &mut dyn Pasteboard, item: &Item) -> Result<usize, RestoreError> {
    let payload = payload(item);
    if payload.is_empty() {
        return Err(RestoreError::NothingToWrite(item.id));
    }

    pasteboard.clear();

    let mut written = 0;
    let mut last_error = None;
    for (format, bytes) in &payload {
        match pasteboard.write(format, bytes) {
            Ok(()) => written += 1,
            Err(e) => {
                warn!("Skipping {} while restoring {}: {}", format, item.id, e);
                last_error = Some(e);
            }
        }
    }

    if written == 0 {
        if let Some(e) = last_error {
            return Err(e.into());
        }
    }

    debug!("Restored {} ({} of {} formats)", item.id, written, payload.len());
    Ok(written)
}

/// Send ⌘V after `delay`, off the caller's task
pub fn schedule_paste(sender: Arc<dyn KeystrokeSender>, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Err(e) = sender.send_paste() {
            warn!("Paste keystroke failed: {}", e);
        }
    });
}

#[cfg(target_os = "macos")]
mod macos {
    use super::*;
    use crate::hotkey::KEY_V;
    use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation};
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};

    /// Posts ⌘V through the HID event tap (requires Accessibility permission)
    pub struct CgKeystrokeSender;

    impl KeystrokeSender for CgKeystrokeSender {
        fn send_paste(&self) -> Result<(), RestoreError> {
            let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
                .map_err(|_| RestoreError::Keystroke("cannot create event source".into()))?;

            for key_down in [true, false] {
                let event = CGEvent::new_keyboard_event(source.clone(), KEY_V as u16, key_down)
                    .map_err(|_| RestoreError::Keystroke("cannot create keyboard event".into()))?;
                event.set_flags(CGEventFlags::CGEventFlagCommand);
                event.post(CGEventTapLocation::HID);
            }

            debug!("Posted paste keystroke");
            Ok(())
        }
    }
}

#[cfg(target_os = "macos")]
pub use macos::CgKeystrokeSender;

/// Keystroke sender for the current platform
#[cfg(target_os = "macos")]
pub fn system_keystroke_sender() -> Arc<dyn KeystrokeSender> {
    Arc::new(CgKeystrokeSender)
}

/// Keystroke sender for the current platform
#[cfg(not(target_os = "macos"))]
pub fn system_keystroke_sender() -> Arc<dyn KeystrokeSender> {
    Arc::new(UnsupportedKeystrokeSender)
}

/// Reports [`RestoreError::Unsupported`] for every paste
#[cfg(not(target_os = "macos"))]
struct UnsupportedKeystrokeSender;

#[cfg(not(target_os = "macos"))]
impl KeystrokeSender for UnsupportedKeystrokeSender {
    fn send_paste(&self) -> Result<(), RestoreError> {
        Err(RestoreError::Unsupported)
    }
}
