//! Global hotkey model and registration.
//!
//! The hotkey is stored as a macOS virtual key code plus Carbon modifier
//! bits, the same encoding `RegisterEventHotKey` takes. Registration itself
//! is delegated to a [`HotkeyRegistrar`] supplied by the UI layer.

use crate::persistence::{Persistence, PersistenceError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Carbon modifier bits
pub mod modifiers {
    pub const CMD: u32 = 1 << 8;
    pub const SHIFT: u32 = 1 << 9;
    pub const OPTION: u32 = 1 << 11;
    pub const CONTROL: u32 = 1 << 12;

    pub const ALL: u32 = CMD | SHIFT | OPTION | CONTROL;
}

/// Virtual key code of V (ANSI layout)
pub const KEY_V: u32 = 0x09;

/// ANSI virtual key codes with printable names
const KEY_NAMES: &[(u32, &str)] = &[
    (0x00, "A"),
    (0x01, "S"),
    (0x02, "D"),
    (0x03, "F"),
    (0x04, "H"),
    (0x05, "G"),
    (0x06, "Z"),
    (0x07, "X"),
    (0x08, "C"),
    (0x09, "V"),
    (0x0B, "B"),
    (0x0C, "Q"),
    (0x0D, "W"),
    (0x0E, "E"),
    (0x0F, "R"),
    (0x10, "Y"),
    (0x11, "T"),
    (0x12, "1"),
    (0x13, "2"),
    (0x14, "3"),
    (0x15, "4"),
    (0x16, "6"),
    (0x17, "5"),
    (0x18, "="),
    (0x19, "9"),
    (0x1A, "7"),
    (0x1B, "-"),
    (0x1C, "8"),
    (0x1D, "0"),
    (0x1E, "]"),
    (0x1F, "O"),
    (0x20, "U"),
    (0x21, "["),
    (0x22, "I"),
    (0x23, "P"),
    (0x24, "Enter"),
    (0x25, "L"),
    (0x26, "J"),
    (0x27, "'"),
    (0x28, "K"),
    (0x29, ";"),
    (0x2A, "\\"),
    (0x2B, ","),
    (0x2C, "/"),
    (0x2D, "N"),
    (0x2E, "M"),
    (0x2F, "."),
    (0x30, "Tab"),
    (0x31, "Space"),
    (0x32, "`"),
    (0x33, "Delete"),
    (0x35, "Esc"),
];

#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("Hotkey needs at least one modifier")]
    MissingModifier,
    #[error("Hotkey registration failed: {0}")]
    Registration(String),
    #[error("Failed to persist hotkey: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Key combination that opens the history panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotKey {
    pub key_code: u32,
    pub modifiers: u32,
}

impl Default for HotKey {
    /// ⌘⇧V
    fn default() -> Self {
        Self {
            key_code: KEY_V,
            modifiers: modifiers::CMD | modifiers::SHIFT,
        }
    }
}

impl HotKey {
    pub fn new(key_code: u32, modifiers: u32) -> Self {
        Self {
            key_code,
            modifiers: modifiers & modifiers::ALL,
        }
    }

    /// Build from individual modifier flags (as reported by a key event)
    pub fn from_flags(key_code: u32, command: bool, shift: bool, option: bool, control: bool) -> Self {
        let mut mods = 0;
        if command {
            mods |= modifiers::CMD;
        }
        if shift {
            mods |= modifiers::SHIFT;
        }
        if option {
            mods |= modifiers::OPTION;
        }
        if control {
            mods |= modifiers::CONTROL;
        }
        Self::new(key_code, mods)
    }

    pub fn is_valid(&self) -> bool {
        self.modifiers & modifiers::ALL != 0
    }

    /// Modifier symbols in display order
    pub fn modifier_symbols(&self) -> Vec<&'static str> {
        let mut parts = Vec::new();
        if self.modifiers & modifiers::CMD != 0 {
            parts.push("⌘");
        }
        if self.modifiers & modifiers::SHIFT != 0 {
            parts.push("⇧");
        }
        if self.modifiers & modifiers::OPTION != 0 {
            parts.push("⌥");
        }
        if self.modifiers & modifiers::CONTROL != 0 {
            parts.push("⌃");
        }
        parts
    }

    /// Human-readable form, e.g. "⌘ + ⇧ + V"
    pub fn description(&self) -> String {
        let mut parts: Vec<String> = self
            .modifier_symbols()
            .into_iter()
            .map(String::from)
            .collect();
        parts.push(key_name(self.key_code));
        parts.join(" + ")
    }
}

impl std::fmt::Display for HotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Display name for a virtual key code
pub fn key_name(key_code: u32) -> String {
    KEY_NAMES
        .iter()
        .find(|(code, _)| *code == key_code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| format!("KeyCode {}", key_code))
}

/// Invoked on the registrar's thread whenever the hotkey fires
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// Platform hook that binds a system-wide key combination
pub trait HotkeyRegistrar: Send {
    fn register(&mut self, hotkey: HotKey, callback: HotkeyCallback) -> Result<(), HotkeyError>;

    /// Release the current binding (no-op when nothing is registered)
    fn unregister(&mut self);
}

/// Owns the active hotkey: persists changes and re-registers
pub struct HotkeyManager<R: HotkeyRegistrar> {
    registrar: R,
    current: HotKey,
    on_pressed: HotkeyCallback,
    persistence: Option<Arc<Persistence>>,
}

impl<R: HotkeyRegistrar> HotkeyManager<R> {
    pub fn new(registrar: R, hotkey: HotKey, on_pressed: HotkeyCallback) -> Self {
        Self {
            registrar,
            current: hotkey,
            on_pressed,
            persistence: None,
        }
    }

    /// Persist hotkey changes to settings.json
    pub fn with_persistence(mut self, persistence: Arc<Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn current(&self) -> HotKey {
        self.current
    }

    pub fn description(&self) -> String {
        self.current.description()
    }

    /// (Re-)register the current hotkey
    pub fn register(&mut self) -> Result<(), HotkeyError> {
        self.registrar.unregister();
        self.registrar
            .register(self.current, Arc::clone(&self.on_pressed))?;
        info!("Registered hotkey {}", self.current);
        Ok(())
    }

    /// Switch to a new hotkey, store it and re-register
    pub fn update(&mut self, hotkey: HotKey) -> Result<(), HotkeyError> {
        if !hotkey.is_valid() {
            return Err(HotkeyError::MissingModifier);
        }

        self.current = hotkey;
        if let Some(persistence) = &self.persistence {
            persistence.update_settings(|settings| settings.hotkey = hotkey)?;
        }
        self.register()
    }

    pub fn unregister(&mut self) {
        self.registrar.unregister();
    }
}

impl<R: HotkeyRegistrar> Drop for HotkeyManager<R> {
    fn drop(&mut self) {
        self.registrar.unregister();
    }
}

/// Registrar that accepts every binding without touching the OS
#[derive(Default)]
pub struct NoopRegistrar {
    registered: Option<HotKey>,
}

impl NoopRegistrar {
    pub fn registered(&self) -> Option<HotKey> {
        self.registered
    }
}

impl HotkeyRegistrar for NoopRegistrar {
    fn register(&mut self, hotkey: HotKey, _callback: HotkeyCallback) -> Result<(), HotkeyError> {
        if self.registered.is_some() {
            warn!("Replacing hotkey {:?} without unregistering", self.registered);
        }
        self.registered = Some(hotkey);
        Ok(())
    }

    fn unregister(&mut self) {
        self.registered = None;
    }
}
