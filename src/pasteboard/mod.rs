//! System pasteboard access.
//!
//! The engine only consumes the [`Pasteboard`] trait. On macOS it is backed by
//! `NSPasteboard`; [`MemoryPasteboard`] is an in-process implementation used
//! by tests and embedders.

pub mod memory;

#[cfg(target_os = "macos")]
mod macos;

pub use memory::MemoryPasteboard;

use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::trace;

/// Pasteboard format identifiers (macOS UTIs)
pub mod formats {
    /// Canonical plain text
    pub const TEXT: &str = "public.utf8-plain-text";
    /// Other plain-text encodings an app may publish alongside [`TEXT`]
    pub const TEXT_VARIANTS: &[&str] = &[
        "public.utf16-external-plain-text",
        "public.utf16-plain-text",
        "NSStringPboardType",
    ];
    pub const RTF: &str = "public.rtf";
    pub const HTML: &str = "public.html";
    pub const PNG: &str = "public.png";
    pub const JPEG: &str = "public.jpeg";
    pub const TIFF: &str = "public.tiff";
    pub const HEIC: &str = "public.heic";
    pub const GIF: &str = "com.compuserve.gif";
    pub const FILE_URL: &str = "public.file-url";

    /// Raw image formats in classification order
    pub const IMAGE_FORMATS: &[&str] = &[PNG, JPEG, TIFF, HEIC, GIF];

    pub fn is_image_format(format: &str) -> bool {
        IMAGE_FORMATS.contains(&format)
    }

    pub fn is_text_format(format: &str) -> bool {
        format == TEXT || TEXT_VARIANTS.contains(&format)
    }
}

/// Errors raised by pasteboard backends
#[derive(Debug, thiserror::Error)]
pub enum PasteboardError {
    #[error("No system pasteboard on this platform")]
    Unsupported,

    #[error("Pasteboard rejected data for {0}")]
    WriteRejected(String),
}

/// Access to a pasteboard (the system one or an in-memory stand-in)
pub trait Pasteboard {
    /// Monotonic counter, changes on every write by any process
    fn change_count(&self) -> i64;

    /// Format identifiers currently exposed
    fn types(&self) -> Vec<String>;

    /// Raw bytes under a format identifier
    fn read(&self, format: &str) -> Option<Vec<u8>>;

    /// TIFF export of a decodable image object, if one is present
    fn read_image_object(&self) -> Option<Vec<u8>>;

    /// Paths of file references on the pasteboard
    fn read_file_references(&self) -> Vec<PathBuf>;

    /// Write bytes under a format identifier (call [`Pasteboard::clear`] first)
    fn write(&mut self, format: &str, bytes: &[u8]) -> Result<(), PasteboardError>;

    /// Drop all current contents and take ownership of the pasteboard
    fn clear(&mut self);

    /// Replace the contents with a single string
    fn write_string(&mut self, text: &str) -> Result<(), PasteboardError> {
        self.clear();
        self.write(formats::TEXT, text.as_bytes())
    }
}

/// Read-only copy of everything the pasteboard exposes at one instant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteboardSnapshot {
    pub change_count: i64,
    pub data: BTreeMap<String, Vec<u8>>,
    pub image_object: Option<Vec<u8>>,
    pub file_references: Vec<PathBuf>,
}

impl PasteboardSnapshot {
    /// Read every exposed format from a live pasteboard
    pub fn capture(pasteboard: &dyn Pasteboard) -> Self {
        let mut data = BTreeMap::new();
        for format in pasteboard.types() {
            if let Some(bytes) = pasteboard.read(&format) {
                data.insert(format, bytes);
            }
        }

        let snapshot = Self {
            change_count: pasteboard.change_count(),
            data,
            image_object: pasteboard.read_image_object(),
            file_references: pasteboard.read_file_references(),
        };

        trace!(
            "Snapshot #{}: {} formats, image object: {}, files: {}",
            snapshot.change_count,
            snapshot.data.len(),
            snapshot.image_object.is_some(),
            snapshot.file_references.len()
        );

        snapshot
    }

    pub fn get(&self, format: &str) -> Option<&[u8]> {
        self.data.get(format).map(Vec::as_slice)
    }

    pub fn has(&self, format: &str) -> bool {
        self.data.contains_key(format)
    }

    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.image_object.is_none() && self.file_references.is_empty()
    }

    pub fn with_data(mut self, format: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.data.insert(format.to_string(), bytes.into());
        self
    }

    pub fn with_image_object(mut self, tiff: Vec<u8>) -> Self {
        self.image_object = Some(tiff);
        self
    }

    pub fn with_file_reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_references.push(path.into());
        self
    }
}

/// Open the general system pasteboard
#[cfg(target_os = "macos")]
pub fn system() -> Result<Box<dyn Pasteboard>, PasteboardError> {
    Ok(Box::new(macos::MacPasteboard::general()))
}

/// Open the general system pasteboard
#[cfg(not(target_os = "macos"))]
pub fn system() -> Result<Box<dyn Pasteboard>, PasteboardError> {
    Err(PasteboardError::Unsupported)
}

impl<P: Pasteboard + ?Sized> Pasteboard for Box<P> {
    fn change_count(&self) -> i64 {
        (**self).change_count()
    }

    fn types(&self) -> Vec<String> {
        (**self).types()
    }

    fn read(&self, format: &str) -> Option<Vec<u8>> {
        (**self).read(format)
    }

    fn read_image_object(&self) -> Option<Vec<u8>> {
        (**self).read_image_object()
    }

    fn read_file_references(&self) -> Vec<PathBuf> {
        (**self).read_file_references()
    }

    fn write(&mut self, format: &str, bytes: &[u8]) -> Result<(), PasteboardError> {
        (**self).write(format, bytes)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}
