//! In-process pasteboard.

use super::{formats, Pasteboard, PasteboardError};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Pasteboard held in memory, with the same change-counter semantics as the
/// system one: every mutation bumps the counter.
#[derive(Debug, Default, Clone)]
pub struct MemoryPasteboard {
    change_count: i64,
    data: BTreeMap<String, Vec<u8>>,
    image_object: Option<Vec<u8>>,
    file_references: Vec<PathBuf>,
}

impl MemoryPasteboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate another app copying: replace contents with one format
    pub fn copy_data(&mut self, format: &str, bytes: impl Into<Vec<u8>>) {
        self.clear();
        self.set_data(format, bytes);
    }

    /// Simulate another app copying a string
    pub fn copy_text(&mut self, text: &str) {
        self.copy_data(formats::TEXT, text.as_bytes().to_vec());
    }

    /// Add a format to the current contents
    pub fn set_data(&mut self, format: &str, bytes: impl Into<Vec<u8>>) {
        self.data.insert(format.to_string(), bytes.into());
        self.change_count += 1;
    }

    pub fn set_image_object(&mut self, tiff: Vec<u8>) {
        self.image_object = Some(tiff);
        self.change_count += 1;
    }

    pub fn add_file_reference(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if let Ok(url) = url::Url::from_file_path(&path) {
            self.data
                .insert(formats::FILE_URL.to_string(), url.as_str().as_bytes().to_vec());
        }
        self.file_references.push(path);
        self.change_count += 1;
    }

    /// Bytes currently stored under a format
    pub fn data(&self, format: &str) -> Option<&[u8]> {
        self.data.get(format).map(Vec::as_slice)
    }
}

impl Pasteboard for MemoryPasteboard {
    fn change_count(&self) -> i64 {
        self.change_count
    }

    fn types(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    fn read(&self, format: &str) -> Option<Vec<u8>> {
        self.data.get(format).cloned()
    }

    fn read_image_object(&self) -> Option<Vec<u8>> {
        self.image_object.clone()
    }

    fn read_file_references(&self) -> Vec<PathBuf> {
        self.file_references.clone()
    }

    fn write(&mut self, format: &str, bytes: &[u8]) -> Result<(), PasteboardError> {
        self.set_data(format, bytes.to_vec());
        Ok(())
    }

    fn clear(&mut self) {
        self.data.clear();
        self.image_object = None;
        self.file_references.clear();
        self.change_count += 1;
    }
}
