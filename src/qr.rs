//! QR code scanning of history images and pasteboard contents.
//!
//! Decoding itself is a collaborator ([`QrDecoder`]); this module runs the
//! scan flow and classifies the payload as a web address or plain text. The
//! caller decides what to do with the outcome: prompt to open a URL, or copy
//! text back to the pasteboard through the engine.

use crate::pasteboard::{formats, PasteboardSnapshot};
use crate::types::{Item, ItemKind};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Longest payload shown verbatim in a result message
const DISPLAY_LIMIT: usize = 200;

/// Generic image type some apps publish instead of a concrete format
const GENERIC_IMAGE: &str = "public.image";

lazy_static! {
    // Web addresses written without a scheme
    static ref BARE_WEB_ADDRESS: Vec<Regex> = [
        r"^www\.[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9]\.[a-zA-Z]{2,}(?:\.[a-zA-Z]{2,})?(?:/\S*)?$",
        r"^[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9]\.[a-zA-Z]{2,}(?:\.[a-zA-Z]{2,})?(?:/\S*)?$",
        r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(?::\d+)?(?:/\S*)?$",
        r"^localhost(?::\d+)?(?:/\S*)?$",
        r"^[a-zA-Z0-9][a-zA-Z0-9-]{0,61}[a-zA-Z0-9]\.local(?:/\S*)?$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
}

/// QR detection and decoding backend (Vision on macOS, a pure decoder elsewhere)
#[async_trait]
pub trait QrDecoder: Send + Sync {
    /// Cheap check whether the image holds any QR code
    async fn contains_code(&self, image: &[u8]) -> bool;

    /// Payload of the first QR code found
    async fn decode(&self, image: &[u8]) -> Option<String>;
}

/// Scan failures, each with a title and message fit for a modal
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QrError {
    #[error("Only image items can be scanned for a QR code")]
    NotAnImage,
    #[error("Image data is invalid")]
    InvalidImage,
    #[error("No image found on the pasteboard")]
    NoImage,
    #[error("No QR code found")]
    NoCode,
    #[error("QR code could not be read")]
    DecodeFailed,
}

impl QrError {
    pub fn title(&self) -> &'static str {
        match self {
            QrError::NotAnImage | QrError::InvalidImage => "Error",
            QrError::NoImage => "No image found",
            QrError::NoCode => "No QR code found",
            QrError::DecodeFailed => "QR code recognition failed",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            QrError::NotAnImage => "Only image items can be scanned for a QR code",
            QrError::InvalidImage => "The image data is invalid",
            QrError::NoImage => {
                "Make sure the pasteboard contains an image (PNG, JPEG, TIFF, HEIC or GIF)"
            }
            QrError::NoCode => "Make sure the image contains a valid QR code",
            QrError::DecodeFailed => "Could not read the QR code contents",
        }
    }
}

/// Decoded payload, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrOutcome {
    /// A web address; `url` has a scheme even when the payload had none
    WebUrl { raw: String, url: Url },
    /// Anything else, to be copied to the pasteboard
    Text(String),
}

impl QrOutcome {
    pub fn from_payload(payload: String) -> Self {
        if is_web_url(&payload) {
            if let Some(url) = normalize_web_url(&payload) {
                return QrOutcome::WebUrl { raw: payload, url };
            }
        }
        QrOutcome::Text(payload)
    }

    /// Raw decoded payload
    pub fn payload(&self) -> &str {
        match self {
            QrOutcome::WebUrl { raw, .. } => raw,
            QrOutcome::Text(text) => text,
        }
    }

    /// Title and message announcing the result
    pub fn alert(&self) -> (&'static str, String) {
        match self {
            QrOutcome::WebUrl { raw, .. } => (
                "Web address detected",
                format!("Open the following page?\n\n{}", raw),
            ),
            QrOutcome::Text(text) => (
                "QR code recognized",
                format!(
                    "Copied the QR code contents to the pasteboard:\n\n{}",
                    display_text(text)
                ),
            ),
        }
    }
}

/// Scan raw image bytes
pub async fn scan_bytes(decoder: &dyn QrDecoder, image: &[u8]) -> Result<QrOutcome, QrError> {
    if image.is_empty() {
        return Err(QrError::InvalidImage);
    }
    if !decoder.contains_code(image).await {
        debug!("No QR code in {} byte image", image.len());
        return Err(QrError::NoCode);
    }

    let payload = decoder.decode(image).await.ok_or(QrError::DecodeFailed)?;
    let outcome = QrOutcome::from_payload(payload);
    debug!(
        "QR payload decoded as {}",
        match outcome {
            QrOutcome::WebUrl { .. } => "web address",
            QrOutcome::Text(_) => "text",
        }
    );
    Ok(outcome)
}

/// Scan a history item; only images qualify
pub async fn scan_item(decoder: &dyn QrDecoder, item: &Item) -> Result<QrOutcome, QrError> {
    if item.kind != ItemKind::Image {
        return Err(QrError::NotAnImage);
    }
    scan_bytes(decoder, &item.content).await
}

/// Scan whatever image is currently on the pasteboard
pub async fn scan_snapshot(
    decoder: &dyn QrDecoder,
    snapshot: &PasteboardSnapshot,
) -> Result<QrOutcome, QrError> {
    let image = snapshot_image(snapshot).ok_or(QrError::NoImage)?;
    scan_bytes(decoder, image).await
}

/// Raw image formats first, then the image object export
fn snapshot_image(snapshot: &PasteboardSnapshot) -> Option<&[u8]> {
    formats::IMAGE_FORMATS
        .iter()
        .copied()
        .chain(std::iter::once(GENERIC_IMAGE))
        .find_map(|format| snapshot.get(format))
        .or(snapshot.image_object.as_deref())
}

/// Check whether a string is a web address (with or without scheme)
pub fn is_web_url(candidate: &str) -> bool {
    let trimmed = candidate.trim();
    if let Ok(url) = Url::parse(trimmed) {
        if matches!(url.scheme(), "http" | "https") {
            return true;
        }
    }

    BARE_WEB_ADDRESS.iter().any(|pattern| pattern.is_match(trimmed))
}

/// Parse a web address, defaulting to https when no scheme is given
pub fn normalize_web_url(candidate: &str) -> Option<Url> {
    let trimmed = candidate.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Url::parse(trimmed).ok()
    } else {
        Url::parse(&format!("https://{}", trimmed)).ok()
    }
}

/// Payload as shown to the user: at most 200 characters plus "..."
pub fn display_text(payload: &str) -> String {
    if payload.chars().count() > DISPLAY_LIMIT {
        let head: String = payload.chars().take(DISPLAY_LIMIT).collect();
        format!("{}...", head)
    } else {
        payload.to_string()
    }
}
