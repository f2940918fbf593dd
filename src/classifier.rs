//! Classification of pasteboard snapshots into history items.
//!
//! A snapshot produces at most one candidate. Sources are tried in a fixed
//! priority order and the first that yields a valid item wins:
//!
//! 1. File reference to an image file
//! 2. Decodable image object
//! 3. Raw image bytes (PNG, JPEG, TIFF, HEIC, GIF)
//! 4. RTF
//! 5. HTML
//! 6. Plain text
//!
//! Every match also collects the alternate formats published for the same
//! content so paste-back can restore them byte for byte. Malformed data never
//! raises an error: the source simply does not match.

use crate::config::CaptureConfig;
use crate::pasteboard::{formats, PasteboardSnapshot};
use crate::types::{truncate_preview, Item, ItemKind, Representations};
use image::{DynamicImage, GenericImageView, ImageFormat};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, trace};

/// File extensions treated as image references
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "tif", "heic", "gif", "bmp", "webp"];

const RICH_TEXT_PLACEHOLDER: &str = "Rich text";
const HTML_PLACEHOLDER: &str = "HTML content";

lazy_static! {
    // Elements whose content is never visible text
    static ref HTML_HIDDEN: Regex = Regex::new(
        r"(?is)<(?:script|style|head)\b[^>]*>.*?</(?:script|style|head)\s*>"
    ).unwrap();

    // Block-level tags become word breaks
    static ref HTML_BLOCK_TAG: Regex = Regex::new(
        r"(?i)</?(?:p|div|br|li|tr|td|th|h[1-6]|ul|ol|table|blockquote)\b[^>]*>"
    ).unwrap();

    static ref HTML_TAG: Regex = Regex::new(r"<[^>]+>").unwrap();

    static ref HTML_ENTITY: Regex = Regex::new(
        r"&(#[xX][0-9a-fA-F]{1,6}|#[0-9]{1,7}|[a-zA-Z]{2,8});"
    ).unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Turns pasteboard snapshots into candidate items
pub struct Classifier {
    preview_chars: usize,
    thumbnail_max_px: u32,
}

impl Classifier {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            preview_chars: config.preview_chars.max(1),
            thumbnail_max_px: config.thumbnail_max_px.max(1),
        }
    }

    /// Produce the candidate item for a snapshot, if anything is recognizable
    pub fn classify(&self, snapshot: &PasteboardSnapshot) -> Option<Item> {
        let item = self
            .from_file_reference(snapshot)
            .or_else(|| self.from_image_object(snapshot))
            .or_else(|| self.from_raw_image(snapshot))
            .or_else(|| self.from_rtf(snapshot))
            .or_else(|| self.from_html(snapshot))
            .or_else(|| self.from_text(snapshot));

        match &item {
            Some(item) => debug!(
                "Classified snapshot #{} as {} ({} formats)",
                snapshot.change_count,
                item.kind.as_str(),
                item.representations.len()
            ),
            None => trace!("Snapshot #{} has no recognizable content", snapshot.change_count),
        }

        item
    }

    fn from_file_reference(&self, snapshot: &PasteboardSnapshot) -> Option<Item> {
        for path in &snapshot.file_references {
            if !has_image_extension(path) {
                continue;
            }

            let bytes = match std::fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!("Cannot read referenced image {:?}: {}", path, e);
                    continue;
                }
            };

            let Some((image, format)) = decode_image(&bytes) else {
                continue;
            };

            let mut reps = Representations::new();
            let format_id = format.and_then(format_identifier);
            if let Some(id) = format_id {
                reps.insert(id.to_string(), bytes.clone());
            }
            if let Some(tiff) = &snapshot.image_object {
                reps.entry(formats::TIFF.to_string())
                    .or_insert_with(|| tiff.clone());
            }
            if let Some(url) = snapshot.get(formats::FILE_URL) {
                reps.insert(formats::FILE_URL.to_string(), url.to_vec());
            }

            let label = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            return self.image_item(&image, &bytes, format_id, reps, label.as_deref());
        }

        None
    }

    fn from_image_object(&self, snapshot: &PasteboardSnapshot) -> Option<Item> {
        let tiff = snapshot.image_object.as_ref()?;
        let (image, format) = decode_image(tiff)?;

        let mut reps = raw_image_representations(snapshot);
        reps.insert(formats::TIFF.to_string(), tiff.clone());

        // PNG published next to the object stays canonical, so a paste-back
        // of this item reads back the same content
        match snapshot.get(formats::PNG) {
            Some(png) if image::guess_format(png).ok() == Some(ImageFormat::Png) => {
                self.image_item(&image, png, Some(formats::PNG), reps, None)
            }
            _ => self.image_item(&image, tiff, format.and_then(format_identifier), reps, None),
        }
    }

    fn from_raw_image(&self, snapshot: &PasteboardSnapshot) -> Option<Item> {
        for &format_id in formats::IMAGE_FORMATS {
            let Some(bytes) = snapshot.get(format_id) else {
                continue;
            };
            let Some((image, _)) = decode_image(bytes) else {
                continue;
            };

            let reps = raw_image_representations(snapshot);
            return self.image_item(&image, bytes, Some(format_id), reps, None);
        }

        None
    }

    fn from_rtf(&self, snapshot: &PasteboardSnapshot) -> Option<Item> {
        let rtf = snapshot.get(formats::RTF)?;
        let Some(text) = rtf_to_text(rtf) else {
            debug!("Ignoring malformed RTF ({} bytes)", rtf.len());
            return None;
        };

        let preview = self.preview_or(&text, RICH_TEXT_PLACEHOLDER);
        let reps = collect_representations(snapshot, |format| {
            format == formats::RTF || format == formats::HTML || formats::is_text_format(format)
        });

        Some(Item::new(ItemKind::RichText, rtf.to_vec(), preview).with_representations(reps))
    }

    fn from_html(&self, snapshot: &PasteboardSnapshot) -> Option<Item> {
        let html = snapshot.get(formats::HTML)?;
        let Ok(source) = std::str::from_utf8(html) else {
            debug!("Ignoring non UTF-8 HTML ({} bytes)", html.len());
            return None;
        };

        let preview = self.preview_or(&html_to_text(source), HTML_PLACEHOLDER);
        let reps = collect_representations(snapshot, |format| {
            format == formats::HTML || formats::is_text_format(format)
        });

        Some(Item::new(ItemKind::RichText, html.to_vec(), preview).with_representations(reps))
    }

    fn from_text(&self, snapshot: &PasteboardSnapshot) -> Option<Item> {
        let bytes = snapshot.get(formats::TEXT)?;
        let text = std::str::from_utf8(bytes).ok()?;
        if text.trim().is_empty() {
            return None;
        }

        let reps = collect_representations(snapshot, formats::is_text_format);
        Some(
            Item::new(ItemKind::Text, bytes.to_vec(), truncate_preview(text, self.preview_chars))
                .with_representations(reps),
        )
    }

    /// Build an image item whose canonical content is PNG
    fn image_item(
        &self,
        image: &DynamicImage,
        original: &[u8],
        original_format: Option<&str>,
        mut reps: Representations,
        label: Option<&str>,
    ) -> Option<Item> {
        let png = if original_format == Some(formats::PNG) {
            original.to_vec()
        } else {
            encode_png(image)?
        };
        reps.entry(formats::PNG.to_string())
            .or_insert_with(|| png.clone());

        let (width, height) = image.dimensions();
        let preview = match label {
            Some(name) => format!("Image {} ({}x{})", name, width, height),
            None => format!("Image ({}x{})", width, height),
        };

        let mut item = Item::new(ItemKind::Image, png, truncate_preview(&preview, self.preview_chars))
            .with_representations(reps);
        if let Some(thumbnail) = self.thumbnail(image) {
            item = item.with_thumbnail(thumbnail);
        }
        Some(item)
    }

    fn thumbnail(&self, image: &DynamicImage) -> Option<Vec<u8>> {
        let max = self.thumbnail_max_px;
        let (width, height) = image.dimensions();
        if width <= max && height <= max {
            encode_png(image)
        } else {
            encode_png(&image.thumbnail(max, max))
        }
    }

    fn preview_or(&self, text: &str, placeholder: &str) -> String {
        let preview = truncate_preview(text, self.preview_chars);
        if preview.is_empty() {
            placeholder.to_string()
        } else {
            preview
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&CaptureConfig::default())
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn decode_image(bytes: &[u8]) -> Option<(DynamicImage, Option<ImageFormat>)> {
    let format = image::guess_format(bytes).ok();
    match image::load_from_memory(bytes) {
        Ok(image) => Some((image, format)),
        Err(e) => {
            debug!("Image decode failed ({} bytes): {}", bytes.len(), e);
            None
        }
    }
}

fn encode_png(image: &DynamicImage) -> Option<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    match image.write_to(&mut out, ImageFormat::Png) {
        Ok(()) => Some(out.into_inner()),
        Err(e) => {
            debug!("PNG encode failed: {}", e);
            None
        }
    }
}

/// Pasteboard identifier for a decoded image format
fn format_identifier(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some(formats::PNG),
        ImageFormat::Jpeg => Some(formats::JPEG),
        ImageFormat::Tiff => Some(formats::TIFF),
        ImageFormat::Gif => Some(formats::GIF),
        _ => None,
    }
}

fn raw_image_representations(snapshot: &PasteboardSnapshot) -> Representations {
    collect_representations(snapshot, formats::is_image_format)
}

fn collect_representations(
    snapshot: &PasteboardSnapshot,
    wanted: impl Fn(&str) -> bool,
) -> Representations {
    snapshot
        .data
        .iter()
        .filter(|(format, _)| wanted(format))
        .map(|(format, bytes)| (format.clone(), bytes.clone()))
        .collect()
}

/// Extract the visible text of an HTML fragment
pub fn html_to_text(html: &str) -> String {
    let visible = HTML_HIDDEN.replace_all(html, " ");
    let spaced = HTML_BLOCK_TAG.replace_all(&visible, " ");
    let stripped = HTML_TAG.replace_all(&spaced, "");
    let decoded = HTML_ENTITY.replace_all(&stripped, |caps: &Captures| decode_entity(caps));
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entity(caps: &Captures) -> String {
    let name = &caps[1];
    let decoded = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
    } else if let Some(dec) = name.strip_prefix('#') {
        dec.parse::<u32>().ok().and_then(char::from_u32)
    } else {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            "mdash" => Some('\u{2014}'),
            "ndash" => Some('\u{2013}'),
            "hellip" => Some('\u{2026}'),
            _ => None,
        }
    };

    decoded
        .map(String::from)
        .unwrap_or_else(|| caps[0].to_string())
}

/// Extract plain text from an RTF document.
///
/// Returns `None` when the bytes are not RTF (missing `{\rtf` header or
/// unbalanced groups). Font tables, color tables, pictures and other
/// destinations are dropped.
pub fn rtf_to_text(rtf: &[u8]) -> Option<String> {
    if !rtf.starts_with(b"{\\rtf") {
        return None;
    }

    // One fallback character per \u unless \ucN says otherwise
    let mut reader = RtfReader {
        unicode_skip: 1,
        ..RtfReader::default()
    };
    let mut i = 0;

    while i < rtf.len() {
        match rtf[i] {
            b'{' => {
                reader.groups.push((reader.skip, reader.unicode_skip));
                i += 1;
                if rtf[i..].starts_with(b"\\*") {
                    reader.skip = true;
                    i += 2;
                }
            }
            b'}' => {
                let (skip, unicode_skip) = reader.groups.pop()?;
                reader.skip = skip;
                reader.unicode_skip = unicode_skip;
                i += 1;
            }
            b'\\' => i = reader.control(rtf, i),
            b'\r' | b'\n' => i += 1,
            byte => {
                reader.emit(latin1(byte));
                i += 1;
            }
        }
    }

    if !reader.groups.is_empty() {
        return None;
    }

    Some(reader.out.trim().to_string())
}

#[derive(Default)]
struct RtfReader {
    out: String,
    /// Saved (skip, unicode_skip) per open group
    groups: Vec<(bool, usize)>,
    /// Inside an ignored destination
    skip: bool,
    /// Fallback characters to drop after `\u` (set by `\uc`)
    unicode_skip: usize,
    pending_fallback: usize,
}

impl RtfReader {
    fn emit(&mut self, ch: char) {
        if self.skip {
            return;
        }
        if self.pending_fallback > 0 {
            self.pending_fallback -= 1;
            return;
        }
        self.out.push(ch);
    }

    fn emit_unicode(&mut self, ch: char) {
        if !self.skip {
            self.out.push(ch);
        }
        self.pending_fallback = self.unicode_skip;
    }

    /// Handle a control sequence starting at `start` (a backslash); returns the next index
    fn control(&mut self, rtf: &[u8], start: usize) -> usize {
        let Some(&next) = rtf.get(start + 1) else {
            return rtf.len();
        };

        match next {
            b'\\' | b'{' | b'}' => {
                self.emit(next as char);
                start + 2
            }
            b'\'' => {
                let hex = rtf.get(start + 2..start + 4);
                let byte = hex
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = byte {
                    self.emit(latin1(byte));
                }
                (start + 4).min(rtf.len())
            }
            b'\r' | b'\n' => {
                self.emit('\n');
                start + 2
            }
            b'~' => {
                self.emit(' ');
                start + 2
            }
            b'_' => {
                self.emit('-');
                start + 2
            }
            letter if letter.is_ascii_alphabetic() => self.control_word(rtf, start + 1),
            _ => start + 2,
        }
    }

    fn control_word(&mut self, rtf: &[u8], start: usize) -> usize {
        let mut i = start;
        while i < rtf.len() && rtf[i].is_ascii_alphabetic() {
            i += 1;
        }
        let word = std::str::from_utf8(&rtf[start..i]).unwrap_or_default();

        let param_start = i;
        if i < rtf.len() && rtf[i] == b'-' {
            i += 1;
        }
        while i < rtf.len() && rtf[i].is_ascii_digit() {
            i += 1;
        }
        let param = std::str::from_utf8(&rtf[param_start..i])
            .ok()
            .and_then(|p| p.parse::<i32>().ok());

        // A single space delimits the control word and is not text
        if i < rtf.len() && rtf[i] == b' ' {
            i += 1;
        }

        match word {
            "par" | "line" | "sect" | "page" => self.emit('\n'),
            "tab" => self.emit('\t'),
            "emdash" => self.emit('\u{2014}'),
            "endash" => self.emit('\u{2013}'),
            "bullet" => self.emit('\u{2022}'),
            "lquote" => self.emit('\u{2018}'),
            "rquote" => self.emit('\u{2019}'),
            "ldblquote" => self.emit('\u{201C}'),
            "rdblquote" => self.emit('\u{201D}'),
            "uc" => self.unicode_skip = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(code) = param {
                    // Values above 32767 are written as negative 16-bit integers
                    let code = if code < 0 { code + 65_536 } else { code };
                    if let Some(ch) = char::from_u32(code as u32) {
                        self.emit_unicode(ch);
                    }
                }
            }
            "fonttbl" | "colortbl" | "expandedcolortbl" | "stylesheet" | "info" | "pict"
            | "header" | "footer" | "listtable" | "listoverridetable" | "generator" => {
                self.skip = true
            }
            _ => {}
        }

        i
    }
}

fn latin1(byte: u8) -> char {
    byte as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut out, format)
            .unwrap();
        out.into_inner()
    }

    fn test_image(width: u32, height: u32) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 7) as u8, (y * 13) as u8, 128]);
        }
        img
    }

    fn png_bytes() -> Vec<u8> {
        encode(&test_image(4, 3), ImageFormat::Png)
    }

    fn classify(snapshot: &PasteboardSnapshot) -> Option<Item> {
        Classifier::default().classify(snapshot)
    }

    #[test]
    fn test_plain_text() {
        let snapshot = PasteboardSnapshot::default()
            .with_data(formats::TEXT, "hello world")
            .with_data("public.utf16-plain-text", vec![104, 0, 105, 0]);

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::Text);
        assert_eq!(item.content, b"hello world");
        assert_eq!(item.preview, "hello world");
        assert!(item.representations.contains_key(formats::TEXT));
        assert!(item.representations.contains_key("public.utf16-plain-text"));
        assert!(item.thumbnail.is_none());
    }

    #[test]
    fn test_whitespace_only_text_is_skipped() {
        let snapshot = PasteboardSnapshot::default().with_data(formats::TEXT, "  \n\t ");
        assert!(classify(&snapshot).is_none());
    }

    #[test]
    fn test_empty_snapshot_yields_nothing() {
        assert!(classify(&PasteboardSnapshot::default()).is_none());
    }

    #[test]
    fn test_unknown_formats_only_yield_nothing() {
        let snapshot = PasteboardSnapshot::default().with_data("com.example.custom", "x");
        assert!(classify(&snapshot).is_none());
    }

    #[test]
    fn test_preview_is_bounded() {
        let long = "x".repeat(500);
        let snapshot = PasteboardSnapshot::default().with_data(formats::TEXT, long.as_str());
        let item = classify(&snapshot).unwrap();
        assert_eq!(item.preview.chars().count(), 100);
        assert_eq!(item.content.len(), 500);
    }

    #[test]
    fn test_html_capture() {
        let html = "<html><head><style>p{}</style></head><body><p>Hello &amp; <b>bye</b></p></body></html>";
        let snapshot = PasteboardSnapshot::default()
            .with_data(formats::HTML, html)
            .with_data(formats::TEXT, "Hello & bye");

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::RichText);
        assert_eq!(item.content, html.as_bytes());
        assert_eq!(item.preview, "Hello & bye");
        assert!(item.representations.contains_key(formats::HTML));
        assert!(item.representations.contains_key(formats::TEXT));
    }

    #[test]
    fn test_invalid_html_falls_through_to_text() {
        let snapshot = PasteboardSnapshot::default()
            .with_data(formats::HTML, vec![0xff, 0xfe, 0x00])
            .with_data(formats::TEXT, "fallback");

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::Text);
        assert_eq!(item.content, b"fallback");
    }

    #[test]
    fn test_rtf_wins_over_html() {
        let rtf = r"{\rtf1\ansi{\fonttbl\f0\fswiss Helvetica;}\f0\pard Bold \b text\b0\par}";
        let snapshot = PasteboardSnapshot::default()
            .with_data(formats::RTF, rtf)
            .with_data(formats::HTML, "<b>text</b>")
            .with_data(formats::TEXT, "Bold text");

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::RichText);
        assert_eq!(item.content, rtf.as_bytes());
        assert_eq!(item.preview, "Bold text");
        assert_eq!(item.representations.len(), 3);
    }

    #[test]
    fn test_malformed_rtf_falls_through() {
        let snapshot = PasteboardSnapshot::default()
            .with_data(formats::RTF, "not rtf at all")
            .with_data(formats::TEXT, "plain");

        assert_eq!(classify(&snapshot).unwrap().kind, ItemKind::Text);
    }

    #[test]
    fn test_empty_rtf_uses_placeholder() {
        let snapshot = PasteboardSnapshot::default().with_data(formats::RTF, r"{\rtf1\ansi }");
        let item = classify(&snapshot).unwrap();
        assert_eq!(item.preview, RICH_TEXT_PLACEHOLDER);
    }

    #[test]
    fn test_raw_png_wins_over_text() {
        let png = png_bytes();
        let snapshot = PasteboardSnapshot::default()
            .with_data(formats::PNG, png.clone())
            .with_data(formats::TEXT, "caption");

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::Image);
        assert_eq!(item.content, png);
        assert_eq!(item.preview, "Image (4x3)");
        assert!(item.thumbnail.is_some());
        assert!(!item.representations.contains_key(formats::TEXT));
    }

    #[test]
    fn test_jpeg_is_transcoded_to_png_content() {
        let jpeg = encode(&test_image(8, 8), ImageFormat::Jpeg);
        let snapshot = PasteboardSnapshot::default().with_data(formats::JPEG, jpeg.clone());

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::Image);
        assert_eq!(image::guess_format(&item.content).unwrap(), ImageFormat::Png);
        assert_eq!(item.representations.get(formats::JPEG), Some(&jpeg));
        assert!(item.representations.contains_key(formats::PNG));
    }

    #[test]
    fn test_corrupt_image_falls_through_to_text() {
        let snapshot = PasteboardSnapshot::default()
            .with_data(formats::PNG, b"\x89PNG garbage".to_vec())
            .with_data(formats::TEXT, "still here");

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::Text);
    }

    #[test]
    fn test_image_object() {
        let tiff = encode(&test_image(6, 2), ImageFormat::Tiff);
        let snapshot = PasteboardSnapshot::default().with_image_object(tiff.clone());

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::Image);
        assert_eq!(item.representations.get(formats::TIFF), Some(&tiff));
        assert!(item.representations.contains_key(formats::PNG));
        assert_eq!(item.preview, "Image (6x2)");
    }

    #[test]
    fn test_image_object_keeps_published_png() {
        let img = test_image(5, 5);
        let png = encode(&img, ImageFormat::Png);
        let tiff = encode(&img, ImageFormat::Tiff);
        let snapshot = PasteboardSnapshot::default()
            .with_image_object(tiff)
            .with_data(formats::PNG, png.clone());

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.content, png);
        assert!(item.representations.contains_key(formats::TIFF));
    }

    #[test]
    fn test_file_reference_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let png = png_bytes();
        std::fs::write(&path, &png).unwrap();

        let url = url::Url::from_file_path(&path).unwrap();
        let snapshot = PasteboardSnapshot::default()
            .with_file_reference(&path)
            .with_data(formats::FILE_URL, url.as_str())
            .with_data(formats::TEXT, "shot.png");

        let item = classify(&snapshot).unwrap();
        assert_eq!(item.kind, ItemKind::Image);
        assert_eq!(item.content, png);
        assert_eq!(item.preview, "Image shot.png (4x3)");
        assert_eq!(
            item.representations.get(formats::FILE_URL).map(Vec::as_slice),
            Some(url.as_str().as_bytes())
        );
    }

    #[test]
    fn test_non_image_file_reference_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "notes").unwrap();

        let snapshot = PasteboardSnapshot::default()
            .with_file_reference(&path)
            .with_data(formats::TEXT, "notes.txt");

        assert_eq!(classify(&snapshot).unwrap().kind, ItemKind::Text);
    }

    #[test]
    fn test_missing_image_file_is_skipped() {
        let snapshot = PasteboardSnapshot::default()
            .with_file_reference("/nonexistent/pastequick/missing.png")
            .with_data(formats::TEXT, "missing.png");

        assert_eq!(classify(&snapshot).unwrap().kind, ItemKind::Text);
    }

    #[test]
    fn test_thumbnail_fits_bounds() {
        let config = CaptureConfig {
            preview_chars: 100,
            thumbnail_max_px: 16,
        };
        let png = encode(&test_image(64, 32), ImageFormat::Png);
        let snapshot = PasteboardSnapshot::default().with_data(formats::PNG, png);

        let item = Classifier::new(&config).classify(&snapshot).unwrap();
        let thumbnail = image::load_from_memory(item.thumbnail.as_ref().unwrap()).unwrap();
        assert!(thumbnail.width() <= 16);
        assert!(thumbnail.height() <= 16);
    }

    #[test]
    fn test_rtf_to_text_basics() {
        let rtf = br"{\rtf1\ansi\ansicpg1252{\fonttbl\f0 Times;}{\colortbl;\red0\green0\blue0;}\f0 Line one\par Line two\tab end}";
        assert_eq!(rtf_to_text(rtf).unwrap(), "Line one\nLine two\tend");
    }

    #[test]
    fn test_rtf_to_text_escapes() {
        let rtf = br"{\rtf1 caf\'e9 \{braces\} back\\slash \u8364? euro}";
        assert_eq!(rtf_to_text(rtf).unwrap(), "caf\u{e9} {braces} back\\slash \u{20ac} euro");
    }

    #[test]
    fn test_rtf_to_text_uc0_keeps_following_text() {
        let rtf = br"{\rtf1\ansi\uc0\u8220 Hello\uc0\u8221 }";
        assert_eq!(rtf_to_text(rtf).unwrap(), "\u{201C}Hello\u{201D}");

        // \uc scope ends with its group
        let rtf = br"{\rtf1 {\uc0\u8220 a}\u8221?b}";
        assert_eq!(rtf_to_text(rtf).unwrap(), "\u{201C}a\u{201D}b");
    }

    #[test]
    fn test_rtf_to_text_skips_starred_destinations() {
        let rtf = br"{\rtf1{\*\expandedcolortbl;;}visible}";
        assert_eq!(rtf_to_text(rtf).unwrap(), "visible");
    }

    #[test]
    fn test_rtf_to_text_rejects_unbalanced() {
        assert!(rtf_to_text(br"{\rtf1 open {group").is_none());
        assert!(rtf_to_text(br"{\rtf1 x}}").is_none());
        assert!(rtf_to_text(b"plain").is_none());
    }

    #[test]
    fn test_html_to_text_entities() {
        assert_eq!(html_to_text("a&lt;b&gt; &#65;&#x42; &unknown;"), "a<b> AB &unknown;");
        assert_eq!(html_to_text("<p>one</p><p>two</p>"), "one two");
        assert_eq!(html_to_text("<script>alert(1)</script>shown"), "shown");
    }
}
