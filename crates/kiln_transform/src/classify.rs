//! Asset classification by extension and content sniffing.

use kiln_common::AssetKind;
use std::path::Path;

/// Detects the asset kind of a module.
///
/// The file extension decides when it is recognised; otherwise the leading
/// bytes are sniffed. Returns `None` for content Kiln cannot transform.
pub fn classify(path: &Path, bytes: &[u8]) -> Option<AssetKind> {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(AssetKind::from_extension)
        .or_else(|| sniff(bytes))
}

/// Binary image formats recognised by their magic numbers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ImageFormat {
    /// Portable Network Graphics.
    Png,
    /// JPEG/JFIF.
    Jpeg,
    /// GIF87a or GIF89a.
    Gif,
    /// RIFF WebP.
    WebP,
    /// Windows icon, as used for favicons.
    Ico,
}

impl ImageFormat {
    /// Detects a binary image format from its leading bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::WebP)
        } else if bytes.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
            Some(ImageFormat::Ico)
        } else {
            None
        }
    }

    /// Lowercase format name.
    pub fn name(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::WebP => "webp",
            ImageFormat::Ico => "ico",
        }
    }
}

/// Sniffs the asset kind from content alone.
pub fn sniff(bytes: &[u8]) -> Option<AssetKind> {
    if ImageFormat::detect(bytes).is_some() {
        return Some(AssetKind::Image);
    }
    const FONT_MAGIC: [&[u8]; 5] = [b"wOFF", b"wOF2", b"OTTO", b"true", &[0x00, 0x01, 0x00, 0x00]];
    if FONT_MAGIC.iter().any(|m| bytes.starts_with(m)) {
        return Some(AssetKind::Font);
    }

    let head = &bytes[..bytes.len().min(512)];
    let head = head.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(head);
    let start = head.iter().position(|b| !b.is_ascii_whitespace())?;
    let lower = head[start..].to_ascii_lowercase();
    if lower.starts_with(b"<svg") || (lower.starts_with(b"<?xml") && contains(&lower, b"<svg")) {
        Some(AssetKind::Image)
    } else if lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html") {
        Some(AssetKind::Markup)
    } else {
        None
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_wins() {
        assert_eq!(classify(Path::new("a/b.js"), b"\x89PNG\r\n\x1a\n"), Some(AssetKind::Script));
        assert_eq!(classify(Path::new("x.SCSS"), b""), Some(AssetKind::Style));
        assert_eq!(classify(Path::new("data/en.json"), b"{}"), Some(AssetKind::Data));
    }

    #[test]
    fn sniff_binary_formats() {
        assert_eq!(classify(Path::new("logo"), b"\x89PNG\r\n\x1a\n...."), Some(AssetKind::Image));
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(AssetKind::Image));
        assert_eq!(sniff(b"RIFF\0\0\0\0WEBPVP8 "), Some(AssetKind::Image));
        assert_eq!(sniff(&[0x00, 0x00, 0x01, 0x00, 0x01, 0x00]), Some(AssetKind::Image));
        assert_eq!(sniff(b"wOF2\0\x01"), Some(AssetKind::Font));
        assert_eq!(sniff(b"OTTO\0"), Some(AssetKind::Font));
    }

    #[test]
    fn sniff_text_formats() {
        assert_eq!(sniff(b"  <svg xmlns='x'></svg>"), Some(AssetKind::Image));
        assert_eq!(
            sniff(b"<?xml version=\"1.0\"?>\n<svg></svg>"),
            Some(AssetKind::Image)
        );
        assert_eq!(sniff(b"<!DOCTYPE html><html></html>"), Some(AssetKind::Markup));
        assert_eq!(sniff(b"\xEF\xBB\xBF<html>"), Some(AssetKind::Markup));
    }

    #[test]
    fn unknown_content() {
        assert_eq!(classify(Path::new("notes.txt"), b"hello"), None);
        assert_eq!(classify(Path::new("data"), b""), None);
        assert_eq!(classify(Path::new("x.yaml"), b"a: 1"), None);
    }

    #[test]
    fn image_format_detection() {
        assert_eq!(ImageFormat::detect(b"GIF89a...").map(ImageFormat::name), Some("gif"));
        assert_eq!(ImageFormat::detect(b"nope"), None);
    }
}
