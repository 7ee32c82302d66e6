//! Text/binary classification of file contents.
//!
//! Binary files are byte-copied, text files go through the template engine
//! or the delimiter escaper. Only the first [`SNIFF_LEN`] bytes are looked
//! at. The checks run in priority order:
//!
//! 1. UTF-16 byte-order marks (before the NUL check: UTF-16 is NUL-dense)
//! 2. UTF-8 byte-order mark
//! 3. any NUL byte means binary
//! 4. sniffed media type `text/*`
//! 5. whitelisted structured-text media types (JSON, XML, SVG, YAML, JS)
//! 6. unrecognized content that passed the NUL check is text
//! 7. anything else recognized (images, archives, ...) is binary

pub mod sniff;

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ArchetypeError, Result};

/// Number of leading bytes inspected.
pub const SNIFF_LEN: usize = 512;

/// Application media types that still carry text.
const TEXT_MEDIA_TYPES: &[&str] = &[
    "application/json",
    "application/xml",
    "application/javascript",
    "application/x-javascript",
    "image/svg+xml",
    "application/x-yaml",
];

/// Outcome of classifying a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Binary,
}

impl ContentKind {
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }
}

/// Classify a buffer; only its first [`SNIFF_LEN`] bytes are considered.
pub fn classify(buffer: &[u8]) -> ContentKind {
    let head = &buffer[..buffer.len().min(SNIFF_LEN)];

    if head.is_empty() {
        return ContentKind::Text;
    }

    if head.starts_with(&[0xFF, 0xFE]) || head.starts_with(&[0xFE, 0xFF]) {
        return ContentKind::Text;
    }

    if head.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return ContentKind::Text;
    }

    if head.contains(&0) {
        return ContentKind::Binary;
    }

    let media_type = sniff::media_type(head);
    if media_type.starts_with("text/") {
        return ContentKind::Text;
    }

    if TEXT_MEDIA_TYPES.iter().any(|t| media_type.starts_with(t)) {
        return ContentKind::Text;
    }

    if media_type == sniff::OCTET_STREAM {
        return ContentKind::Text;
    }

    tracing::trace!(media_type, "classified as binary");
    ContentKind::Binary
}

/// Classify a file on disk by reading at most [`SNIFF_LEN`] bytes.
pub fn classify_file(path: &Path) -> Result<ContentKind> {
    let classification_error = |source| ArchetypeError::Classification {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(classification_error)?;
    let mut buffer = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64)
        .read_to_end(&mut buffer)
        .map_err(classification_error)?;

    if buffer.is_empty() {
        tracing::warn!(path = %path.display(), "empty file");
    }
    Ok(classify(&buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf16_le_bom_is_text() {
        assert_eq!(classify(&[0xFF, 0xFE, 0x41, 0x00]), ContentKind::Text);
    }

    #[test]
    fn test_utf16_be_bom_is_text() {
        assert_eq!(classify(&[0xFE, 0xFF, 0x00, 0x41]), ContentKind::Text);
    }

    #[test]
    fn test_utf8_bom_is_text() {
        assert_eq!(classify(b"\xEF\xBB\xBFhello"), ContentKind::Text);
    }

    #[test]
    fn test_nul_is_binary() {
        assert_eq!(classify(&[0x00, 0x01, 0x02]), ContentKind::Binary);
    }

    #[test]
    fn test_empty_is_text() {
        assert_eq!(classify(&[]), ContentKind::Text);
    }

    #[test]
    fn test_source_code_is_text() {
        assert_eq!(
            classify(b"package main\n\nfunc main() {}\n"),
            ContentKind::Text
        );
        assert_eq!(classify(b"{\"key\": [1, 2, 3]}"), ContentKind::Text);
        assert_eq!(classify(b"<?xml version=\"1.0\"?>"), ContentKind::Text);
    }

    #[test]
    fn test_structured_media_types_are_text() {
        let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>";
        assert_eq!(sniff::media_type(svg), "image/svg+xml");
        assert_eq!(classify(svg), ContentKind::Text);
        assert_eq!(classify(b"#!/usr/bin/env node\n"), ContentKind::Text);
        assert_eq!(classify(b"---\nname: demo\n"), ContentKind::Text);
    }

    #[test]
    fn test_control_bytes_without_nul_are_text() {
        assert_eq!(classify(b"log line \x1b[31mred\x1b[0m"), ContentKind::Text);
    }

    #[test]
    fn test_recognized_images_are_binary() {
        assert_eq!(classify(b"GIF89a\x01\x01"), ContentKind::Binary);
        assert_eq!(classify(b"\xFF\xD8\xFF\xE0"), ContentKind::Binary);
        assert_eq!(classify(b"%PDF-1.7\n"), ContentKind::Binary);
    }

    #[test]
    fn test_only_head_is_inspected() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0);
        assert_eq!(classify(&data), ContentKind::Text);
    }

    #[test]
    fn test_classify_file() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("main.rs");
        let binary = dir.path().join("logo.png");
        let empty = dir.path().join("empty");
        std::fs::write(&text, "fn main() {}\n").unwrap();
        std::fs::write(&binary, b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00\x00\x0DIHDR").unwrap();
        std::fs::write(&empty, b"").unwrap();

        assert_eq!(classify_file(&text).unwrap(), ContentKind::Text);
        assert_eq!(classify_file(&binary).unwrap(), ContentKind::Binary);
        assert_eq!(classify_file(&empty).unwrap(), ContentKind::Text);
    }

    #[test]
    fn test_classify_missing_file() {
        let err = classify_file(Path::new("/nonexistent/archetype/file")).unwrap_err();
        assert!(matches!(err, ArchetypeError::Classification { .. }));
    }
}
