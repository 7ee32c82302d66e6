//! Media type sniffing from leading content bytes.
//!
//! A compact rendition of the WHATWG MIME sniffing table: markup is matched
//! after skipping leading whitespace, every other signature is anchored at
//! offset zero. Content that matches no signature is reported as
//! `text/plain` when it contains no binary control bytes and as
//! `application/octet-stream` otherwise.

/// Media type reported when nothing recognizable was found.
pub const OCTET_STREAM: &str = "application/octet-stream";

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// HTML tags that identify markup when followed by a space or `>`.
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Exact signatures anchored at offset zero.
const PREFIXES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\xFE\xFF", "text/plain; charset=utf-16be"),
    (b"\xFF\xFE", "text/plain; charset=utf-16le"),
    (b"\xEF\xBB\xBF", "text/plain; charset=utf-8"),
    (b"\x00\x00\x01\x00", "image/x-icon"),
    (b"\x00\x00\x02\x00", "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (b"OTTO", "font/otf"),
    (b"ttcf", "font/collection"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (b"ID3", "audio/mpeg"),
    (b"\x1A\x45\xDF\xA3", "video/webm"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"7z\xBC\xAF\x27\x1C", "application/x-7z-compressed"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x00\x61\x73\x6D", "application/wasm"),
    (b"\x7FELF", "application/x-executable"),
];

/// RIFF containers, identified by the four-byte form type at offset 8.
const RIFF_FORMS: &[(&[u8], &str)] = &[
    (b"WEBP", "image/webp"),
    (b"WAVE", "audio/wave"),
    (b"AVI ", "video/avi"),
];

/// Detect the media type of `data` from its leading bytes.
pub fn media_type(data: &[u8]) -> &'static str {
    let trimmed = skip_whitespace(data);

    if let Some(mime) = sniff_markup(trimmed) {
        return mime;
    }

    if let Some(mime) = sniff_structured(trimmed) {
        return mime;
    }

    for (signature, mime) in PREFIXES {
        if data.starts_with(signature) {
            return *mime;
        }
    }

    if data.len() >= 12 && &data[0..4] == b"RIFF" {
        for (form, mime) in RIFF_FORMS {
            if &data[8..12] == *form {
                return *mime;
            }
        }
    }

    if is_mp4(data) {
        return "video/mp4";
    }

    if data.iter().any(|b| is_binary_byte(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| !matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }
    for tag in HTML_TAGS {
        if data.len() <= tag.len() || !data[..tag.len()].eq_ignore_ascii_case(tag) {
            continue;
        }
        // The tag must be terminated, so `<Body` matches but `<Bogus` does not.
        if matches!(data[tag.len()], b' ' | b'>') {
            return Some("text/html; charset=utf-8");
        }
    }
    None
}

/// Structured text formats with an `application/*` or `image/*` type.
fn sniff_structured(data: &[u8]) -> Option<&'static str> {
    if data.len() > 4 && data[..4].eq_ignore_ascii_case(b"<svg") && matches!(data[4], b' ' | b'>') {
        return Some("image/svg+xml");
    }
    if data.starts_with(b"%YAML") || data.starts_with(b"---\n") || data.starts_with(b"---\r\n") {
        return Some("application/x-yaml");
    }
    if data.starts_with(b"#!") {
        let line = data.split(|&b| b == b'\n').next().unwrap_or_default();
        if line.windows(4).any(|w| w == b"node") {
            return Some("application/javascript");
        }
    }
    if matches!(data.first(), Some(b'{' | b'[')) && !data.iter().any(|b| is_binary_byte(*b)) {
        return Some("application/json");
    }
    None
}

fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size < 12 || box_size % 4 != 0 || data.len() < box_size {
        return false;
    }
    if &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|&i| i != 12 && i + 3 <= data.len())
        .any(|i| &data[i..i + 3] == b"mp4")
}

/// Control bytes that never appear in text.
fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
