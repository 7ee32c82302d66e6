//! Delimiter escaping: neutralizing and restoring template actions.
//!
//! Archetype authors often need literal template syntax in generated files
//! (a Helm chart, a GitHub workflow, another template). Escaping rewrites
//! the *real* delimiters `{{ }}` into the inert *safe* form `{-{ }-}`;
//! unescaping swaps them back. Both are the same [`transform`] with the
//! pairs exchanged, and are mutual inverses on text that holds no
//! pre-existing occurrence of the target pair.
//!
//! ## Span matching
//!
//! Spans are found by a left-to-right scanner rather than a shortest-match
//! regex, so a span only closes when its open/close tokens balance:
//!
//! - nested openers increase depth: `{{ a {{ b }} c }}` is one span
//! - double-quoted literals on the same line are skipped: `{{ "}}" }}` is
//!   one span
//! - an opener that never balances is copied verbatim and scanning resumes
//!   right after it
//! - a triple-stash `{{{ x }}}` is one unit and maps to `{-{-{ x }-}-}`, so
//!   no bare `{{` survives escaping
//!
//! When a span is rewritten only its own outer tokens are replaced; the
//! inner text is kept byte for byte.

use std::collections::BTreeSet;

use crate::metadata::Metadata;
use crate::style::{self, Colour};

/// An open/close token pair, plus the tokens of its unescaped-output
/// (triple-stash) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterPair {
    pub open: &'static str,
    pub close: &'static str,
    /// Always starts with `open`.
    pub stash_open: &'static str,
    pub stash_close: &'static str,
}

/// Live template delimiters.
pub const REAL: DelimiterPair = DelimiterPair {
    open: "{{",
    close: "}}",
    stash_open: "{{{",
    stash_close: "}}}",
};

/// Neutralized stand-in for [`REAL`].
pub const SAFE: DelimiterPair = DelimiterPair {
    open: "{-{",
    close: "}-}",
    stash_open: "{-{-{",
    stash_close: "}-}-}",
};

/// Byte range of one matched span, tokens included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterSpan {
    pub start: usize,
    pub end: usize,
    /// Delimited by the stash tokens rather than the plain ones.
    pub stash: bool,
}

impl DelimiterSpan {
    /// The text between the span's tokens.
    pub fn inner<'a>(&self, text: &'a str, pair: &DelimiterPair) -> &'a str {
        let (open, close) = if self.stash {
            (pair.stash_open, pair.stash_close)
        } else {
            (pair.open, pair.close)
        };
        &text[self.start + open.len()..self.end - close.len()]
    }
}

/// Which way a file is being transformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Real to safe.
    Escape,
    /// Safe to real.
    Unescape,
}

impl Direction {
    /// `(from, to)` delimiter pairs for this direction.
    pub fn pairs(&self) -> (DelimiterPair, DelimiterPair) {
        match self {
            Self::Escape => (REAL, SAFE),
            Self::Unescape => (SAFE, REAL),
        }
    }
}

/// Result of a [`transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub text: String,
    /// Spans found in the input.
    pub spans: usize,
    /// Spans whose delimiters were actually swapped.
    pub rewritten: usize,
}

/// Find every balanced span of `pair` in `text`, left to right.
pub fn find_spans(text: &str, pair: &DelimiterPair) -> Vec<DelimiterSpan> {
    let bytes = text.as_bytes();
    let open = pair.open.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 0;

    while let Some(rel) = find_bytes(&bytes[pos..], open) {
        let start = pos + rel;
        let stash = if bytes[start..].starts_with(pair.stash_open.as_bytes()) {
            stash_end(bytes, start, pair).map(|end| DelimiterSpan {
                start,
                end,
                stash: true,
            })
        } else {
            None
        };
        let span = stash.or_else(|| {
            span_end(bytes, start, pair).map(|end| DelimiterSpan {
                start,
                end,
                stash: false,
            })
        });
        match span {
            Some(span) => {
                spans.push(span);
                pos = span.end;
            }
            None => pos = start + open.len(),
        }
    }
    spans
}

/// End offset (exclusive) of the stash span opening at `start`: the first
/// stash close outside a string literal.
fn stash_end(bytes: &[u8], start: usize, pair: &DelimiterPair) -> Option<usize> {
    let close = pair.stash_close.as_bytes();
    let mut i = start + pair.stash_open.len();
    while i < bytes.len() {
        if bytes[i..].starts_with(close) {
            return Some(i + close.len());
        }
        i = if bytes[i] == b'"' {
            closing_quote(bytes, i).map_or(i + 1, |q| q + 1)
        } else {
            i + 1
        };
    }
    None
}

/// End offset (exclusive) of the span opening at `start`, if it balances.
fn span_end(bytes: &[u8], start: usize, pair: &DelimiterPair) -> Option<usize> {
    let open = pair.open.as_bytes();
    let close = pair.close.as_bytes();
    let mut depth = 0usize;
    let mut i = start;

    while i < bytes.len() {
        let rest = &bytes[i..];
        if rest.starts_with(open) {
            depth += 1;
            i += open.len();
        } else if rest.starts_with(close) {
            depth -= 1;
            i += close.len();
            if depth == 0 {
                return Some(i);
            }
        } else if bytes[i] == b'"' {
            i = closing_quote(bytes, i).map_or(i + 1, |q| q + 1);
        } else {
            i += 1;
        }
    }
    None
}

/// Index of the quote closing the literal that opens at `start`, looking no
/// further than the end of the line.
fn closing_quote(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Walk `text`, copying everything outside spans and replacing each span
/// with whatever `process(text, span)` returns.
pub fn process_spans<F>(text: &str, pair: &DelimiterPair, mut process: F) -> (String, usize)
where
    F: FnMut(&str, &DelimiterSpan) -> String,
{
    let spans = find_spans(text, pair);
    if spans.is_empty() {
        return (text.to_string(), 0);
    }
    tracing::trace!(matches = spans.len(), "found template actions");

    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    for span in &spans {
        output.push_str(&text[last..span.start]);
        output.push_str(&process(text, span));
        last = span.end;
    }
    output.push_str(&text[last..]);
    (output, spans.len())
}

/// Swap `from` delimiters for `to` on every span whose inner text `accept`s.
pub fn transform<F>(text: &str, from: &DelimiterPair, to: &DelimiterPair, accept: F) -> Transformed
where
    F: Fn(&str) -> bool,
{
    let mut rewritten = 0;
    let (text, spans) = process_spans(text, from, |text, span| {
        let inner = span.inner(text, from);
        if !accept(inner) {
            return text[span.start..span.end].to_string();
        }
        rewritten += 1;
        if span.stash {
            format!("{}{}{}", to.stash_open, inner, to.stash_close)
        } else {
            format!("{}{}{}", to.open, inner, to.close)
        }
    });
    Transformed {
        text,
        spans,
        rewritten,
    }
}

/// Accept every span.
pub fn accept_all(_: &str) -> bool {
    true
}

/// Neutralize every template action in `text`.
pub fn escape(text: &str) -> String {
    transform(text, &REAL, &SAFE, accept_all).text
}

/// Restore every neutralized template action in `text`.
pub fn unescape(text: &str) -> String {
    transform(text, &SAFE, &REAL, accept_all).text
}

/// Paint every span of `pair` magenta, leaving the text otherwise intact.
pub fn highlight(text: &str, pair: &DelimiterPair) -> String {
    process_spans(text, pair, |text, span| {
        style::paint(Colour::Magenta, &text[span.start..span.end])
    })
    .0
}

/// Escape predicate that keeps the archetype's own placeholders live.
///
/// A span whose inner text references a declared parameter is rejected, so
/// it stays evaluable; every other span is neutralized.
pub fn protect_parameters(metadata: &Metadata) -> impl Fn(&str) -> bool {
    let names: BTreeSet<String> = metadata.parameters.keys().cloned().collect();
    move |inner: &str| !references_any(inner, &names)
}

/// Whether `inner` mentions any of `names` as an identifier outside string
/// literals (`Name`, `.Name`, `this.Name`, `@root.Name`, `../Name`).
fn references_any(inner: &str, names: &BTreeSet<String>) -> bool {
    let mut in_literal = false;
    let mut escaped = false;
    let mut code = String::with_capacity(inner.len());
    for c in inner.chars() {
        if in_literal {
            match (escaped, c) {
                (true, _) => escaped = false,
                (false, '\\') => escaped = true,
                (false, '"') => in_literal = false,
                _ => {}
            }
            code.push(' ');
        } else if c == '"' {
            in_literal = true;
            code.push(' ');
        } else {
            code.push(c);
        }
    }

    code.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|token| !token.is_empty() && names.contains(token))
}
