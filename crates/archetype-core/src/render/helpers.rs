//! Template helpers available to every archetype file.
//!
//! On top of the Handlebars built-ins (`if`, `each`, `eq`, `len`, ...) and
//! the `string_helpers` case conversions, [`register`] installs:
//!
//! | Helper                           | Result                                   |
//! |----------------------------------|------------------------------------------|
//! | `upper` `lower` `trim`           | string transforms                        |
//! | `replace s from to`              | every `from` replaced by `to`            |
//! | `default value fallback`         | `fallback` when `value` is null or empty |
//! | `join list sep`                  | list items joined by `sep`               |
//! | `json value [pretty=true]`       | the value serialized as JSON             |
//! | `api_call url`                   | `{url, statusCode, statusText, headers, payload}` |
//! | `red` ... `white`, `hiRed` ...   | ANSI-coloured text                       |
//! | `is_file` `is_dir`               | `true` / `false`, `false` when missing   |
//! | `file_size` `dir_size`           | size in bytes                            |
//! | `list_dir path`                  | every file under `path`, sorted          |
//! | `include path [context] [pad]`   | another file rendered, lines padded      |
//! | `dump args...`                   | writes the arguments to stderr           |
//!
//! Filesystem paths are resolved against the process working directory.

use std::path::Path;

use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperDef, RenderContext, RenderError,
    RenderErrorReason, ScopedJson,
};
use serde_json::{json, Map, Value};
use walkdir::WalkDir;

use super::renderer::normalize_paths;
use crate::error::ArchetypeError;
use crate::style::{self, Colour};
use crate::value::ParamType;

handlebars_helper!(upper: |s: str| s.to_uppercase());
handlebars_helper!(lower: |s: str| s.to_lowercase());
handlebars_helper!(trim: |s: str| s.trim());
handlebars_helper!(replace: |s: str, from: str, to: str| s.replace(from, to));
handlebars_helper!(default_or: |value: Json, fallback: Json| {
    if is_blank(value) { fallback.clone() } else { value.clone() }
});
handlebars_helper!(join: |items: array, separator: str| {
    items.iter().map(display).collect::<Vec<_>>().join(separator)
});
handlebars_helper!(to_json: |value: Json, {pretty: bool = false}| {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    encoded.unwrap_or_default()
});

/// Install every archetype helper on `hbs`.
pub fn register(hbs: &mut Handlebars<'static>) {
    hbs.register_helper("upper", Box::new(upper));
    hbs.register_helper("lower", Box::new(lower));
    hbs.register_helper("trim", Box::new(trim));
    hbs.register_helper("replace", Box::new(replace));
    hbs.register_helper("default", Box::new(default_or));
    hbs.register_helper("join", Box::new(join));
    hbs.register_helper("json", Box::new(to_json));

    hbs.register_helper("api_call", Box::new(ValueHelper(api_call)));

    for colour in Colour::ALL {
        hbs.register_helper(
            colour.name(),
            Box::new(ColourHelper {
                colour,
                bright: false,
            }),
        );
        hbs.register_helper(
            &bright_name(colour),
            Box::new(ColourHelper {
                colour,
                bright: true,
            }),
        );
    }

    hbs.register_helper("is_file", Box::new(ValueHelper(is_file)));
    hbs.register_helper("is_dir", Box::new(ValueHelper(is_dir)));
    hbs.register_helper("file_size", Box::new(ValueHelper(file_size)));
    hbs.register_helper("dir_size", Box::new(ValueHelper(dir_size)));
    hbs.register_helper("list_dir", Box::new(ValueHelper(list_dir)));

    hbs.register_helper("include", Box::new(IncludeHelper));
    hbs.register_helper("dump", Box::new(ValueHelper(dump)));
}

/// `red` becomes `hiRed`.
fn bright_name(colour: Colour) -> String {
    let name = colour.name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => format!("hi{}{}", first.to_ascii_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Render a value the way it appears in template output.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn helper_error(helper: &str, message: impl std::fmt::Display) -> RenderError {
    let err = ArchetypeError::Helper {
        helper: helper.to_string(),
        message: message.to_string(),
    };
    RenderErrorReason::Other(err.to_string()).into()
}

fn str_param<'a>(h: &'a Helper<'_>, helper: &str, index: usize) -> Result<&'a str, RenderError> {
    h.param(index)
        .and_then(|p| p.value().as_str())
        .ok_or_else(|| helper_error(helper, format!("argument {index} must be a string")))
}

/// A helper computing one JSON value from its arguments.
struct ValueHelper(fn(&Helper<'_>) -> Result<Value, RenderError>);

impl HelperDef for ValueHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        (self.0)(h).map(ScopedJson::Derived)
    }
}

struct ColourHelper {
    colour: Colour,
    bright: bool,
}

impl HelperDef for ColourHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let text = h
            .params()
            .iter()
            .map(|p| display(p.value()))
            .collect::<Vec<_>>()
            .join(" ");
        let painted = if self.bright {
            style::paint_bright(self.colour, &text)
        } else {
            style::paint(self.colour, &text)
        };
        Ok(ScopedJson::Derived(Value::String(painted)))
    }
}

fn api_call(h: &Helper<'_>) -> Result<Value, RenderError> {
    let url = str_param(h, "api_call", 0)?;
    tracing::debug!(url, "calling remote API");

    let response = reqwest::blocking::get(url).map_err(|e| helper_error("api_call", e))?;
    let status = response.status();
    let headers: Map<String, Value> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), Value::String(value))
        })
        .collect();
    let body = response.text().map_err(|e| helper_error("api_call", e))?;

    Ok(json!({
        "url": url,
        "statusCode": status.as_u16(),
        "statusText": status.to_string(),
        "headers": headers,
        "payload": decode_payload(&body),
    }))
}

/// Structured (JSON or YAML) payloads are decoded, anything else stays text.
fn decode_payload(body: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        return value;
    }
    match serde_yaml::from_str::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
        _ => Value::String(body.to_string()),
    }
}

fn is_file(h: &Helper<'_>) -> Result<Value, RenderError> {
    let path = str_param(h, "is_file", 0)?;
    Ok(Value::Bool(Path::new(path).is_file()))
}

fn is_dir(h: &Helper<'_>) -> Result<Value, RenderError> {
    let path = str_param(h, "is_dir", 0)?;
    Ok(Value::Bool(Path::new(path).is_dir()))
}

fn file_size(h: &Helper<'_>) -> Result<Value, RenderError> {
    let path = str_param(h, "file_size", 0)?;
    let metadata =
        std::fs::metadata(path).map_err(|e| helper_error("file_size", format!("{path}: {e}")))?;
    Ok(json!(metadata.len()))
}

fn dir_size(h: &Helper<'_>) -> Result<Value, RenderError> {
    let path = str_param(h, "dir_size", 0)?;
    let mut total = 0u64;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| helper_error("dir_size", e))?;
        if entry.file_type().is_file() {
            total += entry
                .metadata()
                .map_err(|e| helper_error("dir_size", e))?
                .len();
        }
    }
    Ok(json!(total))
}

fn list_dir(h: &Helper<'_>) -> Result<Value, RenderError> {
    let path = str_param(h, "list_dir", 0)?;
    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry.map_err(|e| helper_error("list_dir", e))?;
        if entry.file_type().is_file() {
            files.push(Value::String(entry.path().display().to_string()));
        }
    }
    Ok(Value::Array(files))
}

fn dump(h: &Helper<'_>) -> Result<Value, RenderError> {
    if h.params().is_empty() {
        eprintln!("<empty>");
        return Ok(Value::String(String::new()));
    }
    for (index, param) in h.params().iter().enumerate() {
        let value = param.value();
        let kind = ParamType::of(value).map_or("null", |t| t.as_str());
        let encoded = serde_json::to_string_pretty(value).unwrap_or_default();
        eprintln!("{index} => '{encoded}' ({kind})");
    }
    Ok(Value::String(String::new()))
}

/// `include path [context] [padding]`: render another file as a template.
///
/// Without an explicit context object the including file's context is used.
struct IncludeHelper;

impl HelperDef for IncludeHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let path = str_param(h, "include", 0)?;
        let second = h.param(1).map(|p| p.value());
        let third = h.param(2).map(|p| p.value());

        let (data, padding) = match (second, third) {
            (None, _) => (ctx.data(), ""),
            (Some(Value::String(padding)), None) => (ctx.data(), padding.as_str()),
            (Some(data @ Value::Object(_)), None) => (data, ""),
            (Some(data @ Value::Object(_)), Some(Value::String(padding))) => {
                (data, padding.as_str())
            }
            _ => {
                return Err(helper_error(
                    "include",
                    "usage: include <path> [context object] [padding string]",
                ))
            }
        };

        let template = std::fs::read_to_string(path)
            .map_err(|e| helper_error("include", format!("{path}: {e}")))?;
        let rendered = r
            .render_template(&normalize_paths(&template), data)
            .map_err(|e| helper_error("include", format!("{path}: {e}")))?;

        Ok(ScopedJson::Derived(Value::String(pad_lines(&rendered, padding))))
    }
}

/// Prefix every line of `text` with `padding`.
fn pad_lines(text: &str, padding: &str) -> String {
    if padding.is_empty() {
        return text.to_string();
    }
    text.lines().map(|line| format!("{padding}{line}\n")).collect()
}
