//! Handlebars-based renderer for archetype file names and contents.
//!
//! Wraps the [`handlebars::Handlebars`] engine with **strict mode** enabled by default.
//! Strict mode ensures that any `{{variable}}` referenced in a template must be present
//! in the data context, otherwise rendering returns an error. Every declared parameter
//! is bound (possibly to `null`), so a strict failure always points at a typo or an
//! undeclared parameter in the archetype.
//!
//! HTML escaping is disabled: archetypes generate source code and configuration, not
//! markup.
//!
//! Go-style dot paths are accepted alongside Handlebars paths: `{{.Name}}`,
//! `{{ .Values.image }}` and `{{#each .Items}}` resolve like `{{Name}}`,
//! `{{ Values.image }}` and `{{#each Items}}`, and a bare `{{.}}` means
//! `{{this}}`. See [`normalize_paths`].
//!
//! ## Usage
//!
//! ```ignore
//! use archetype_core::render::TemplateRenderer;
//!
//! let renderer = TemplateRenderer::new();
//! let data = serde_json::json!({ "Name": "myapp" });
//! let name = renderer.render_name("{{.Name}}-config.yml", &data)?;
//! ```

use handlebars::Handlebars;
use serde_json::Value;

use super::helpers;
use crate::error::{ArchetypeError, Result};
use crate::escape::{self, REAL};

/// Template renderer shared read-only by every file of a run.
pub struct TemplateRenderer {
    hbs: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Create a new renderer with strict mode enabled.
    pub fn new() -> Self {
        Self::with_strict_mode(true)
    }

    /// Create a renderer, choosing whether missing variables are errors.
    pub fn with_strict_mode(strict: bool) -> Self {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(strict);
        hbs.register_escape_fn(handlebars::no_escape);
        helpers::register(&mut hbs);
        Self { hbs }
    }

    /// Render a template string with the given data context.
    pub fn render(&self, template: &str, data: &Value) -> std::result::Result<String, String> {
        self.hbs
            .render_template(&normalize_paths(template), data)
            .map_err(|e| e.to_string())
    }

    /// Render a snapshot-relative file name.
    pub fn render_name(&self, path: &str, data: &Value) -> Result<String> {
        self.render(path, data)
            .map_err(|message| ArchetypeError::FilenameTemplate {
                file: path.to_string(),
                message,
            })
    }

    /// Render the text contents of the file at `path`.
    pub fn render_content(&self, path: &str, text: &str, data: &Value) -> Result<String> {
        self.render(text, data)
            .map_err(|message| ArchetypeError::ContentTemplate {
                file: path.to_string(),
                message,
            })
    }
}

/// Rewrite Go-style dot paths inside every template action into Handlebars
/// paths. Text outside actions, string literals and `../` parent paths are
/// left alone.
pub fn normalize_paths(template: &str) -> String {
    escape::process_spans(template, &REAL, |text, span| {
        let inner = strip_leading_dots(span.inner(text, &REAL));
        if span.stash {
            format!("{}{inner}{}", REAL.stash_open, REAL.stash_close)
        } else {
            format!("{}{inner}{}", REAL.open, REAL.close)
        }
    })
    .0
}

fn strip_leading_dots(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len() + 4);
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == q && prev != Some('\\') {
                    quote = None;
                }
                out.push(c);
            }
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                out.push(c);
            }
            None if c == '.' && prev.map_or(true, starts_path) => match chars.peek() {
                Some(&next) if next.is_alphabetic() || next == '_' => {}
                Some(&next) if !(next.is_whitespace() || matches!(next, ')' | '}' | '~')) => {
                    out.push(c)
                }
                _ => out.push_str("this"),
            },
            None => out.push(c),
        }
        prev = Some(c);
    }
    out
}

fn starts_path(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | '=' | '{' | '~')
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_simple() {
        let renderer = TemplateRenderer::new();
        let data = json!({"name": "world"});
        let result = renderer.render("Hello, {{name}}!", &data).unwrap();
        assert_eq!(result, "Hello, world!");
    }

    #[test]
    fn test_render_name_with_placeholder() {
        let renderer = TemplateRenderer::new();
        let data = json!({"Name": "myapp"});
        assert_eq!(
            renderer.render_name("{{Name}}-config.yml", &data).unwrap(),
            "myapp-config.yml"
        );
        assert_eq!(
            renderer.render_name("src/main.rs", &data).unwrap(),
            "src/main.rs"
        );
    }

    #[test]
    fn test_render_name_go_style_placeholder() {
        let renderer = TemplateRenderer::new();
        let data = json!({"Name": "myapp"});
        assert_eq!(
            renderer.render_name("{{.Name}}-config.yml", &data).unwrap(),
            "myapp-config.yml"
        );
    }

    #[test]
    fn test_go_style_paths_in_content() {
        let renderer = TemplateRenderer::new();
        let data = json!({
            "Name": "svc",
            "Raw": "<x>",
            "Items": ["a", "b"],
            "Values": {"image": "nginx"}
        });
        let template =
            "{{ .Values.image }} {{#each .Items}}[{{.}}]{{/each}} {{{.Raw}}} {{upper .Name}}";
        assert_eq!(
            renderer.render(template, &data).unwrap(),
            "nginx [a][b] <x> SVC"
        );
    }

    #[test]
    fn test_normalize_paths_leaves_other_syntax() {
        let template = r#"{{../Name}} {{@root.x}} {{this.y}} {{replace s "." "-"}} {-{ .Safe }-} a.b"#;
        assert_eq!(normalize_paths(template), template);
        assert_eq!(normalize_paths("{{ . }} {{.}}"), "{{ this }} {{this}}");
        assert_eq!(normalize_paths("{{json .Data pretty=true}}"), "{{json Data pretty=true}}");
    }

    #[test]
    fn test_escaped_actions_render_literally() {
        let renderer = TemplateRenderer::new();
        for source in ["{{{x}}}", "{{ .Values.image }}", "a {{#if x}}b{{/if}}"] {
            let escaped = escape::escape(source);
            assert_eq!(renderer.render(&escaped, &json!({})).unwrap(), escaped);
            assert_eq!(escape::unescape(&escaped), source);
        }
        assert_eq!(escape::escape("{{{x}}}"), "{-{-{x}-}-}");
    }

    #[test]
    fn test_strict_mode_missing_var() {
        let renderer = TemplateRenderer::new();
        let data = json!({});
        let err = renderer
            .render_content("README.md", "Hello, {{missing}}!", &data)
            .unwrap_err();
        assert!(matches!(err, ArchetypeError::ContentTemplate { ref file, .. } if file == "README.md"));
    }

    #[test]
    fn test_lenient_mode_missing_var() {
        let renderer = TemplateRenderer::with_strict_mode(false);
        assert_eq!(renderer.render("a{{missing}}b", &json!({})).unwrap(), "ab");
    }

    #[test]
    fn test_invalid_name_template() {
        let renderer = TemplateRenderer::new();
        let err = renderer.render_name("{{#if}}broken", &json!({})).unwrap_err();
        assert!(matches!(err, ArchetypeError::FilenameTemplate { .. }));
    }

    #[test]
    fn test_no_html_escaping() {
        let renderer = TemplateRenderer::new();
        let data = json!({"tag": "<b>&</b>"});
        assert_eq!(renderer.render("{{tag}}", &data).unwrap(), "<b>&</b>");
    }

    #[test]
    fn test_render_with_conditionals() {
        let renderer = TemplateRenderer::new();
        let data = json!({"enabled": true, "name": "svc"});
        let template = "{{#if enabled}}on: {{name}}{{else}}off{{/if}}";
        assert_eq!(renderer.render(template, &data).unwrap(), "on: svc");
    }
}
