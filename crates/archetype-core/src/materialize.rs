//! Materialization: rendering an archetype snapshot into an output tree.
//!
//! Every file goes through the same pipeline, independently of the others:
//!
//! ```text
//! entry ──► reserved? ──► render name ──► filter ──► classify ─┬─► binary: copy
//!              │               │             │                 └─► text: render
//!           Skipped         Failed      FilteredOut          Copied / Rendered / Failed
//! ```
//!
//! A failure only ends the file it belongs to; [`Materializer::run`] keeps
//! going and collects every failure into the [`Report`].

use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::binder::TemplateContext;
use crate::classify::{self, ContentKind};
use crate::config::RenderOptions;
use crate::error::{ArchetypeError, Result};
use crate::filter::{self, FileFilter};
use crate::render::TemplateRenderer;
use crate::source::{FileEntry, Snapshot};

/// Terminal state of one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Part of the reserved metadata directory.
    Skipped,
    FilteredOut { reason: String },
    /// Binary content, copied byte for byte.
    Copied { output: PathBuf },
    /// Text content, rendered as a template.
    Rendered { output: PathBuf },
    Failed { error: ArchetypeError },
}

/// Totals of a [`Materializer::run`].
#[derive(Debug, Default)]
pub struct Report {
    pub skipped: usize,
    pub filtered: usize,
    pub copied: usize,
    pub rendered: usize,
    /// `(snapshot path, error)` for every failed file.
    pub failures: Vec<(String, ArchetypeError)>,
}

impl Report {
    pub fn written(&self) -> usize {
        self.copied + self.rendered
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: &str, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::FilteredOut { .. } => self.filtered += 1,
            FileOutcome::Copied { .. } => self.copied += 1,
            FileOutcome::Rendered { .. } => self.rendered += 1,
            FileOutcome::Failed { error } => self.failures.push((path.to_string(), error)),
        }
    }

    /// Every failure joined into one error, or `Ok` if there were none.
    pub fn into_result(self) -> Result<()> {
        ArchetypeError::join(self.failures.into_iter().map(|(_, e)| e).collect())
    }
}

/// Renders snapshot files against one bound context.
pub struct Materializer {
    data: Value,
    renderer: TemplateRenderer,
    filter: FileFilter,
    output_dir: PathBuf,
}

impl Materializer {
    pub fn new(context: &TemplateContext, options: &RenderOptions) -> Self {
        Self {
            data: context.to_json(),
            renderer: TemplateRenderer::with_strict_mode(options.strict),
            filter: FileFilter::new(&options.includes, &options.excludes),
            output_dir: options.output_dir.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Run one file through the pipeline.
    pub fn process(&self, entry: &FileEntry) -> FileOutcome {
        if filter::is_reserved(&entry.path) {
            tracing::debug!(path = %entry.path, "skipping archetype metadata");
            return FileOutcome::Skipped;
        }

        let rendered_name = match self.renderer.render_name(&entry.path, &self.data) {
            Ok(name) => name,
            Err(error) => return self.fail(entry, error),
        };

        let decision = self.filter.decide(&entry.path);
        if !decision.is_included() {
            let reason = decision.reason();
            tracing::info!(path = %entry.path, %reason, "file filtered out");
            return FileOutcome::FilteredOut { reason };
        }

        if rendered_name.trim().is_empty() {
            let reason = "file name renders empty".to_string();
            tracing::info!(path = %entry.path, %reason, "file filtered out");
            return FileOutcome::FilteredOut { reason };
        }

        let output = match self.output_path(&entry.path, &rendered_name) {
            Ok(output) => output,
            Err(error) => return self.fail(entry, error),
        };

        let kind = classify::classify(&entry.content);
        tracing::debug!(path = %entry.path, ?kind, "classified");

        let result = match kind {
            ContentKind::Binary => self
                .write(&output, &entry.content, entry.mode)
                .map(|()| FileOutcome::Copied { output }),
            ContentKind::Text => match std::str::from_utf8(&entry.content) {
                Ok(text) => self
                    .renderer
                    .render_content(&entry.path, text, &self.data)
                    .and_then(|rendered| self.write(&output, rendered.as_bytes(), entry.mode))
                    .map(|()| FileOutcome::Rendered { output }),
                Err(_) => {
                    tracing::warn!(path = %entry.path, "text file is not UTF-8, copying verbatim");
                    self.write(&output, &entry.content, entry.mode)
                        .map(|()| FileOutcome::Copied { output })
                }
            },
        };

        match result {
            Ok(outcome) => {
                tracing::info!(path = %entry.path, ?outcome, "file materialized");
                outcome
            }
            Err(error) => self.fail(entry, error),
        }
    }

    /// Materialize every entry of `snapshot`.
    ///
    /// Only failing to prepare the output directory aborts the run; per-file
    /// failures are recorded in the report.
    pub fn run(&self, snapshot: &dyn Snapshot) -> Result<Report> {
        prepare_output_dir(&self.output_dir)?;
        tracing::info!(
            source = %snapshot.describe(),
            output = %self.output_dir.display(),
            "materializing archetype"
        );

        let mut report = Report::default();
        for entry in snapshot.entries() {
            match entry {
                Ok(entry) => {
                    let outcome = self.process(&entry);
                    report.record(&entry.path, outcome);
                }
                Err(error) => {
                    tracing::error!(%error, "cannot read snapshot entry");
                    report.failures.push((snapshot.describe(), error));
                }
            }
        }

        tracing::info!(
            rendered = report.rendered,
            copied = report.copied,
            filtered = report.filtered,
            failed = report.failures.len(),
            "materialization finished"
        );
        Ok(report)
    }

    fn fail(&self, entry: &FileEntry, error: ArchetypeError) -> FileOutcome {
        tracing::error!(path = %entry.path, %error, "file failed");
        FileOutcome::Failed { error }
    }

    /// Join a rendered name onto the output directory, refusing names that
    /// would land outside it.
    fn output_path(&self, file: &str, rendered: &str) -> Result<PathBuf> {
        let relative = Path::new(rendered);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ArchetypeError::PathEscape {
                file: file.to_string(),
                rendered: rendered.to_string(),
            });
        }
        Ok(self.output_dir.join(relative))
    }

    fn write(&self, output: &Path, content: &[u8], mode: u32) -> Result<()> {
        write_file(output, content, mode)
    }
}

/// Write `content` to `output` with permission bits `mode`, creating parent
/// directories as needed.
pub(crate) fn write_file(output: &Path, content: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, content)?;
    set_mode(output, mode)
}

fn prepare_output_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        if fs::read_dir(dir)?.next().is_some() {
            tracing::warn!(output = %dir.display(), "output directory is not empty");
        }
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
