use std::path::Path;

use anyhow::Result;

use archetype_core::binder;
use archetype_core::config::RenderOptions;
use archetype_core::materialize::Materializer;
use archetype_core::metadata::Settings;

use crate::output;
use crate::{FileArgs, SourceArgs};

/// Materialize an archetype into `directory`.
///
/// Opens the archetype, binds the settings against its metadata (any
/// validation error aborts before a file is written), then renders every
/// file. Per-file failures are listed and turned into a non-zero exit once
/// all files have been attempted.
pub fn run(
    source: &SourceArgs,
    files: &FileArgs,
    settings: Option<&str>,
    directory: &Path,
    lenient: bool,
) -> Result<()> {
    output::print_header(&format!("archetype apply: {}", source.repository));

    output::print_step(1, 3, "Opening archetype");
    let (snapshot, metadata) = super::open(source)?;

    output::print_step(2, 3, "Binding settings");
    let settings = match settings {
        Some(value) => Settings::parse(value)?,
        None => {
            output::print_warning("no settings given, using declared defaults");
            Settings::skeleton(&metadata)
        }
    };
    let context = binder::bind(&settings, &metadata)?;
    for (name, value) in context.iter() {
        output::print_key_value(name, &value.to_string());
    }

    output::print_step(3, 3, &format!("Rendering into {}", directory.display()));
    let options = RenderOptions {
        output_dir: directory.to_path_buf(),
        includes: files.includes.clone(),
        excludes: files.excludes.clone(),
        strict: !lenient,
    };
    let report = Materializer::new(&context, &options).run(snapshot.as_ref())?;

    output::print_key_value("rendered", &report.rendered.to_string());
    output::print_key_value("copied", &report.copied.to_string());
    output::print_key_value("filtered out", &report.filtered.to_string());

    if report.is_success() {
        output::print_success(&format!(
            "{} file(s) written to {}",
            report.written(),
            directory.display()
        ));
        return Ok(());
    }

    for (path, error) in &report.failures {
        output::print_error(&format!("{path}: {error}"));
    }
    report.into_result()?;
    Ok(())
}
