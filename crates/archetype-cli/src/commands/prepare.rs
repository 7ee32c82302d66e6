use std::path::Path;

use anyhow::Result;

use archetype_core::prepare;

use crate::output;
use crate::{FileArgs, SourceArgs};

/// Escape every selected file of an archetype into `directory`, leaving
/// actions that reference the archetype's own parameters live.
pub fn run(source: &SourceArgs, files: &FileArgs, directory: &Path) -> Result<()> {
    output::print_header(&format!("archetype prepare: {}", source.repository));

    output::print_step(1, 2, "Opening archetype");
    let (snapshot, metadata) = super::open(source)?;

    output::print_step(2, 2, &format!("Escaping into {}", directory.display()));
    let summary =
        prepare::prepare_snapshot(snapshot.as_ref(), &metadata, directory, &files.filter())?;

    output::print_key_value("written", &summary.written.to_string());
    output::print_key_value("escaped", &summary.modified.to_string());
    output::print_key_value("filtered out", &summary.filtered.to_string());
    output::print_success(&format!("archetype prepared in {}", directory.display()));
    Ok(())
}
