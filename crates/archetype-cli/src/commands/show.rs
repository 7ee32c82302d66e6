use anyhow::Result;

use archetype_core::classify;
use archetype_core::escape::{self, REAL};

use crate::output;
use crate::{FileArgs, SourceArgs};

/// Print every selected text file of the archetype with its template
/// actions highlighted.
pub fn run(source: &SourceArgs, files: &FileArgs) -> Result<()> {
    let snapshot = super::open_snapshot(source)?;
    let filter = files.filter();

    for entry in snapshot.entries() {
        let entry = entry?;
        let decision = filter.decide(&entry.path);
        if !decision.is_included() {
            tracing::info!(file = %entry.path, reason = %decision.reason(), "skipping file");
            continue;
        }

        output::print_header(&entry.path);
        if !classify::classify(&entry.content).is_text() {
            output::print_key_value("binary", &format!("{} bytes", entry.size));
            continue;
        }
        let text = String::from_utf8_lossy(&entry.content);
        println!("{}", escape::highlight(&text, &REAL));
    }
    Ok(())
}
