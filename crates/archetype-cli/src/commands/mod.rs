//! CLI command implementations for archetype.
//!
//! Each module corresponds to a subcommand (`archetype <command>`);
//! `escape` serves both `escape` and `unescape`.

pub mod apply;
pub mod describe;
pub mod escape;
pub mod prepare;
pub mod show;

use anyhow::{Context, Result};

use archetype_core::metadata::Metadata;
use archetype_core::source::{self, Snapshot};

use crate::{output, SourceArgs};

/// Open the archetype `source` points at.
fn open_snapshot(source: &SourceArgs) -> Result<Box<dyn Snapshot>> {
    let config = source.to_config()?;
    let snapshot = source::open_snapshot(&config)
        .with_context(|| format!("cannot open archetype at '{}'", config.address))?;
    output::print_key_value("source", &snapshot.describe());
    Ok(snapshot)
}

/// Open the archetype `source` points at and load its metadata.
fn open(source: &SourceArgs) -> Result<(Box<dyn Snapshot>, Metadata)> {
    let snapshot = open_snapshot(source)?;
    let metadata = Metadata::load(snapshot.as_ref())?;
    output::print_key_value(
        "metadata",
        &format!(
            "version {}, {} parameter(s)",
            metadata.version,
            metadata.parameters.len()
        ),
    );
    Ok((snapshot, metadata))
}
