//! Archetype metadata (the parameter schema) and user settings documents.
//!
//! ## Metadata layout
//!
//! The schema lives inside the archetype itself, under the reserved
//! [`METADATA_DIR`]:
//! ```text
//! <archetype>/
//! ├── .archetype/
//! │   └── metadata.yml     # Metadata
//! └── ...                  # files to materialize
//! ```
//!
//! ```yaml
//! version: 1
//! parameters:
//!   name:
//!     type: string
//!     default: myapp
//!     description: project name
//! ```
//!
//! Settings mirror the same shape with concrete values:
//! ```yaml
//! version: 1
//! parameters:
//!   name: billing
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArchetypeError, Result};
use crate::source::Snapshot;

/// Reserved directory holding archetype metadata; never materialized.
pub const METADATA_DIR: &str = ".archetype";

/// Candidate metadata paths, tried in order.
pub const METADATA_FILES: &[&str] = &[
    ".archetype/metadata.yml",
    ".archetype/metadata.yaml",
    ".archetype/metadata.json",
];

/// A single declared parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Declared type name (`string`, `number`, `bool`, ...); empty means any.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// The parameter schema an archetype accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
}

impl Metadata {
    /// Parse a metadata document (YAML or JSON).
    pub fn parse(text: &str, origin: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ArchetypeError::MetadataParse {
            path: origin.to_string(),
            source: e,
        })
    }

    /// Load metadata from the reserved directory of a snapshot.
    pub fn load(snapshot: &dyn Snapshot) -> Result<Self> {
        for candidate in METADATA_FILES {
            if let Some(bytes) = snapshot.read(candidate)? {
                let text = String::from_utf8_lossy(&bytes);
                let metadata = Self::parse(&text, candidate)?;
                tracing::info!(
                    path = candidate,
                    version = metadata.version,
                    parameters = metadata.parameters.len(),
                    "loaded archetype metadata"
                );
                return Ok(metadata);
            }
        }
        Err(ArchetypeError::MetadataNotFound(METADATA_FILES.join(", ")))
    }
}

/// User-supplied parameter values for one materialization run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl Settings {
    /// Parse settings given on the command line.
    ///
    /// A value starting with `@` names a file to read; anything else is
    /// parsed as an inline YAML or JSON document.
    pub fn parse(value: &str) -> Result<Self> {
        match value.strip_prefix('@') {
            Some(path) => Self::from_file(Path::new(path)),
            None => Self::from_str_document(value),
        }
    }

    /// Read and parse a settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ArchetypeError::SettingsParse(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_str_document(&text)
    }

    fn from_str_document(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| ArchetypeError::SettingsParse(e.to_string()))
    }

    /// A settings document pre-filled with every declared default.
    pub fn skeleton(metadata: &Metadata) -> Self {
        Self {
            version: metadata.version,
            parameters: metadata
                .parameters
                .iter()
                .map(|(name, p)| (name.clone(), p.default.clone().unwrap_or(Value::Null)))
                .collect(),
        }
    }
}
