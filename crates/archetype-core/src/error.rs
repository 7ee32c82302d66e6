//! Unified error types for the archetype toolkit.

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while binding user settings against archetype metadata.
///
/// Any of these aborts the whole run before a single file is rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Settings were written for a different metadata schema version.
    #[error("settings version {settings} does not match metadata version {metadata}")]
    VersionMismatch { settings: u32, metadata: u32 },

    /// Settings supply a value for a parameter the archetype does not declare.
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    /// The supplied value's runtime type differs from the declared type.
    #[error("parameter '{name}' expects a {expected} value, got {found}")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// The metadata declares a type string that is not recognized.
    #[error("parameter '{name}' declares unsupported type '{declared}'")]
    UnknownType { name: String, declared: String },
}

/// All errors that can occur during archetype operations.
#[derive(Error, Debug)]
pub enum ArchetypeError {
    // --- Classification ---

    /// Reading the leading bytes of a file for content sniffing failed.
    #[error("cannot classify {path}")]
    Classification {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // --- Filtering ---

    /// An include or exclude pattern is not a valid regular expression.
    #[error("invalid pattern '{pattern}'")]
    PatternCompile {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // --- Templates ---

    /// The file name could not be compiled or evaluated as a template.
    #[error("cannot render file name '{file}': {message}")]
    FilenameTemplate { file: String, message: String },

    /// The file content could not be compiled or evaluated as a template.
    #[error("cannot render contents of '{file}': {message}")]
    ContentTemplate { file: String, message: String },

    /// A rendered file name points outside of the output directory.
    #[error("rendered path '{rendered}' for '{file}' escapes the output directory")]
    PathEscape { file: String, rendered: String },

    /// A template helper failed (I/O, network or argument error).
    #[error("helper '{helper}' failed: {message}")]
    Helper { helper: String, message: String },

    // --- Parameters ---

    /// Settings failed validation against the archetype metadata.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The archetype snapshot contains no metadata document.
    #[error("archetype metadata not found (looked for {0})")]
    MetadataNotFound(String),

    /// The metadata document exists but cannot be parsed.
    #[error("failed to parse archetype metadata at {path}")]
    MetadataParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The settings document (inline or file) cannot be parsed.
    #[error("failed to parse settings: {0}")]
    SettingsParse(String),

    // --- Source ---

    /// Cloning, opening or walking the archetype repository failed.
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// The repository address is missing or unusable.
    #[error("invalid repository address: {0}")]
    InvalidAddress(String),

    /// The authentication method does not fit the repository address.
    #[error("invalid authentication: {0}")]
    InvalidAuth(String),

    // --- General ---

    /// Several independent operations failed; every failure is kept.
    #[error("{} operation(s) failed: {}", .0.len(), join_errors(.0))]
    Aggregate(Vec<ArchetypeError>),

    /// A filesystem I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A catch-all for errors from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArchetypeError {
    /// Collapse a list of failures: `Ok` when empty, the error itself when
    /// there is exactly one, [`ArchetypeError::Aggregate`] otherwise.
    pub fn join(mut errors: Vec<ArchetypeError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ArchetypeError::Aggregate(errors)),
        }
    }
}

fn join_errors(errors: &[ArchetypeError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Alias for `Result<T, ArchetypeError>`.
pub type Result<T> = std::result::Result<T, ArchetypeError>;
