//! Read-only archetype snapshots.
//!
//! A [`Snapshot`] is one immutable view of an archetype tree: a local
//! directory ([`DirectorySnapshot`]) or a resolved git commit
//! ([`GitSnapshot`]). Consumers enumerate its [`FileEntry`]s lazily and
//! read single files (the metadata document) by path.

pub mod dir;
pub mod git;

use std::path::Path;

pub use dir::DirectorySnapshot;
pub use git::GitSnapshot;

use crate::config::{AddressKind, SourceConfig};
use crate::error::Result;

/// Permission bits for regular files.
pub const REGULAR_MODE: u32 = 0o644;

/// Permission bits for executable files.
pub const EXECUTABLE_MODE: u32 = 0o755;

/// One file of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// `/`-separated path relative to the snapshot root.
    pub path: String,
    /// Permission bits (`0o644`, `0o755`, ...).
    pub mode: u32,
    pub size: u64,
    pub content: Vec<u8>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, mode: u32, content: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            mode,
            size: content.len() as u64,
            content,
        }
    }

    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }
}

/// An immutable, enumerable archetype tree.
pub trait Snapshot {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    /// Every regular file, in a stable order. Contents load as the iterator
    /// advances.
    fn entries(&self) -> Box<dyn Iterator<Item = Result<FileEntry>> + '_>;

    /// Contents of the file at `path`, or `None` when there is no such file.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Open the snapshot `config` points at.
///
/// A local directory that is not a git repository is served as-is; every
/// other address goes through git.
pub fn open_snapshot(config: &SourceConfig) -> Result<Box<dyn Snapshot>> {
    if config.address_kind() == AddressKind::Local {
        let path = Path::new(local_path(&config.address));
        if path.is_dir() && !git::is_repository(path) {
            if !config.is_latest() {
                tracing::warn!(
                    reference = %config.reference,
                    "reference ignored for a plain directory"
                );
            }
            return Ok(Box::new(DirectorySnapshot::new(path)));
        }
    }
    Ok(Box::new(GitSnapshot::open(config)?))
}

/// Strip a `file://` scheme, if any.
pub(crate) fn local_path(address: &str) -> &str {
    address.strip_prefix("file://").unwrap_or(address)
}
