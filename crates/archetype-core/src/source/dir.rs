//! Snapshot of a plain local directory.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{FileEntry, Snapshot};
use crate::error::{ArchetypeError, Result};

/// A local directory tree served as a snapshot. `.git/` is never listed.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    root: PathBuf,
}

impl DirectorySnapshot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load(&self, path: &Path) -> Result<FileEntry> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|e| ArchetypeError::Other(e.into()))?;
        let content = std::fs::read(path)?;
        let mode = file_mode(&std::fs::metadata(path)?);
        Ok(FileEntry::new(slash_path(relative), mode, content))
    }
}

impl Snapshot for DirectorySnapshot {
    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }

    fn entries(&self) -> Box<dyn Iterator<Item = Result<FileEntry>> + '_> {
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git");

        Box::new(walker.filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(self.load(entry.path())),
            Ok(_) => None,
            Err(e) => Some(Err(ArchetypeError::Io(e.into()))),
        }))
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read(full)?))
    }
}

/// Join path components with `/` whatever the platform separator is.
fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(unix)]
/// Read/write/execute bits only; setuid, setgid and sticky are dropped.
pub(crate) fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
pub(crate) fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    super::REGULAR_MODE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join(".archetype")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::write(root.join(".archetype/metadata.yml"), "version: 1\n").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        std::fs::write(root.join("README.md"), "# {{name}}\n").unwrap();
        dir
    }

    #[test]
    fn test_entries_sorted_without_git_dir() {
        let dir = fixture();
        let snapshot = DirectorySnapshot::new(dir.path());
        let paths: Vec<String> = snapshot.entries().map(|e| e.unwrap().path).collect();
        assert_eq!(
            paths,
            vec![".archetype/metadata.yml", "README.md", "src/main.rs"]
        );
    }

    #[test]
    fn test_entry_content_and_size() {
        let dir = fixture();
        let snapshot = DirectorySnapshot::new(dir.path());
        let readme = snapshot
            .entries()
            .map(|e| e.unwrap())
            .find(|e| e.path == "README.md")
            .unwrap();
        assert_eq!(readme.content, b"# {{name}}\n");
        assert_eq!(readme.size, 11);
    }

    #[test]
    fn test_read_existing_and_missing() {
        let dir = fixture();
        let snapshot = DirectorySnapshot::new(dir.path());
        assert_eq!(
            snapshot.read(".archetype/metadata.yml").unwrap(),
            Some(b"version: 1\n".to_vec())
        );
        assert_eq!(snapshot.read("missing.txt").unwrap(), None);
        assert_eq!(snapshot.read("src").unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_mode_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let snapshot = DirectorySnapshot::new(dir.path());
        let entry = snapshot.entries().next().unwrap().unwrap();
        assert_eq!(entry.mode, 0o755);
    }

    #[cfg(unix)]
    #[test]
    fn test_setuid_bit_dropped() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("tool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o4755)).unwrap();

        let snapshot = DirectorySnapshot::new(dir.path());
        let entry = snapshot.entries().next().unwrap().unwrap();
        assert_eq!(entry.mode, 0o755);
    }
}
