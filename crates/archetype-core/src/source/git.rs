//! Snapshot of one commit of a git repository.
//!
//! Local repositories (`file://` or plain paths) are opened in place;
//! remote ones are cloned bare into a temporary directory that lives as long
//! as the snapshot. The configured reference is resolved once:
//!
//! | Reference             | Resolves to                              |
//! |-----------------------|------------------------------------------|
//! | `latest`, `HEAD`, ``  | the HEAD commit                          |
//! | a tag name            | the tagged commit                        |
//! | anything else         | a commit hash or any revspec             |
//!
//! Tags win over hashes, so a tag named `deadbee` is never read as a commit.
//!
//! Entries are read from the commit tree; blob contents load one at a time
//! as the entry iterator advances.

use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{
    Cred, CredentialType, ErrorCode, FetchOptions, ObjectType, Oid, ProxyOptions,
    RemoteCallbacks, Repository, TreeWalkMode, TreeWalkResult,
};
use tempfile::TempDir;

use super::{local_path, FileEntry, Snapshot, EXECUTABLE_MODE, REGULAR_MODE};
use crate::config::{AddressKind, Auth, SourceConfig};
use crate::error::{ArchetypeError, Result};

/// Credential callback retries before giving up.
const MAX_AUTH_ATTEMPTS: usize = 3;

/// A resolved commit of a git repository.
pub struct GitSnapshot {
    repo: Repository,
    commit: Oid,
    address: String,
    // Declared after `repo` so the clone outlives the handle.
    _checkout: Option<TempDir>,
}

impl std::fmt::Debug for GitSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitSnapshot")
            .field("address", &self.address)
            .field("commit", &self.commit)
            .finish()
    }
}

impl GitSnapshot {
    /// Open or clone the repository and resolve the configured reference.
    pub fn open(config: &SourceConfig) -> Result<Self> {
        let (repo, checkout) = match config.address_kind() {
            AddressKind::Local => {
                let path = local_path(&config.address);
                tracing::debug!(path, "opening local repository");
                (Repository::open(path)?, None)
            }
            _ => {
                let checkout = tempfile::Builder::new().prefix("archetype-").tempdir()?;
                let repo = clone(config, checkout.path())?;
                (repo, Some(checkout))
            }
        };

        let commit = resolve_reference(&repo, config)?;
        tracing::info!(address = %config.address, %commit, "resolved archetype commit");
        Ok(Self {
            repo,
            commit,
            address: config.address.clone(),
            _checkout: checkout,
        })
    }

    pub fn commit(&self) -> Oid {
        self.commit
    }

    /// `(path, blob id, mode)` of every blob in the commit tree, in tree order.
    fn blobs(&self) -> Result<Vec<(String, Oid, u32)>> {
        let tree = self.repo.find_commit(self.commit)?.tree()?;
        let mut blobs = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return TreeWalkResult::Ok;
            }
            let filemode = entry.filemode() as u32;
            if filemode & 0o170000 == 0o120000 {
                tracing::debug!(root, name = entry.name().unwrap_or(""), "skipping symlink");
                return TreeWalkResult::Ok;
            }
            if let Some(name) = entry.name() {
                let mode = if filemode & 0o111 != 0 {
                    EXECUTABLE_MODE
                } else {
                    REGULAR_MODE
                };
                blobs.push((format!("{root}{name}"), entry.id(), mode));
            }
            TreeWalkResult::Ok
        })?;
        Ok(blobs)
    }

    fn load(&self, path: String, oid: Oid, mode: u32) -> Result<FileEntry> {
        let blob = self.repo.find_blob(oid)?;
        Ok(FileEntry::new(path, mode, blob.content().to_vec()))
    }
}

impl Snapshot for GitSnapshot {
    fn describe(&self) -> String {
        format!("{} at {}", self.address, self.commit)
    }

    fn entries(&self) -> Box<dyn Iterator<Item = Result<FileEntry>> + '_> {
        match self.blobs() {
            Ok(blobs) => Box::new(
                blobs
                    .into_iter()
                    .map(move |(path, oid, mode)| self.load(path, oid, mode)),
            ),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let tree = self.repo.find_commit(self.commit)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if entry.kind() != Some(ObjectType::Blob) {
            return Ok(None);
        }
        let blob = self.repo.find_blob(entry.id())?;
        Ok(Some(blob.content().to_vec()))
    }
}

/// Whether `path` is the root of a git repository.
pub fn is_repository(path: &Path) -> bool {
    Repository::open(path).is_ok()
}

fn clone(config: &SourceConfig, into: &Path) -> Result<Repository> {
    tracing::info!(address = %config.address, auth = config.auth.describe(), "cloning repository");

    let mut callbacks = RemoteCallbacks::new();
    let auth = config.auth.clone();
    let mut attempts = 0;
    callbacks.credentials(move |_url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_AUTH_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }
        credentials(&auth, username_from_url, allowed)
    });
    callbacks.transfer_progress(|progress| {
        tracing::trace!(
            received = progress.received_objects(),
            total = progress.total_objects(),
            "fetching objects"
        );
        true
    });

    let mut proxy = ProxyOptions::new();
    match &config.proxy {
        Some(url) if url.starts_with("http") => {
            tracing::debug!(proxy = %url, "using proxy");
            proxy.url(url);
        }
        Some(url) => tracing::warn!(proxy = %url, "ignoring non-http proxy"),
        None => {
            proxy.auto();
        }
    }

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks).proxy_options(proxy);

    let repo = RepoBuilder::new()
        .bare(true)
        .fetch_options(fetch)
        .clone(&config.address, into)?;
    tracing::info!("clone successful");
    Ok(repo)
}

fn credentials(
    auth: &Auth,
    username_from_url: Option<&str>,
    allowed: CredentialType,
) -> std::result::Result<Cred, git2::Error> {
    let ssh_user = username_from_url.unwrap_or("git");
    match auth {
        Auth::Anonymous => Cred::default(),
        Auth::Token { token } => Cred::userpass_plaintext("git", token),
        Auth::Basic { username, password } => Cred::userpass_plaintext(username, password),
        Auth::SshKey { path, passphrase } => {
            Cred::ssh_key(ssh_user, None, path, passphrase.as_deref())
        }
        Auth::DefaultSshKey => {
            let key = default_ssh_key()
                .ok_or_else(|| git2::Error::from_str("no default ssh key in ~/.ssh"))?;
            Cred::ssh_key(ssh_user, None, &key, None)
        }
        Auth::SshAgent if allowed.contains(CredentialType::SSH_KEY) => {
            Cred::ssh_key_from_agent(ssh_user)
        }
        Auth::SshAgent => Err(git2::Error::from_str(
            "server does not accept ssh key authentication",
        )),
    }
}

/// `~/.ssh/id_rsa`, else `~/.ssh/id_ed25519`.
fn default_ssh_key() -> Option<PathBuf> {
    let ssh = dirs::home_dir()?.join(".ssh");
    ["id_rsa", "id_ed25519"]
        .iter()
        .map(|name| ssh.join(name))
        .find(|path| path.is_file())
}

/// Whether `reference` looks like a full or abbreviated commit hash.
pub fn is_commit_hash(reference: &str) -> bool {
    matches!(reference.len(), 7 | 40) && reference.chars().all(|c| c.is_ascii_hexdigit())
}

fn resolve_reference(repo: &Repository, config: &SourceConfig) -> Result<Oid> {
    if config.is_latest() {
        tracing::debug!("resolving HEAD");
        return Ok(repo.head()?.peel_to_commit()?.id());
    }

    let reference = config.reference.as_str();
    match repo.find_reference(&format!("refs/tags/{reference}")) {
        Ok(tag) => {
            tracing::debug!(reference, "resolving tag");
            return Ok(tag.peel_to_commit()?.id());
        }
        Err(e) if e.code() == ErrorCode::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    if is_commit_hash(reference) {
        tracing::debug!(reference, "resolving commit hash");
    } else {
        tracing::debug!(reference, "no such tag, trying as revision");
    }
    let object = repo.revparse_single(reference).map_err(|_| {
        ArchetypeError::Git(git2::Error::from_str(&format!(
            "reference '{reference}' not found"
        )))
    })?;
    Ok(object.peel_to_commit()?.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;

    fn commit_all(repo: &Repository, message: &str) -> Oid {
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let signature = Signature::now("Archetype", "archetype@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap()
    }

    /// Two commits: `v1` tags the first, HEAD is the second.
    fn fixture() -> (tempfile::TempDir, Oid, Oid) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join(".archetype")).unwrap();
        std::fs::write(dir.path().join(".archetype/metadata.yml"), "version: 1\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "first\n").unwrap();
        let first = commit_all(&repo, "first");
        let object = repo.find_object(first, None).unwrap();
        repo.tag_lightweight("v1", &object, false).unwrap();

        std::fs::write(dir.path().join("README.md"), "second\n").unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn f() {}\n").unwrap();
        let second = commit_all(&repo, "second");
        (dir, first, second)
    }

    fn open(dir: &Path, reference: &str) -> Result<GitSnapshot> {
        let config = SourceConfig::builder(dir.display().to_string())
            .reference(reference)
            .build()
            .unwrap();
        GitSnapshot::open(&config)
    }

    #[test]
    fn test_head_snapshot_entries() {
        let (dir, _, second) = fixture();
        let snapshot = open(dir.path(), "latest").unwrap();
        assert_eq!(snapshot.commit(), second);

        let mut paths: Vec<String> = snapshot.entries().map(|e| e.unwrap().path).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![".archetype/metadata.yml", "README.md", "src/lib.rs"]
        );
        assert_eq!(snapshot.read("README.md").unwrap(), Some(b"second\n".to_vec()));
    }

    #[test]
    fn test_tag_reference() {
        let (dir, first, _) = fixture();
        let snapshot = open(dir.path(), "v1").unwrap();
        assert_eq!(snapshot.commit(), first);
        assert_eq!(snapshot.read("README.md").unwrap(), Some(b"first\n".to_vec()));
        assert_eq!(snapshot.read("src/lib.rs").unwrap(), None);
    }

    #[test]
    fn test_commit_hash_reference() {
        let (dir, first, _) = fixture();
        let short = first.to_string()[..7].to_string();
        assert_eq!(open(dir.path(), &short).unwrap().commit(), first);
        assert_eq!(open(dir.path(), &first.to_string()).unwrap().commit(), first);
    }

    #[test]
    fn test_hex_named_tag_wins_over_hash() {
        let (dir, first, second) = fixture();
        let repo = Repository::open(dir.path()).unwrap();
        let tag = second.to_string()[..7].to_string();
        let object = repo.find_object(first, None).unwrap();
        repo.tag_lightweight(&tag, &object, false).unwrap();

        assert_eq!(open(dir.path(), &tag).unwrap().commit(), first);
    }

    #[test]
    fn test_unknown_reference() {
        let (dir, _, _) = fixture();
        let err = open(dir.path(), "no-such-tag").unwrap_err();
        assert!(err.to_string().contains("no-such-tag"));
    }

    #[test]
    fn test_read_directory_is_none() {
        let (dir, _, _) = fixture();
        let snapshot = open(dir.path(), "HEAD").unwrap();
        assert_eq!(snapshot.read("src").unwrap(), None);
    }

    #[test]
    fn test_is_commit_hash() {
        assert!(is_commit_hash("abc1234"));
        assert!(is_commit_hash(&"a".repeat(40)));
        assert!(!is_commit_hash("v1.0.0"));
        assert!(!is_commit_hash("abc12345"));
    }

    #[test]
    fn test_is_repository() {
        let (dir, _, _) = fixture();
        assert!(is_repository(dir.path()));
        assert!(!is_repository(&dir.path().join("src")));
    }
}
