//! Run configuration: where the archetype comes from and how it is written.
//!
//! - [`SourceConfig`] locates the archetype (address, reference, credentials,
//!   proxy) and is built through [`SourceConfigBuilder`], which rejects
//!   credentials that cannot apply to the address scheme.
//! - [`RenderOptions`] drives materialization.
//! - [`EscapeOptions`] drives escaping and unescaping.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ArchetypeError, Result};
use crate::escape::Direction;

/// Reference meaning "the repository HEAD".
pub const LATEST: &str = "latest";

/// Default output directory of `prepare`.
pub const DEFAULT_PREPARED_DIR: &str = ".archetype/prepared";

/// Default output directory of `escape` and `unescape`.
pub const DEFAULT_ESCAPED_DIR: &str = ".archetype/escaped";

/// Credentials used to reach a remote archetype repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum Auth {
    #[default]
    Anonymous,
    /// Personal access token, sent as the HTTP password.
    Token { token: String },
    Basic { username: String, password: String },
    /// Private key file, optionally protected by a passphrase.
    SshKey {
        path: PathBuf,
        passphrase: Option<String>,
    },
    /// `~/.ssh/id_rsa`, falling back to `~/.ssh/id_ed25519`.
    DefaultSshKey,
    SshAgent,
}

impl Auth {
    fn is_http(&self) -> bool {
        matches!(self, Self::Token { .. } | Self::Basic { .. })
    }

    fn is_ssh(&self) -> bool {
        matches!(
            self,
            Self::SshKey { .. } | Self::DefaultSshKey | Self::SshAgent
        )
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Token { .. } => "token",
            Self::Basic { .. } => "basic",
            Self::SshKey { .. } => "ssh key",
            Self::DefaultSshKey => "default ssh key",
            Self::SshAgent => "ssh agent",
        }
    }
}

/// Address scheme families that decide which credentials apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Http,
    Ssh,
    /// `file://` URL or plain filesystem path.
    Local,
}

impl AddressKind {
    pub fn of(address: &str) -> Self {
        if address.starts_with("http://") || address.starts_with("https://") {
            Self::Http
        } else if address.starts_with("ssh://") || address.starts_with("git@") {
            Self::Ssh
        } else {
            Self::Local
        }
    }
}

/// Where to load the archetype from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub address: String,
    /// `latest`/`HEAD`, a commit hash, or a tag name.
    pub reference: String,
    #[serde(default)]
    pub auth: Auth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

impl SourceConfig {
    pub fn builder(address: impl Into<String>) -> SourceConfigBuilder {
        SourceConfigBuilder {
            address: address.into(),
            reference: LATEST.to_string(),
            auth: Auth::Anonymous,
            proxy: None,
        }
    }

    pub fn address_kind(&self) -> AddressKind {
        AddressKind::of(&self.address)
    }

    /// Whether the reference means "whatever HEAD points to".
    pub fn is_latest(&self) -> bool {
        self.reference.is_empty()
            || self.reference.eq_ignore_ascii_case(LATEST)
            || self.reference == "HEAD"
    }
}

/// Builder for [`SourceConfig`]; [`build`](Self::build) validates.
#[derive(Debug, Clone)]
pub struct SourceConfigBuilder {
    address: String,
    reference: String,
    auth: Auth,
    proxy: Option<String>,
}

impl SourceConfigBuilder {
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.is_empty());
        self
    }

    pub fn build(self) -> Result<SourceConfig> {
        if self.address.trim().is_empty() {
            return Err(ArchetypeError::InvalidAddress(
                "repository address is empty".into(),
            ));
        }

        let kind = AddressKind::of(&self.address);
        if self.auth.is_http() && kind != AddressKind::Http {
            return Err(ArchetypeError::InvalidAuth(format!(
                "{} authentication requires an http(s) address, got '{}'",
                self.auth.describe(),
                self.address
            )));
        }
        if self.auth.is_ssh() && kind != AddressKind::Ssh {
            return Err(ArchetypeError::InvalidAuth(format!(
                "{} authentication requires an ssh:// or git@ address, got '{}'",
                self.auth.describe(),
                self.address
            )));
        }

        Ok(SourceConfig {
            address: self.address,
            reference: self.reference,
            auth: self.auth,
            proxy: self.proxy,
        })
    }
}

/// Options for materializing an archetype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub output_dir: PathBuf,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    /// Fail on references to missing context values.
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_strict() -> bool {
    true
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            includes: Vec::new(),
            excludes: Vec::new(),
            strict: true,
        }
    }
}

/// Options for escaping or unescaping files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscapeOptions {
    pub output_dir: PathBuf,
    pub direction: Direction,
}

impl EscapeOptions {
    pub fn new(direction: Direction) -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_ESCAPED_DIR),
            direction,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = SourceConfig::builder("https://example.com/a.git")
            .build()
            .unwrap();
        assert_eq!(config.reference, LATEST);
        assert_eq!(config.auth, Auth::Anonymous);
        assert!(config.is_latest());
        assert_eq!(config.address_kind(), AddressKind::Http);
    }

    #[test]
    fn test_token_requires_http() {
        let err = SourceConfig::builder("git@example.com:a/b.git")
            .auth(Auth::Token { token: "t".into() })
            .build()
            .unwrap_err();
        assert!(matches!(err, ArchetypeError::InvalidAuth(_)));

        assert!(SourceConfig::builder("https://example.com/a.git")
            .auth(Auth::Token { token: "t".into() })
            .build()
            .is_ok());
    }

    #[test]
    fn test_ssh_requires_ssh_address() {
        for auth in [Auth::SshAgent, Auth::DefaultSshKey] {
            let err = SourceConfig::builder("https://example.com/a.git")
                .auth(auth.clone())
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("ssh://"));

            assert!(SourceConfig::builder("ssh://git@example.com/a.git")
                .auth(auth)
                .build()
                .is_ok());
        }
    }

    #[test]
    fn test_local_path_is_anonymous_only() {
        assert_eq!(AddressKind::of("/tmp/archetype"), AddressKind::Local);
        assert_eq!(AddressKind::of("file:///tmp/archetype"), AddressKind::Local);
        assert!(SourceConfig::builder("/tmp/archetype")
            .auth(Auth::Basic {
                username: "u".into(),
                password: "p".into()
            })
            .build()
            .is_err());
    }

    #[test]
    fn test_empty_address_rejected() {
        let err = SourceConfig::builder("  ").build().unwrap_err();
        assert!(matches!(err, ArchetypeError::InvalidAddress(_)));
    }

    #[test]
    fn test_reference_forms() {
        let head = SourceConfig::builder("/a").reference("HEAD").build().unwrap();
        let tag = SourceConfig::builder("/a").reference("v1.0.0").build().unwrap();
        assert!(head.is_latest());
        assert!(!tag.is_latest());
    }

    #[test]
    fn test_empty_proxy_is_none() {
        let config = SourceConfig::builder("/a")
            .proxy(Some(String::new()))
            .build()
            .unwrap();
        assert_eq!(config.proxy, None);
    }

    #[test]
    fn test_escape_options_default_dir() {
        let options = EscapeOptions::new(Direction::Escape);
        assert_eq!(options.output_dir, PathBuf::from(DEFAULT_ESCAPED_DIR));
        let options = options.with_output_dir("out");
        assert_eq!(options.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_render_options_strict_by_default() {
        assert!(RenderOptions::default().strict);
        let parsed: RenderOptions = serde_json::from_str(r#"{"output_dir": "out"}"#).unwrap();
        assert!(parsed.strict);
    }
}
