//! archetype CLI: materialize project trees from template repositories.
//!
//! Provides six commands around an archetype's lifecycle:
//! `apply`, `describe`, `show`, `prepare`, `escape` and `unescape`.
//!
//! Each command delegates to [`archetype_core`]; this crate only parses
//! arguments, installs logging and prints results.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use archetype_core::config::{
    Auth, SourceConfig, DEFAULT_ESCAPED_DIR, DEFAULT_PREPARED_DIR, LATEST,
};
use archetype_core::filter::FileFilter;

#[derive(Parser)]
#[command(
    name = "archetype",
    about = "Materialize projects from template repositories (archetypes)",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an archetype into a directory using the given settings
    #[command(visible_aliases = ["init", "a"])]
    Apply {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        files: FileArgs,

        /// Settings as inline YAML/JSON, or @path to a settings file
        /// (declared defaults are used when omitted)
        #[arg(short, long)]
        settings: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        directory: PathBuf,

        /// Render references to missing values as empty instead of failing
        #[arg(long)]
        lenient: bool,
    },

    /// Print a settings skeleton with the archetype's parameters and defaults
    #[command(visible_aliases = ["descr", "d"])]
    Describe {
        #[command(flatten)]
        source: SourceArgs,
    },

    /// Print the archetype's text files with template actions highlighted
    Show {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        files: FileArgs,
    },

    /// Escape template syntax in an archetype, keeping its own parameters live
    Prepare {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        files: FileArgs,

        /// Output directory
        #[arg(short, long, default_value = DEFAULT_PREPARED_DIR)]
        directory: PathBuf,
    },

    /// Neutralize every template action ({{ }} to {-{ }-}) in the given files
    #[command(visible_aliases = ["esc", "e"])]
    Escape(EscapeArgs),

    /// Restore every neutralized template action ({-{ }-} to {{ }}) in the given files
    #[command(visible_aliases = ["unesc", "u"])]
    Unescape(EscapeArgs),
}

/// Where the archetype comes from and how to authenticate.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Repository address: https://, ssh://, git@, file:// or a local path
    #[arg(short, long, env = "ARCHETYPE_REPOSITORY")]
    pub repository: String,

    /// Tag, commit hash, or "latest" for HEAD
    #[arg(short, long, default_value = LATEST)]
    pub tag: String,

    /// Personal access token (http/https only)
    #[arg(short = 'T', long, env = "ARCHETYPE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Username for basic authentication (http/https only)
    #[arg(short = 'U', long)]
    pub username: Option<String>,

    /// Password for basic authentication, or the SSH key passphrase
    #[arg(short = 'P', long, env = "ARCHETYPE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Private SSH key file (ssh:// and git@ only)
    #[arg(short = 'K', long)]
    pub sshkey: Option<PathBuf>,

    /// Use ~/.ssh/id_rsa (or id_ed25519)
    #[arg(short = 'D', long)]
    pub with_default_ssh_key: bool,

    /// Use the running SSH agent
    #[arg(short = 'A', long)]
    pub with_ssh_agent: bool,

    /// HTTP(S) proxy URL (defaults to the environment's proxy settings)
    #[arg(long, env = "ARCHETYPE_PROXY")]
    pub proxy: Option<String>,
}

impl SourceArgs {
    /// The first applicable method wins: token, username and password,
    /// key file, default key, agent.
    pub fn auth(&self) -> Auth {
        if let Some(token) = &self.token {
            return Auth::Token {
                token: token.clone(),
            };
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            return Auth::Basic {
                username: username.clone(),
                password: password.clone(),
            };
        }
        if let Some(path) = &self.sshkey {
            return Auth::SshKey {
                path: path.clone(),
                passphrase: self.password.clone(),
            };
        }
        if self.with_default_ssh_key {
            return Auth::DefaultSshKey;
        }
        if self.with_ssh_agent {
            return Auth::SshAgent;
        }
        Auth::Anonymous
    }

    pub fn to_config(&self) -> anyhow::Result<SourceConfig> {
        let auth = self.auth();
        tracing::info!(method = auth.describe(), "selected authentication");
        Ok(SourceConfig::builder(&self.repository)
            .reference(&self.tag)
            .auth(auth)
            .proxy(self.proxy.clone())
            .build()?)
    }
}

/// Which archetype files take part.
#[derive(Args, Debug)]
pub struct FileArgs {
    /// Only process files matching this regular expression (repeatable;
    /// takes precedence over --exclude)
    #[arg(short, long = "include", value_name = "PATTERN")]
    pub includes: Vec<String>,

    /// Skip files matching this regular expression (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,
}

impl FileArgs {
    pub fn filter(&self) -> FileFilter {
        FileFilter::new(&self.includes, &self.excludes)
    }
}

#[derive(Args, Debug)]
pub struct EscapeArgs {
    /// Output directory; each file is written to <directory>/<file>
    #[arg(short, long, default_value = DEFAULT_ESCAPED_DIR)]
    pub directory: PathBuf,

    /// Files to process, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Apply {
            source,
            files,
            settings,
            directory,
            lenient,
        } => {
            commands::apply::run(&source, &files, settings.as_deref(), &directory, lenient)?;
        }
        Commands::Describe { source } => {
            commands::describe::run(&source)?;
        }
        Commands::Show { source, files } => {
            commands::show::run(&source, &files)?;
        }
        Commands::Prepare {
            source,
            files,
            directory,
        } => {
            commands::prepare::run(&source, &files, &directory)?;
        }
        Commands::Escape(args) => {
            commands::escape::run(&args, archetype_core::escape::Direction::Escape)?;
        }
        Commands::Unescape(args) => {
            commands::escape::run(&args, archetype_core::escape::Direction::Unescape)?;
        }
    }

    Ok(())
}
