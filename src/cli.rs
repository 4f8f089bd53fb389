use crate::config::DEFAULT_CONFIG_FILE;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// One-shot WordPress installation bootstrap.
#[derive(Debug, Parser)]
#[command(name = "wp-bootstrap", version, about)]
pub struct Cli {
    /// TOML configuration file; missing files are ignored.
    #[arg(long, env = "WP_BOOTSTRAP_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run the installer and apply the seed overrides (default).
    Install,
    /// Download the latest release tarball unless the local copy is current.
    Fetch,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Install)
    }
}
