//! Capkit: inspect and edit synchronized workspaces in the local file store.
//!
//! # Usage
//!
//! ```text
//! capkit show <uid> [module] [--json]
//! capkit edit <uid> <module> <json>
//! capkit watch <uid>
//! capkit config
//! ```
//!
//! Global flags: `--home <dir>` (defaults to the user's home directory) and
//! `--debounce-ms <ms>` (overrides `~/.capkit/config.yaml`).

mod commands;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use capkit_core::ModuleName;
use capkit_sync::SyncConfig;

use commands::{edit::EditArgs, show::ShowArgs, watch::WatchArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "capkit",
    version,
    about = "Inspect and edit capkit workspaces through the sync coordinator",
    long_about = None,
)]
struct Cli {
    /// Directory holding `.capkit/` (defaults to the home directory).
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Override the debounce window, in milliseconds.
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show stored modules for a workspace, or one module decoded.
    Show(ShowArgs),

    /// Apply a JSON edit to one module through a sync session.
    Edit(EditArgs),

    /// Follow a workspace and print every change until ctrl-c.
    Watch(WatchArgs),

    /// Print the effective configuration as YAML.
    Config,
}

/// Resolved global options shared by every command.
pub struct CliEnv {
    pub home: PathBuf,
    pub config: SyncConfig,
}

impl CliEnv {
    fn resolve(home: Option<PathBuf>, debounce_ms: Option<u64>) -> Result<Self> {
        let home = match home {
            Some(home) => home,
            None => dirs::home_dir().context("could not determine home directory")?,
        };
        let mut config = SyncConfig::load_at(&home).context("failed to load configuration")?;
        if let Some(ms) = debounce_ms {
            config = config.with_debounce(Duration::from_millis(ms));
        }
        Ok(Self { home, config })
    }
}

// ---------------------------------------------------------------------------
// Shared module argument
// ---------------------------------------------------------------------------

/// Thin wrapper so clap can parse a [`ModuleName`] with a helpful error.
#[derive(Debug, Clone, Copy)]
pub struct ModuleArg(pub ModuleName);

impl FromStr for ModuleArg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ModuleName::from_str(s).map(Self).map_err(|_| {
            let known: Vec<&str> = ModuleName::ALL.iter().map(|m| m.as_str()).collect();
            format!("unknown module '{s}'; expected one of: {}", known.join(", "))
        })
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = CliEnv::resolve(cli.home, cli.debounce_ms)?;
    match cli.command {
        Commands::Show(args) => args.run(&env),
        Commands::Edit(args) => args.run(&env),
        Commands::Watch(args) => args.run(&env),
        Commands::Config => commands::config::run(&env),
    }
}
