//! Harbor CLI - inspect manifests and run application units under the
//! runtime host.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config_bridge;
mod theme;

use commands::{config, grants, run, validate};

/// Harbor - capability-gated runtime host
#[derive(Parser)]
#[command(name = "harbor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "HARBOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an app manifest
    Validate {
        /// Manifest file (JSON, or TOML by extension)
        manifest: PathBuf,
    },

    /// Show which requested capabilities an app would be granted
    Grants {
        /// Manifest file
        manifest: PathBuf,

        /// Evaluate as an administrator
        #[arg(long)]
        admin: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Spawn an app and supervise it until it stops or Ctrl+C
    Run {
        /// Manifest file
        manifest: PathBuf,

        /// Spawn as an administrator
        #[arg(long)]
        admin: bool,

        /// Override the apps root from configuration
        #[arg(long)]
        apps_root: Option<PathBuf>,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration
    Show {
        /// Output format (toml or json)
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
    /// Show the config file paths being checked
    Paths,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging comes from the config when it loads; commands that need the
    // config report its errors themselves.
    let loaded = harbor_config::Config::load(cli.config.as_deref()).ok();
    let log_config = config_bridge::log_config(loaded.as_ref(), cli.verbose);
    if let Err(e) = harbor_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Validate { manifest } => validate::run_validate(&manifest),
        Commands::Grants {
            manifest,
            admin,
            json,
        } => grants::run_grants(&manifest, cli.config.as_deref(), admin, json),
        Commands::Run {
            manifest,
            admin,
            apps_root,
        } => run::run_app(&manifest, cli.config.as_deref(), admin, apps_root).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show { format } => config::show(cli.config.as_deref(), &format),
            ConfigCommands::Paths => {
                config::paths(cli.config.as_deref());
                Ok(())
            },
        },
    }
}
