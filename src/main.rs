//! Binary entry point for vitedb.
//!
//! This binary provides the CLI interface for the vitedb link store.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use vitedb::cli::{cmd_init, cmd_resolve, cmd_shorten, cmd_stats, cmd_tables, parse_link_ref};
use vitedb::config::VitedbConfig;
use vitedb::observability::{self, InitOptions};

/// Environment variable naming a config file to load instead of the default.
const CONFIG_PATH_ENV: &str = "VITEDB_CONFIG_PATH";

/// vitedb - a click-counting link store for URL shortening.
#[derive(Parser)]
#[command(name = "vitedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the database file (overrides the configuration).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the database and the links table.
    Init,

    /// Store a URL and print its id and short code.
    Shorten {
        /// Destination URL, stored as given.
        url: String,
    },

    /// Count a click and print the destination URL.
    Resolve {
        /// Link id, or base62 short code.
        link: String,

        /// Treat the argument as a short code even if it is all digits.
        #[arg(long)]
        code: bool,
    },

    /// Show a link's URL and click count.
    Stats {
        /// Link id, or base62 short code.
        link: String,

        /// Treat the argument as a short code even if it is all digits.
        #[arg(long)]
        code: bool,

        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// List tables in the database.
    Tables,
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };

    let env_filter = std::env::var("RUST_LOG").ok();
    if let Err(e) = observability::init_from_config(
        &config.logging,
        InitOptions {
            verbose: cli.verbose,
            env_filter: env_filter.as_deref(),
        },
    ) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database_path.clone());

    match run_command(cli.command, &db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command against `db_path`.
fn run_command(command: Commands, db_path: &Path) -> Result<()> {
    let mut out = io::stdout().lock();

    match command {
        Commands::Init => cmd_init(db_path, &mut out).context("init failed")?,
        Commands::Shorten { url } => {
            cmd_shorten(db_path, &url, &mut out).context("shorten failed")?;
        },
        Commands::Resolve { link, code } => {
            let id = parse_link_ref(&link, code)?;
            cmd_resolve(db_path, id, &mut out)
                .with_context(|| format!("resolve {link} failed"))?;
        },
        Commands::Stats { link, code, json } => {
            let id = parse_link_ref(&link, code)?;
            cmd_stats(db_path, id, json, &mut out)
                .with_context(|| format!("stats {link} failed"))?;
        },
        Commands::Tables => {
            cmd_tables(db_path, &mut out).context("listing tables failed")?;
        },
    }

    out.flush().context("flushing output")
}

/// Loads configuration.
fn load_config(path: Option<&Path>) -> Result<VitedbConfig> {
    // If a path is provided, load from that file
    if let Some(config_path) = path {
        return VitedbConfig::load_from_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()));
    }

    // Environment override for config path
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        if !config_path.trim().is_empty() {
            return VitedbConfig::load_from_file(Path::new(&config_path))
                .with_context(|| format!("loading {config_path} (from {CONFIG_PATH_ENV})"));
        }
    }

    // Otherwise, load from default location
    VitedbConfig::load_default().context("loading default configuration")
}
