//! deltarepo - binary-delta publishing, discovery, and application for
//! package repository metadata snapshots.
//!
//! Built in Rust for safety and performance.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod apply;
mod builder;
mod cli;
mod compression;
mod config;
mod contenthash;
mod deltametadata;
mod download;
mod error;
mod gardener;
mod generator;
mod hashalgo;
mod index;
mod mirror;
mod plugin;
mod probe;
mod solver;

use cli::Commands;

pub use error::{DeltaRepoError, Result};

/// Binary-delta publishing, discovery, and application for repository snapshots
#[derive(Parser)]
#[command(name = "deltarepo")]
#[command(author = "Friendly Society of Corvids")]
#[command(version)]
#[command(about = "Binary-delta publishing, discovery, and application for repository snapshots", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with_target(false)
        .init();

    // Load configuration
    let config = config::Config::load(cli.config.as_deref())?;

    // Execute command
    cli::execute(cli.command, &config)
}
