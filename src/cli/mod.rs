//! Command-line interface for deltarepo

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

mod build;
mod clean;
mod generate;
mod mirror;
mod probe;
mod resolve;
mod update;

#[derive(Subcommand)]
pub enum Commands {
    /// Probe a local snapshot's repomd.xml and report what it declares
    Probe {
        /// Path to the snapshot directory (contains repodata/)
        path: std::path::PathBuf,

        /// Also compute the content hash from the primary document
        #[arg(long)]
        contenthash: bool,

        /// Content-hash algorithm (sha256, sha512, sha1, md5, legacy "sha")
        #[arg(long, default_value = "sha256")]
        hash_algorithm: String,
    },

    /// Fetch a mirror's deltarepos.xml.xz and list the delta links it advertises
    MirrorFetch {
        /// Mirror base URL
        url: String,

        /// Reject invalid records instead of skipping them
        #[arg(long)]
        strict: bool,
    },

    /// Resolve the cheapest chain of deltas from a source to a target fingerprint
    Resolve {
        /// Source content hash
        #[arg(long)]
        source: String,

        /// Target content hash
        #[arg(long)]
        target: String,

        /// Content-hash algorithm the links must match
        #[arg(long, default_value = "sha256")]
        hash_type: String,

        /// Only count these metadata document types toward cost (repeatable); empty means all
        #[arg(long = "whitelist")]
        whitelist: Vec<String>,
    },

    /// Resolve a path and apply it to a local snapshot
    Update {
        /// Path to the local snapshot directory
        snapshot: std::path::PathBuf,

        /// Target content hash to update to
        #[arg(long)]
        target: String,

        /// Only download/apply these metadata document types (repeatable); empty means all
        #[arg(long = "whitelist")]
        whitelist: Vec<String>,

        /// Write the result here instead of back onto the snapshot path
        #[arg(long)]
        output_dir: Option<std::path::PathBuf>,
    },

    /// Build a deltarepos.xml.xz for a mirror directory of delta repositories
    Generate {
        /// Mirror directory to walk
        dir: std::path::PathBuf,

        /// Add newly discovered repositories and drop missing ones instead of rebuilding from scratch
        #[arg(long)]
        update: bool,

        /// Tolerate invalid delta repositories instead of aborting
        #[arg(long)]
        force: bool,
    },

    /// Build a single DeltaRecord from an on-disk delta repository and print it
    BuildRecord {
        /// Path to the delta repository
        path: std::path::PathBuf,

        /// Path prefix to strip from the record's location_href
        #[arg(long)]
        strip_prefix: Option<std::path::PathBuf>,
    },

    /// Apply retention rules to a cache directory of materialised snapshots
    Clean {
        /// Cache directory to garden
        dir: std::path::PathBuf,

        /// Keep at most this many snapshots (newest first)
        #[arg(long)]
        max_num: Option<i64>,

        /// Drop snapshots older than this many seconds
        #[arg(long)]
        max_age: Option<i64>,
    },
}

pub fn execute(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Probe { path, contenthash, hash_algorithm } => {
            probe::run(&path, contenthash, &hash_algorithm)
        }
        Commands::MirrorFetch { url, strict } => mirror::run(&url, strict, config),
        Commands::Resolve { source, target, hash_type, whitelist } => {
            resolve::run(&source, &target, &hash_type, &whitelist, config)
        }
        Commands::Update { snapshot, target, whitelist, output_dir } => {
            update::run(&snapshot, &target, &whitelist, output_dir.as_deref(), config)
        }
        Commands::Generate { dir, update, force } => generate::run(&dir, update, force),
        Commands::BuildRecord { path, strip_prefix } => build::run(&path, strip_prefix.as_deref()),
        Commands::Clean { dir, max_num, max_age } => clean::run(&dir, max_num, max_age, config),
    }
}
