//! `deltarepo update` — resolve a path from the local snapshot's own
//! fingerprint to `target` and apply it in one step.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::apply::{ApplyEngine, ApplyOptions};
use crate::cli::resolve::collect_links;
use crate::config::Config;
use crate::download::Downloader;
use crate::hashalgo::HashAlgorithm;
use crate::plugin::PluginRegistry;
use crate::probe::SnapshotProbe;
use crate::solver::{self, Fingerprint, Graph};

pub fn run(
    snapshot: &Path,
    target: &str,
    whitelist: &[String],
    output_dir: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let hash_algorithm = HashAlgorithm::parse(&config.hash.algorithm)?;
    let probe = SnapshotProbe::probe(snapshot, Some(hash_algorithm))?;
    let whitelist_set: std::collections::HashSet<String> = whitelist.iter().cloned().collect();

    let links = collect_links(config, false)?;

    let source = match &probe.computed_contenthash {
        Some(hash) => hash.clone(),
        None => solver::guess_fingerprint(
            &links,
            &Fingerprint {
                revision: probe.revision.as_deref(),
                timestamp: probe.timestamp,
            },
            hash_algorithm.canonical_name(),
        )
        .context("could not determine the local snapshot's content hash; repomd.xml declares none and no link's revision/timestamp matched")?,
    };

    println!("{} {} -> {}", "Updating:".cyan().bold(), source, target);

    let graph = Graph::build(links, hash_algorithm.canonical_name());
    let path = solver::shortest_path(&graph, &source, target, &whitelist_set)?;
    println!(
        "  resolved {} hop(s), {} bytes",
        path.links.len(),
        path.total_cost(&whitelist_set)
    );

    let downloader = Downloader::new(config)?;
    let registry = PluginRegistry::new();
    let engine = ApplyEngine::new(&downloader, &registry);

    let options = ApplyOptions {
        whitelist: whitelist_set,
        ignore_missing: true,
        output_dir: output_dir.map(Path::to_path_buf),
    };

    let result = engine.apply(snapshot, &path, &options)?;
    println!("  {} {}", "updated:".green().bold(), result.display());

    Ok(())
}
