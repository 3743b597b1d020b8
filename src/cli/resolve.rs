//! `deltarepo resolve` — compute the cheapest delta chain between two
//! content-hash fingerprints, across every configured mirror.

use anyhow::{bail, Result};
use colored::Colorize;

use crate::config::Config;
use crate::download::Downloader;
use crate::mirror::{self, Link};
use crate::solver::{self, Graph};

pub fn collect_links(config: &Config, strict: bool) -> Result<Vec<Link>> {
    let downloader = Downloader::new(config)?;
    let mut links = Vec::new();

    for mirror_cfg in &config.mirrors {
        if !mirror_cfg.enabled {
            continue;
        }
        match mirror::fetch_links(&downloader, &mirror_cfg.url, strict) {
            Ok(mut mirror_links) => links.append(&mut mirror_links),
            Err(err) => {
                tracing::warn!(mirror = %mirror_cfg.name, error = %err, "could not fetch mirror index");
            }
        }
    }

    if links.is_empty() && !config.mirrors.is_empty() {
        bail!("no delta links could be fetched from any configured mirror");
    }

    Ok(links)
}

pub fn run(source: &str, target: &str, hash_type: &str, whitelist: &[String], config: &Config) -> Result<()> {
    let links = collect_links(config, false)?;
    let graph = Graph::build(links, hash_type);
    let whitelist_set: std::collections::HashSet<String> = whitelist.iter().cloned().collect();

    let path = solver::shortest_path(&graph, source, target, &whitelist_set)?;

    println!(
        "{} {} hop(s), {} bytes",
        "Resolved path:".cyan().bold(),
        path.links.len(),
        path.total_cost(&whitelist_set)
    );
    for link in &path.links {
        println!(
            "  {} -> {}  ({} bytes)  {}",
            link.src().unwrap_or("?"),
            link.dst().unwrap_or("?"),
            link.cost(&whitelist_set),
            link.delta_repo_url(),
        );
    }

    Ok(())
}
