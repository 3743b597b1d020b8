//! `deltarepo mirror-fetch` — list the delta links one mirror advertises

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::download::Downloader;
use crate::mirror;

pub fn run(url: &str, strict: bool, config: &Config) -> Result<()> {
    let downloader = Downloader::new(config)?;
    let links = mirror::fetch_links(&downloader, url, strict)?;

    println!("{} {} ({} links)", "Mirror:".cyan().bold(), url, links.len());
    for link in &links {
        println!(
            "  {} -> {} [{}]  {} bytes  {}",
            link.src().unwrap_or("?"),
            link.dst().unwrap_or("?"),
            link.contenthash_type().unwrap_or("?"),
            link.record.size_total(),
            link.delta_repo_url(),
        );
    }

    Ok(())
}
