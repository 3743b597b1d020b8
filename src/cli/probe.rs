//! `deltarepo probe` — inspect a local snapshot's repomd.xml

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::hashalgo::HashAlgorithm;
use crate::probe::SnapshotProbe;

pub fn run(path: &Path, contenthash: bool, hash_algorithm: &str) -> Result<()> {
    let algo = if contenthash {
        Some(HashAlgorithm::parse(hash_algorithm)?)
    } else {
        None
    };

    let probe = SnapshotProbe::probe(path, algo)?;

    println!("{}", "Snapshot".cyan().bold());
    println!("  path:       {}", probe.path.display());
    println!("  revision:   {}", probe.revision.as_deref().unwrap_or("-"));
    println!("  timestamp:  {}", probe.timestamp.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()));
    println!("  repomd:     {} bytes", probe.repomd_size);
    println!("  declared:   {}", probe.declared_types.join(", "));
    println!("  present:    {}", probe.present_types.join(", "));
    if let Some(hash) = &probe.computed_contenthash {
        println!("  contenthash ({hash_algorithm}): {hash}");
    }

    Ok(())
}
