//! `deltarepo build-record` — build a single `DeltaRecord` from an on-disk
//! delta repository and print it, without touching any mirror index.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::builder;

pub fn run(path: &Path, strip_prefix: Option<&Path>) -> Result<()> {
    let record = builder::build_record(path, strip_prefix)?;

    println!("{}", "DeltaRecord".cyan().bold());
    println!("  location_href:   {}", record.location_href);
    println!(
        "  contenthash:     {} -> {}",
        record.contenthash_src.as_deref().unwrap_or("-"),
        record.contenthash_dst.as_deref().unwrap_or("-"),
    );
    println!("  contenthash_type: {}", record.contenthash_type.as_deref().unwrap_or("-"));
    println!(
        "  revision:        {} -> {}",
        record.revision_src.as_deref().unwrap_or("-"),
        record.revision_dst.as_deref().unwrap_or("-"),
    );
    println!(
        "  timestamp:       {} -> {}",
        record.timestamp_src.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
        record.timestamp_dst.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()),
    );
    println!("  size_total:      {} bytes", record.size_total());
    println!("  data types:      {}", record.data.keys().cloned().collect::<Vec<_>>().join(", "));

    Ok(())
}
