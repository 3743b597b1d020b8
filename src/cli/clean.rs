//! `deltarepo clean` — apply retention rules to a cache directory of
//! materialised snapshots

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::config::Config;
use crate::gardener::{self, RetentionPolicy};

pub fn run(dir: &Path, max_num: Option<i64>, max_age: Option<i64>, config: &Config) -> Result<()> {
    let policy = RetentionPolicy {
        max_num: max_num.or(config.gardener.max_num),
        max_age: max_age.or(config.gardener.max_age),
    };

    let now = chrono::Utc::now().timestamp();
    let result = gardener::clear(dir, policy, now)?;

    for path in &result.removed {
        println!("  {} {}", "removed:".red(), path.display());
    }
    for (path, error) in &result.errors {
        println!("  {} {} - {}", "!".yellow(), path.display(), error);
    }
    println!(
        "{} {} removed, {} retained",
        "Done:".green().bold(),
        result.removed.len(),
        result.retained.len()
    );

    Ok(())
}
