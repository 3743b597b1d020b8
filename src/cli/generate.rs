//! `deltarepo generate` — build or refresh a mirror's `deltarepos.xml.xz`

use std::path::Path;

use anyhow::Result;
use colored::Colorize;

use crate::generator::{self, Mode};

pub fn run(dir: &Path, update: bool, force: bool) -> Result<()> {
    let mode = if update { Mode::Update } else { Mode::Regenerate };
    let path = generator::generate(dir, mode, force)?;
    println!("{} {}", "Wrote:".green().bold(), path.display());
    Ok(())
}
