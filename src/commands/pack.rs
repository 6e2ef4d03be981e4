//! @acp:module "Pack Command"
//! @acp:summary "Pack a bundle directory into an archive"
//! @acp:domain cli
//! @acp:layer handler

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use console::style;

use crate::package::{Package, ResourceLoader, CONFIG_FILE};

/// Options for the pack command
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub dir: PathBuf,
    /// Archive path; `<dir>.chlx` when absent
    pub output: Option<PathBuf>,
}

/// Execute the pack command
pub fn execute_pack(options: PackOptions) -> Result<()> {
    println!("{} Packing {}...", style("→").cyan(), options.dir.display());

    if !options.dir.is_dir() {
        bail!("{} is not a bundle directory", options.dir.display());
    }
    // Read the directory itself, even when an older archive sits beside it
    let mut package = Package::from_dir(&options.dir)
        .with_context(|| format!("Failed to read bundle {}", options.dir.display()))?;
    if package.get(CONFIG_FILE).is_none() {
        bail!("{} has no {}", options.dir.display(), CONFIG_FILE);
    }
    let output = options.output.unwrap_or_else(|| options.dir.clone());
    let written = package.save_as(&output)?;

    println!("{} Bundle written to {}", style("✓").green(), written.display());
    println!("  Files: {}", package.names().len());
    Ok(())
}
