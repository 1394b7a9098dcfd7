//! Clean command - removes the staging tree.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use crate::config::Config;

/// Execute the clean command.
pub fn cmd_clean(config: &Config, staging: Option<PathBuf>) -> Result<()> {
    let staging = staging.unwrap_or_else(|| config.staging.clone());
    if staging.exists() {
        println!("Removing {}...", staging.display());
        fs::remove_dir_all(&staging)
            .with_context(|| format!("Failed to remove {}", staging.display()))?;
    } else {
        println!("Nothing to clean.");
    }
    Ok(())
}
