//! Lay out the ordered scripts for the initrd.
//!
//! Each section gets a directory of `NN-name.ext` symlinks pointing back at
//! the catalogued scripts, plus a `<section>.list` file with the same order.

use anyhow::{Context, Result};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use super::catalog::Section;
use super::resolver::{LevelledScript, ScriptOrder};

/// Link name for a levelled script (`NN-name.ext`).
pub fn link_name(entry: &LevelledScript) -> String {
    match entry.script.extension() {
        Some(ext) => format!("{}.{}", entry.prefixed_name(), ext),
        None => entry.prefixed_name(),
    }
}

/// Install level-prefixed links for both sections under `dest`.
///
/// Existing entries in the section directories are removed first so stale
/// levels from an earlier run cannot linger.
pub fn install_links(order: &ScriptOrder, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();

    for section in Section::ALL {
        let dir = dest.join(section.as_str());
        clear_dir(&dir)?;

        for entry in order.section(section) {
            let target = absolute(&entry.script.path)?;
            let link = dir.join(link_name(entry));
            symlink(&target, &link).with_context(|| {
                format!("Failed to link {} -> {}", link.display(), target.display())
            })?;
            created.push(link);
        }

        let listing = dest.join(format!("{}.list", section));
        let mut content = order.listing(section).join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&listing, content)
            .with_context(|| format!("Failed to write {}", listing.display()))?;
    }

    Ok(created)
}

fn clear_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() && !path.is_symlink() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    }
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    Ok(cwd.join(path))
}
