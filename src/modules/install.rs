//! Kernel module installation - copying, metadata, depmod.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::resolver::ResolvedModuleSet;
use crate::process::Cmd;

/// Kernel metadata depmod needs next to the copied modules.
const MODULE_METADATA_FILES: &[&str] = &[
    "modules.order",
    "modules.builtin",
    "modules.builtin.modinfo",
];

/// Where module trees live below a root, in lookup order.
const MODULE_DIRS: &[&str] = &["lib/modules", "usr/lib/modules"];

/// Manifest file name inside `lib/modules/<kv>/`.
pub const MANIFEST_NAME: &str = "initrd.manifest";

/// What `install_modules` put into the staging root.
#[derive(Debug)]
pub struct InstallReport {
    pub installed: Vec<PathBuf>,
    pub manifest: PathBuf,
}

/// Copy every module of `set` into `staging`, keeping its path below
/// `module_root`.
///
/// A manifest entry missing on disk or failing to copy aborts the build.
/// So does an empty result when `expected` says modules were requested.
pub fn install_modules(
    set: &ResolvedModuleSet,
    kernel_version: &str,
    module_root: &Path,
    staging: &Path,
    expected: bool,
) -> Result<InstallReport> {
    println!("Installing kernel modules...");
    println!("  Kernel version: {}", kernel_version);

    let mut installed = Vec::new();
    for src in set.paths() {
        if !src.exists() {
            bail!(
                "Kernel module {} is in the manifest but not on disk.\n\
                 The module database and the module tree disagree; \
                 rerun depmod for {} on the source system.",
                src.display(),
                kernel_version
            );
        }
        let dst = staging.join(relative_to_root(src, module_root));
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(src, &dst)
            .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
        installed.push(dst);
    }

    if installed.is_empty() && expected {
        bail!("no modules have been installed");
    }

    let dst_modules = staging.join("lib/modules").join(kernel_version);
    fs::create_dir_all(&dst_modules)?;

    if let Some(src_modules) = find_module_dir(module_root, kernel_version) {
        for metadata_file in MODULE_METADATA_FILES {
            let src = src_modules.join(metadata_file);
            if src.exists() {
                fs::copy(&src, dst_modules.join(metadata_file))
                    .with_context(|| format!("Failed to copy {}", src.display()))?;
            }
        }
    }

    let manifest = dst_modules.join(MANIFEST_NAME);
    set.write_manifest(&manifest)?;

    println!("  Installed {} module(s)", installed.len());
    println!("{}", set.summary());

    Ok(InstallReport {
        installed,
        manifest,
    })
}

/// Regenerate the module map files (`modules.dep` and friends) for the image.
pub fn run_depmod(staging: &Path, kernel_version: &str) -> Result<()> {
    println!("  Running depmod...");
    Cmd::new("depmod")
        .args(["-a", "-b"])
        .arg_path(staging)
        .arg(kernel_version)
        .error_msg("depmod failed. Install: sudo dnf install kmod")
        .run()?;
    println!("  depmod completed successfully");
    Ok(())
}

/// Module tree for `kernel_version` below `root`, if any.
pub fn find_module_dir(root: &Path, kernel_version: &str) -> Option<PathBuf> {
    MODULE_DIRS
        .iter()
        .map(|dir| root.join(dir).join(kernel_version))
        .find(|dir| dir.is_dir())
}

fn relative_to_root(path: &Path, root: &Path) -> PathBuf {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.strip_prefix("/").unwrap_or(rel).to_path_buf()
}
