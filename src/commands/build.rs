//! Build command - orders scripts and installs modules into the staging tree.

use anyhow::Result;
use std::path::PathBuf;

use super::kernel_version;
use super::modules::resolve_modules;
use super::order::{load_stages, order_scripts};
use crate::config::Config;
use crate::modules::install::{install_modules, run_depmod};
use crate::modules::RequestedModules;
use crate::report::Diagnostics;
use crate::scripts::install_links;
use crate::timing::Timer;

/// Script links are installed here, relative to the staging root.
pub const SCRIPT_LINK_DIR: &str = "lib/initrd";

/// Execute the build command.
pub fn cmd_build(config: &Config, kernel: Option<String>, staging: Option<PathBuf>) -> Result<()> {
    println!("=== Building initrd layout ===\n");

    let kernel_version = kernel_version(config, kernel)?;
    let staging = staging.unwrap_or_else(|| config.staging.clone());
    let mut diags = Diagnostics::new();

    let timer = Timer::start("Script order");
    let stages = load_stages(config.stages_file.as_deref())?;
    let order = order_scripts(&config.scripts_dir, &stages, &mut diags)?;
    let links = install_links(&order, &staging.join(SCRIPT_LINK_DIR))?;
    println!("  Installed {} script link(s)", links.len());
    timer.finish();

    // configured modules first; a `-name` there also drops script requests
    let mut entries = config.modules.clone();
    entries.extend(order.declared_modules());
    let requested = RequestedModules::parse(&entries);

    let timer = Timer::start("Module resolution");
    let set = resolve_modules(config, &kernel_version, &requested, &mut diags)?;
    timer.finish();

    let timer = Timer::start("Module installation");
    let report = install_modules(
        &set,
        &kernel_version,
        &config.module_root,
        &staging,
        !requested.is_empty(),
    )?;
    if !report.installed.is_empty() {
        run_depmod(&staging, &kernel_version)?;
    }
    timer.finish();

    println!("\n=== initrd layout complete ===");
    println!("  Staging: {}", staging.display());
    println!("  Manifest: {}", report.manifest.display());
    diags.print_summary();

    Ok(())
}
