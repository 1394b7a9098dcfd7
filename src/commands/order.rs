//! Order command - levels the initrd scripts.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::report::Diagnostics;
use crate::scripts::{self, install_links, ScriptCatalog, ScriptOrder};
use crate::stages::StageTable;

/// Options for the order command.
pub struct OrderOptions {
    pub scripts_dir: Option<PathBuf>,
    pub stages_file: Option<PathBuf>,
    pub install: Option<PathBuf>,
    pub json: bool,
}

/// Load the configured stage table, or the built-in one.
pub fn load_stages(stages_file: Option<&Path>) -> Result<StageTable> {
    match stages_file {
        Some(path) => StageTable::load(path),
        None => Ok(StageTable::builtin()),
    }
}

/// Scan and level the scripts in `scripts_dir`.
pub fn order_scripts(
    scripts_dir: &Path,
    stages: &StageTable,
    diags: &mut Diagnostics,
) -> Result<ScriptOrder> {
    println!("Ordering scripts in {}...", scripts_dir.display());
    let catalog = ScriptCatalog::scan(scripts_dir, stages, diags)?;
    println!("  Found {} script(s)", catalog.len());
    let order = scripts::resolve(&catalog, diags)?;
    Ok(order)
}

/// Execute the order command.
pub fn cmd_order(config: &Config, opts: OrderOptions) -> Result<()> {
    let scripts_dir = opts.scripts_dir.unwrap_or_else(|| config.scripts_dir.clone());
    let stages_file = opts.stages_file.or_else(|| config.stages_file.clone());
    let stages = load_stages(stages_file.as_deref())?;

    let mut diags = Diagnostics::new();
    let order = order_scripts(&scripts_dir, &stages, &mut diags)?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&order)?);
    } else {
        order.print();
    }

    if let Some(dest) = opts.install {
        let links = install_links(&order, &dest)?;
        println!("Installed {} link(s) under {}", links.len(), dest.display());
    }

    diags.print_summary();
    Ok(())
}
