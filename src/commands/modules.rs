//! Modules command - resolves the kernel module manifest.

use anyhow::Result;

use super::kernel_version;
use crate::config::Config;
use crate::modules::{
    KernelSupportProbe, Kmod, ModuleDependencyDb, ModuleResolver, RequestedModules,
    ResolvedModuleSet,
};
use crate::report::Diagnostics;

/// Resolve `requested` for `kernel_version` with the configured module database.
pub fn resolve_modules(
    config: &Config,
    kernel_version: &str,
    requested: &RequestedModules,
    diags: &mut Diagnostics,
) -> Result<ResolvedModuleSet> {
    println!("Resolving kernel modules for {}...", kernel_version);

    let mut directives = ModuleDependencyDb::new();
    directives.load(&config.modprobe_config, diags)?;

    let kmod = Kmod::locate(Some(config.module_root.as_path()))?;
    let probe = KernelSupportProbe::new(config.sentinel_module.as_str());
    let resolver = ModuleResolver::new(&kmod, &directives, probe);

    Ok(resolver.resolve(kernel_version, requested, diags))
}

/// Execute the modules command.
pub fn cmd_modules(
    config: &Config,
    kernel: Option<String>,
    modules: Vec<String>,
    json: bool,
) -> Result<()> {
    let kernel_version = kernel_version(config, kernel)?;
    let entries = if modules.is_empty() {
        config.modules.clone()
    } else {
        modules
    };
    let requested = RequestedModules::parse(&entries);
    if requested.is_empty() {
        println!("No kernel modules requested.");
        return Ok(());
    }

    let mut diags = Diagnostics::new();
    let set = resolve_modules(config, &kernel_version, &requested, &mut diags)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&set)?);
    } else {
        print!("{}", set.manifest());
        println!("{}", set.summary());
    }

    diags.print_summary();
    Ok(())
}
