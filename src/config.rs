//! Configuration management for initrd-layout.
//!
//! Reads `INITRD_*` environment variables. `main` loads a `.env` file into
//! the environment first, so values there act as defaults that real
//! environment variables override.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::modules::probe::DEFAULT_SENTINEL;

pub const DEFAULT_SCRIPTS_DIR: &str = "/lib/initrd/scripts";
pub const DEFAULT_MODPROBE_CONFIG: &str = "/etc/modprobe.conf:/etc/modprobe.d";
pub const DEFAULT_STAGING: &str = "output/initrd-root";

/// initrd-layout configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `setup-*` and `boot-*` scripts
    pub scripts_dir: PathBuf,
    /// Stage declaration file (None = built-in stages)
    pub stages_file: Option<PathBuf>,
    /// Files or directories searched for `# INITRD:` directives
    pub modprobe_config: Vec<PathBuf>,
    /// Modules always requested (`-name` excludes)
    pub modules: Vec<String>,
    /// Target kernel version
    pub kernel_version: Option<String>,
    /// Root containing `lib/modules` for the target kernel
    pub module_root: PathBuf,
    /// Module probed to decide whether the kernel is a supported build
    pub sentinel_module: String,
    /// Staging directory the initrd tree is assembled in
    pub staging: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Self {
        Self::from_vars(std::env::vars().collect())
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(vars: HashMap<String, String>) -> Self {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let scripts_dir = PathBuf::from(get("INITRD_SCRIPTS_DIR").unwrap_or(DEFAULT_SCRIPTS_DIR));

        let stages_file = get("INITRD_STAGES").map(PathBuf::from);

        let modprobe_config = get("INITRD_MODPROBE_CONFIG")
            .unwrap_or(DEFAULT_MODPROBE_CONFIG)
            .split(':')
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();

        let modules = get("INITRD_MODULES")
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let kernel_version = get("INITRD_KERNEL_VERSION")
            .map(str::to_string)
            .or_else(running_kernel);

        let module_root = PathBuf::from(get("INITRD_MODULE_ROOT").unwrap_or("/"));

        let sentinel_module = get("INITRD_SENTINEL_MODULE")
            .unwrap_or(DEFAULT_SENTINEL)
            .to_string();

        let staging = PathBuf::from(get("INITRD_STAGING").unwrap_or(DEFAULT_STAGING));

        Self {
            scripts_dir,
            stages_file,
            modprobe_config,
            modules,
            kernel_version,
            module_root,
            sentinel_module,
            staging,
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  INITRD_SCRIPTS_DIR: {}", self.scripts_dir.display());
        match &self.stages_file {
            Some(path) => println!("  INITRD_STAGES: {}", path.display()),
            None => println!("  INITRD_STAGES: (built-in)"),
        }
        let sources: Vec<String> = self
            .modprobe_config
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        println!("  INITRD_MODPROBE_CONFIG: {}", sources.join(":"));
        println!("  INITRD_MODULES: {}", self.modules.join(" "));
        println!(
            "  INITRD_KERNEL_VERSION: {}",
            self.kernel_version.as_deref().unwrap_or("(unknown)")
        );
        println!("  INITRD_MODULE_ROOT: {}", self.module_root.display());
        println!("  INITRD_SENTINEL_MODULE: {}", self.sentinel_module);
        println!("  INITRD_STAGING: {}", self.staging.display());
        if self.scripts_dir.is_dir() {
            println!("  Scripts directory: FOUND");
        } else {
            println!("  Scripts directory: NOT FOUND");
        }
    }
}

/// Release of the running kernel.
fn running_kernel() -> Option<String> {
    fs::read_to_string("/proc/sys/kernel/osrelease")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
