//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `order` - Level and list the initrd scripts
//! - `modules` - Resolve the kernel module manifest
//! - `build` - Run the whole pipeline into the staging tree
//! - `show` - Display configuration and stages
//! - `clean` - Remove the staging tree

pub mod build;
pub mod clean;
pub mod modules;
pub mod order;
pub mod show;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use modules::cmd_modules;
pub use order::cmd_order;
pub use show::cmd_show;

use anyhow::{bail, Result};

use crate::config::Config;

/// Kernel version from the command line, else from configuration.
pub(crate) fn kernel_version(config: &Config, flag: Option<String>) -> Result<String> {
    match flag.or_else(|| config.kernel_version.clone()) {
        Some(kv) => Ok(kv),
        None => bail!(
            "Kernel version unknown.\n\
             Pass --kernel or set INITRD_KERNEL_VERSION."
        ),
    }
}
