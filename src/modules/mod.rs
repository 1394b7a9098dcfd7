//! Kernel module resolution for the initrd.
//!
//! - `directives` - `# INITRD: foo REQUIRES bar` declarations from modprobe config
//! - `probe` - is the target kernel a supported build?
//! - `query` - the modprobe/modinfo collaborator
//! - `resolver` - transitive closure of requested modules
//! - `install` - copy modules into the staging root and run depmod

pub mod directives;
pub mod install;
pub mod probe;
pub mod query;
pub mod resolver;

pub use directives::ModuleDependencyDb;
pub use install::install_modules;
pub use probe::KernelSupportProbe;
pub use query::{Kmod, ModuleQuery};
pub use resolver::{ModuleResolver, RequestedModules, ResolvedModuleSet};

use std::path::Path;

/// Suffixes a module file or name may carry.
const MODULE_SUFFIXES: &[&str] = &[".ko.xz", ".ko.zst", ".ko.gz", ".ko", ".o"];

/// Strip any module-file suffix (`ext4.ko.xz` -> `ext4`).
pub fn strip_suffix(name: &str) -> &str {
    for suffix in MODULE_SUFFIXES {
        if let Some(stem) = name.strip_suffix(suffix) {
            return stem;
        }
    }
    name
}

/// Key used for all module set and map lookups.
///
/// The kernel treats `-` and `_` in module names as the same character.
pub fn normalize(name: &str) -> String {
    strip_suffix(name.trim()).replace('-', "_")
}

/// Bare module name of a module file path.
pub fn name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    strip_suffix(&file_name).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_suffix() {
        assert_eq!(strip_suffix("ext4.ko.xz"), "ext4");
        assert_eq!(strip_suffix("ext4.ko"), "ext4");
        assert_eq!(strip_suffix("loop.o"), "loop");
        assert_eq!(strip_suffix("usb-storage"), "usb-storage");
    }

    #[test]
    fn test_normalize_dash_and_underscore() {
        assert_eq!(normalize("usb-storage"), normalize("usb_storage"));
        assert_eq!(normalize("dm-mod.ko"), "dm_mod");
    }

    #[test]
    fn test_name_from_path() {
        let path = Path::new("/lib/modules/6.1.0/kernel/fs/jbd2/jbd2.ko.zst");
        assert_eq!(name_from_path(path), "jbd2");
    }
}
