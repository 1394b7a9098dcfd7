//! Transitive closure of the requested kernel modules.
//!
//! Two sources feed the closure: modprobe's own dependency chain for each
//! requested module, and the `# INITRD:` requirements it cannot see. The
//! result keeps discovery order, since depmod and the initrd load modules in
//! manifest order.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::directives::ModuleDependencyDb;
use super::probe::KernelSupportProbe;
use super::query::ModuleQuery;
use super::{name_from_path, normalize, strip_suffix};
use crate::report::{Diagnostics, Origin};

/// Top-level module request after applying `-module` exclusions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedModules {
    /// Modules to resolve, in request order, suffixes stripped.
    pub modules: Vec<String>,
    /// Normalized names excluded with a leading `-`.
    pub excluded: Vec<String>,
}

impl RequestedModules {
    /// Parse a request list such as `["ext4", "-usb-storage", "sd_mod.ko"]`.
    ///
    /// An exclusion removes every plain entry of the same module, wherever it
    /// appears in the list. Entries may also hold several space-separated
    /// names.
    pub fn parse<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = entries
            .into_iter()
            .flat_map(|e| {
                e.as_ref()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut excluded: Vec<String> = Vec::new();
        for word in &words {
            if let Some(name) = word.strip_prefix('-') {
                let key = normalize(name);
                if !key.is_empty() && !excluded.contains(&key) {
                    excluded.push(key);
                }
            }
        }

        let mut modules: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for word in &words {
            if word.starts_with('-') {
                continue;
            }
            let key = normalize(word);
            if key.is_empty() || excluded.contains(&key) || !seen.insert(key) {
                continue;
            }
            modules.push(strip_suffix(word).to_string());
        }

        Self { modules, excluded }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Ordered, duplicate-free list of module files for the image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedModuleSet {
    #[serde(rename = "modules")]
    paths: Vec<PathBuf>,
    #[serde(skip)]
    seen: HashSet<PathBuf>,
}

impl ResolvedModuleSet {
    /// Append `path` unless present. Returns whether it was new.
    fn insert(&mut self, path: PathBuf) -> bool {
        if self.seen.contains(&path) {
            return false;
        }
        self.seen.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.seen.contains(path)
    }

    /// True if a module of this name (any spelling) is in the set.
    pub fn contains_module(&self, name: &str) -> bool {
        let wanted = normalize(name);
        self.paths
            .iter()
            .any(|p| normalize(&name_from_path(p)) == wanted)
    }

    /// Bare module names, in manifest order.
    pub fn short_names(&self) -> Vec<String> {
        self.paths.iter().map(|p| name_from_path(p)).collect()
    }

    /// `Kernel Modules: a b c`
    pub fn summary(&self) -> String {
        format!("Kernel Modules: {}", self.short_names().join(" "))
    }

    /// One path per line.
    pub fn manifest(&self) -> String {
        let mut out = String::new();
        for path in &self.paths {
            out.push_str(&path.to_string_lossy());
            out.push('\n');
        }
        out
    }

    pub fn write_manifest(&self, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, self.manifest())
            .with_context(|| format!("Failed to write module manifest {}", dest.display()))
    }
}

/// Resolves requested modules against one module database.
pub struct ModuleResolver<'a> {
    query: &'a dyn ModuleQuery,
    directives: &'a ModuleDependencyDb,
    probe: KernelSupportProbe,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(
        query: &'a dyn ModuleQuery,
        directives: &'a ModuleDependencyDb,
        probe: KernelSupportProbe,
    ) -> Self {
        Self {
            query,
            directives,
            probe,
        }
    }

    /// Build the manifest for `requested` on `kernel_version`.
    ///
    /// Nothing here is fatal: modules that cannot be resolved are reported
    /// and the rest of the request still goes through.
    pub fn resolve(
        &self,
        kernel_version: &str,
        requested: &RequestedModules,
        diags: &mut Diagnostics,
    ) -> ResolvedModuleSet {
        let allow_unsupported = !self.probe.is_supported(self.query, kernel_version);
        if allow_unsupported {
            println!(
                "  Kernel {} has no support metadata, allowing unsupported modules",
                kernel_version
            );
        }

        let mut set = ResolvedModuleSet::default();
        for module in &requested.modules {
            match self
                .query
                .dependencies(kernel_version, module, allow_unsupported)
            {
                Ok(paths) if paths.is_empty() => {
                    diags.warn(Origin::Modules, format!("no dependencies found for {}", module));
                }
                Ok(paths) => {
                    for path in paths {
                        self.add(kernel_version, path, &mut set, diags);
                    }
                }
                Err(e) => {
                    diags.warn(
                        Origin::Modules,
                        format!("unable to resolve module {}: {:#}", module, e),
                    );
                }
            }
        }
        set
    }

    /// Append `path`, then anything the directives say its module requires.
    fn add(
        &self,
        kernel_version: &str,
        path: PathBuf,
        set: &mut ResolvedModuleSet,
        diags: &mut Diagnostics,
    ) {
        let name = name_from_path(&path);
        if !set.insert(path) {
            return;
        }

        for requirement in self.directives.requirements(&name) {
            match self.query.filename(kernel_version, requirement) {
                Ok(Some(path)) => self.add(kernel_version, path, set, diags),
                Ok(None) => diags.warn(
                    Origin::Modules,
                    format!("cannot find {} (required by {})", requirement, name),
                ),
                Err(e) => diags.warn(
                    Origin::Modules,
                    format!("cannot find {} (required by {}): {:#}", requirement, name, e),
                ),
            }
        }
    }
}
