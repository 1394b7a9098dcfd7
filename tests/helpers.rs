//! Shared test utilities for initrd-layout tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use initrd_layout::modules::{normalize, ModuleQuery};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const KERNEL: &str = "6.1.0-test";

/// Test environment with temporary script, module and staging trees.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Script directory (setup-*/boot-* files)
    pub scripts: PathBuf,
    /// Fake system root holding lib/modules/<kv>
    pub module_root: PathBuf,
    /// Staging directory (build destination)
    pub staging: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let scripts = base.join("scripts");
        let module_root = base.join("sysroot");
        let staging = base.join("staging");

        fs::create_dir_all(&scripts).expect("Failed to create scripts dir");
        fs::create_dir_all(module_root.join("lib/modules").join(KERNEL))
            .expect("Failed to create module dir");

        Self {
            _temp_dir: temp_dir,
            scripts,
            module_root,
            staging,
        }
    }

    /// Write a script with the given body into the script directory.
    pub fn script(&self, file_name: &str, body: &str) -> PathBuf {
        let path = self.scripts.join(file_name);
        fs::write(&path, format!("#!/bin/bash\n{}\necho {}\n", body, file_name))
            .expect("Failed to write script");
        path
    }

    /// Create a fake module file below the module root and return its path.
    pub fn module_file(&self, rel: &str) -> PathBuf {
        let path = self
            .module_root
            .join("lib/modules")
            .join(KERNEL)
            .join("kernel")
            .join(rel);
        fs::create_dir_all(path.parent().unwrap()).expect("Failed to create module parent");
        fs::write(&path, format!("module {}", rel)).expect("Failed to write module");
        path
    }
}

/// In-memory module database standing in for modprobe/modinfo.
#[derive(Default)]
pub struct FakeModules {
    /// Dependency chains keyed by normalized module name
    pub chains: HashMap<String, Vec<PathBuf>>,
    /// File paths for bare lookups
    pub files: HashMap<String, PathBuf>,
    /// Modules that only resolve when unsupported modules are allowed
    pub unsupported_only: Vec<String>,
    /// Answer for the support probe (None = query fails)
    pub supported: Option<bool>,
    /// Every dependencies() call as (module, allow_unsupported)
    pub calls: RefCell<Vec<(String, bool)>>,
}

impl FakeModules {
    pub fn supported() -> Self {
        Self {
            supported: Some(true),
            ..Default::default()
        }
    }

    /// Register a module whose chain is `deps` followed by itself.
    pub fn module(mut self, name: &str, deps: &[&str]) -> Self {
        let mut chain: Vec<PathBuf> = deps.iter().map(|d| fake_path(d)).collect();
        chain.push(fake_path(name));
        self.chains.insert(normalize(name), chain);
        self.files.insert(normalize(name), fake_path(name));
        for dep in deps {
            self.files.insert(normalize(dep), fake_path(dep));
        }
        self
    }

    /// Register a module only reachable with --allow-unsupported-modules.
    pub fn unsupported_module(mut self, name: &str) -> Self {
        self = self.module(name, &[]);
        self.unsupported_only.push(normalize(name));
        self
    }

    /// Register a file for a bare name without a dependency chain.
    pub fn file(mut self, name: &str) -> Self {
        self.files.insert(normalize(name), fake_path(name));
        self
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.borrow().clone()
    }
}

impl ModuleQuery for FakeModules {
    fn is_supported(&self, _kernel_version: &str, _module: &str) -> Result<bool> {
        match self.supported {
            Some(answer) => Ok(answer),
            None => bail!("modinfo: cannot query"),
        }
    }

    fn dependencies(
        &self,
        _kernel_version: &str,
        module: &str,
        allow_unsupported: bool,
    ) -> Result<Vec<PathBuf>> {
        self.calls
            .borrow_mut()
            .push((module.to_string(), allow_unsupported));
        let key = normalize(module);
        if self.unsupported_only.contains(&key) && !allow_unsupported {
            bail!("module {} is unsupported", module);
        }
        match self.chains.get(&key) {
            Some(chain) => Ok(chain.clone()),
            None => bail!("FATAL: Module {} not found", module),
        }
    }

    fn filename(&self, _kernel_version: &str, module: &str) -> Result<Option<PathBuf>> {
        Ok(self.files.get(&normalize(module)).cloned())
    }
}

/// Path a fake module lives at.
pub fn fake_path(name: &str) -> PathBuf {
    PathBuf::from(format!("/lib/modules/{}/kernel/{}.ko", KERNEL, name))
}

/// Assert that a file contains expected content.
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|_| panic!("Failed to read file: {}", path.display()));
    assert!(
        content.contains(expected),
        "File {} does not contain expected content.\nExpected to find: {}\nActual content: {}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "Expected file to exist: {}", path.display());
}

/// Assert that a symlink exists and points to the expected target.
pub fn assert_symlink(path: &Path, expected_target: &Path) {
    assert!(
        path.is_symlink(),
        "Expected symlink at {}, but it's not a symlink",
        path.display()
    );
    let target = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(
        target,
        expected_target,
        "Symlink {} points to {:?}, expected {:?}",
        path.display(),
        target,
        expected_target
    );
}
