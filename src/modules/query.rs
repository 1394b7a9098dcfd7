//! Module database queries.
//!
//! The resolver only needs three answers about a kernel's modules, so they sit
//! behind [`ModuleQuery`]. [`Kmod`] answers them with `modinfo` and `modprobe`.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Questions asked of the module database for one kernel version.
pub trait ModuleQuery {
    /// Whether `module` carries platform-support metadata.
    ///
    /// `Err` means the query itself failed, not that the module is unsupported.
    fn is_supported(&self, kernel_version: &str, module: &str) -> Result<bool>;

    /// Files of `module` and everything it depends on, dependencies first.
    fn dependencies(
        &self,
        kernel_version: &str,
        module: &str,
        allow_unsupported: bool,
    ) -> Result<Vec<PathBuf>>;

    /// File of a bare module name, `None` if it has none (unknown or builtin).
    fn filename(&self, kernel_version: &str, module: &str) -> Result<Option<PathBuf>>;
}

/// `modinfo`/`modprobe` backed queries.
#[derive(Debug, Clone)]
pub struct Kmod {
    modinfo: PathBuf,
    modprobe: PathBuf,
    /// Alternate root holding `lib/modules` (`None` = the running system).
    root: Option<PathBuf>,
}

impl Kmod {
    /// Locate the kmod tools in PATH (and the sbin directories).
    pub fn locate(root: Option<&Path>) -> Result<Self> {
        Ok(Self {
            modinfo: find_tool("modinfo")?,
            modprobe: find_tool("modprobe")?,
            root: root.filter(|r| *r != Path::new("/")).map(Path::to_path_buf),
        })
    }

    pub fn with_tools(modinfo: PathBuf, modprobe: PathBuf, root: Option<PathBuf>) -> Self {
        Self {
            modinfo,
            modprobe,
            root,
        }
    }

    fn modinfo_field(&self, kernel_version: &str, field: &str, module: &str) -> Cmd {
        Cmd::new(&self.modinfo)
            .args(["-k", kernel_version])
            .opt_path("-b", self.root.as_deref())
            .args(["-F", field, module])
    }
}

fn find_tool(name: &str) -> Result<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Ok(path);
    }
    for dir in ["/usr/sbin", "/sbin"] {
        let candidate = Path::new(dir).join(name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }
    anyhow::bail!("{} not found. Install: sudo dnf install kmod", name)
}

impl ModuleQuery for Kmod {
    fn is_supported(&self, kernel_version: &str, module: &str) -> Result<bool> {
        let result = self
            .modinfo_field(kernel_version, "supported", module)
            .error_msg(format!("modinfo could not query {}", module))
            .run()?;
        Ok(!result.stdout_trimmed().is_empty())
    }

    fn dependencies(
        &self,
        kernel_version: &str,
        module: &str,
        allow_unsupported: bool,
    ) -> Result<Vec<PathBuf>> {
        let mut cmd = Cmd::new(&self.modprobe)
            .args(["--set-version", kernel_version])
            .opt_path("-d", self.root.as_deref())
            .args(["--ignore-install", "--show-depends"]);
        if allow_unsupported {
            cmd = cmd.arg("--allow-unsupported-modules");
        }
        let result = cmd
            .arg(module)
            .error_msg(format!("modprobe could not resolve {}", module))
            .run()?;
        Ok(parse_show_depends(&result.stdout))
    }

    fn filename(&self, kernel_version: &str, module: &str) -> Result<Option<PathBuf>> {
        let result = self
            .modinfo_field(kernel_version, "filename", module)
            .allow_fail()
            .run()
            .with_context(|| format!("modinfo could not look up {}", module))?;
        if !result.success() {
            return Ok(None);
        }
        Ok(parse_filename(result.stdout_trimmed()))
    }
}

/// Module paths from `modprobe --show-depends` output.
///
/// Lines look like `insmod /lib/modules/<kv>/kernel/fs/jbd2/jbd2.ko.xz [opts]`;
/// `builtin <name>` lines name modules compiled into the kernel and carry no
/// file.
pub fn parse_show_depends(output: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for line in output.lines() {
        let mut words = line.split_whitespace();
        if words.next() != Some("insmod") {
            continue;
        }
        if let Some(path) = words.next() {
            let path = PathBuf::from(path);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// First path from `modinfo -F filename` output, ignoring builtins.
pub fn parse_filename(output: &str) -> Option<PathBuf> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    if line == "(builtin)" || line.starts_with("name:") {
        return None;
    }
    Some(PathBuf::from(line))
}
