//! Out-of-band module requirements declared in modprobe configuration.
//!
//! Some modules need others that modprobe cannot know about (no symbol
//! dependency, only a runtime one). Those are declared in comments:
//!
//! ```text
//! # INITRD: usb-storage REQUIRES ehci-hcd
//! # INITRD: dm-crypt REQUIRES aes sha256
//! ```
//!
//! Malformed directives are reported per line and skipped.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::normalize;
use crate::report::{Diagnostics, Origin};

/// Comment tag that introduces a directive.
pub const DIRECTIVE_TAG: &str = "INITRD:";

const REQUIRES: &str = "REQUIRES";

/// Module name -> requirements, in declaration order.
#[derive(Debug, Default, Clone)]
pub struct ModuleDependencyDb {
    entries: HashMap<String, Vec<String>>,
    loaded: bool,
}

impl ModuleDependencyDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read directives from every source, once.
    ///
    /// A source is a file or a directory of `*.conf` files. Missing sources
    /// are skipped. Calling this again after a successful load does nothing.
    pub fn load(&mut self, sources: &[PathBuf], diags: &mut Diagnostics) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        for source in sources {
            for file in config_files(source, diags)? {
                match fs::read(&file) {
                    Ok(bytes) => self.parse_source(
                        &String::from_utf8_lossy(&bytes),
                        &file.display().to_string(),
                        diags,
                    ),
                    Err(e) => diags.warn(
                        Origin::Directive,
                        format!("{}: cannot read ({})", file.display(), e),
                    ),
                }
            }
        }
        self.loaded = true;
        Ok(())
    }

    /// Merge the directives found in one source's text.
    pub fn parse_source(&mut self, content: &str, source: &str, diags: &mut Diagnostics) {
        for (lineno, line) in content.lines().enumerate() {
            let Some(body) = directive_body(line) else {
                continue;
            };
            match parse_directive(body) {
                Ok((module, requirements)) => {
                    for requirement in requirements {
                        self.add(module, requirement);
                    }
                }
                Err(reason) => diags.warn(
                    Origin::Directive,
                    format!(
                        "{}:{}: malformed directive ({}): {}",
                        source,
                        lineno + 1,
                        reason,
                        line.trim()
                    ),
                ),
            }
        }
    }

    /// Record that `module` requires `requirement`. Repeats are ignored.
    pub fn add(&mut self, module: &str, requirement: &str) {
        let wanted = normalize(requirement);
        let list = self.entries.entry(normalize(module)).or_default();
        if !list.iter().any(|r| normalize(r) == wanted) {
            list.push(strip(requirement));
        }
    }

    /// Declared requirements of `module` (any spelling).
    pub fn requirements(&self, module: &str) -> &[String] {
        self.entries
            .get(&normalize(module))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn strip(name: &str) -> String {
    super::strip_suffix(name).to_string()
}

/// Text after `# INITRD:`, if the line is a directive.
fn directive_body(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix('#')?
        .trim_start()
        .strip_prefix(DIRECTIVE_TAG)
}

fn parse_directive(body: &str) -> std::result::Result<(&str, Vec<&str>), &'static str> {
    let mut words = body.split_whitespace();
    let module = words.next().ok_or("missing module name")?;
    if module == REQUIRES {
        return Err("missing module name");
    }
    match words.next() {
        Some(REQUIRES) => {}
        Some(_) => return Err("expected REQUIRES"),
        None => return Err("missing requirement"),
    }
    let requirements: Vec<&str> = words.collect();
    if requirements.is_empty() {
        return Err("missing requirement");
    }
    Ok((module, requirements))
}

fn is_conf(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "conf")
}

/// Config files of one source. Broken `*.conf` entries are reported, other
/// broken entries are not config and are skipped.
fn config_files(source: &Path, diags: &mut Diagnostics) -> Result<Vec<PathBuf>> {
    if source.is_file() {
        return Ok(vec![source.to_path_buf()]);
    }
    if !source.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(source)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to scan {}", source.display()));
            }
            Err(e) => {
                if e.path().is_some_and(is_conf) {
                    diags.warn(Origin::Directive, format!("skipping config entry: {}", e));
                }
                continue;
            }
        };
        if entry.file_type().is_file() && is_conf(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
