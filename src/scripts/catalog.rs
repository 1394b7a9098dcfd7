//! Script catalog - scans the script directory and reads `#%` markers.
//!
//! Scripts are named `<section>-<name>.<ext>`. Only the `setup` and `boot`
//! sections exist; anything else in the directory is not an initrd script
//! and is skipped without comment.
//!
//! # Markers
//!
//! ```text
//! #%stage: filesystem
//! #%depends: udev lvm2
//! #%provides: rootfs
//! #%modules: ext4 dm-mod
//! ```
//!
//! The first `stage` marker wins. `depends`, `provides` and `modules` markers
//! accumulate. Scripts without a stage marker land in the table's last stage.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::report::{Diagnostics, Origin};
use crate::stages::StageTable;

/// Which half of the initrd a script belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    /// Run by the builder while assembling the image.
    Setup,
    /// Run by the initrd at boot.
    Boot,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::Setup, Section::Boot];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Setup => "setup",
            Section::Boot => "boot",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "setup" => Some(Section::Setup),
            "boot" => Some(Section::Boot),
            _ => None,
        }
    }

    /// Level a script starts from before dependencies raise it.
    ///
    /// Setup levels climb with the stage, boot levels descend from 91, so the
    /// two ranges never interleave.
    pub fn base_level(self, stage_ordinal: usize) -> i32 {
        let ordinal = stage_ordinal as i32;
        match self {
            Section::Setup => ordinal * 10 + 1,
            Section::Boot => 91 - ordinal * 10,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `<section>-<name>.<ext>` into its section and name.
pub fn split_script_name(file_name: &str) -> Option<(Section, &str)> {
    let (prefix, rest) = file_name.split_once('-')?;
    let section = Section::from_prefix(prefix)?;
    let (name, ext) = rest.rsplit_once('.')?;
    if name.is_empty() || ext.is_empty() {
        return None;
    }
    Some((section, name))
}

/// Raw marker values read from a script body, before stage validation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Markers {
    pub stage: Option<String>,
    pub depends: Vec<String>,
    pub provides: Vec<String>,
    pub modules: Vec<String>,
}

impl Markers {
    pub fn parse(content: &str) -> Self {
        let mut markers = Self::default();
        for line in content.lines() {
            let Some(marker) = line.strip_prefix("#%") else {
                continue;
            };
            let Some((key, value)) = marker.split_once(':') else {
                continue;
            };
            let words = value.split_whitespace().map(str::to_string);
            match key.trim() {
                "stage" => {
                    if markers.stage.is_none() {
                        markers.stage = value.split_whitespace().next().map(str::to_string);
                    }
                }
                "depends" => push_unique(&mut markers.depends, words),
                "provides" => push_unique(&mut markers.provides, words),
                "modules" => push_unique(&mut markers.modules, words),
                _ => {}
            }
        }
        markers
    }
}

fn push_unique(list: &mut Vec<String>, words: impl Iterator<Item = String>) {
    for word in words {
        if !list.contains(&word) {
            list.push(word);
        }
    }
}

/// A catalogued initrd script.
#[derive(Debug, Clone, Serialize)]
pub struct Script {
    pub section: Section,
    pub name: String,
    pub path: PathBuf,
    pub stage: String,
    pub stage_ordinal: usize,
    /// Capabilities this script needs.
    pub depends: Vec<String>,
    /// Capabilities this script satisfies. Always starts with its own name.
    pub provides: Vec<String>,
    /// Kernel modules the script wants in the image.
    pub modules: Vec<String>,
}

impl Script {
    /// Build a script from its markers. Fails with a message if the declared
    /// stage is not in the table.
    pub fn from_markers(
        section: Section,
        name: &str,
        path: PathBuf,
        markers: Markers,
        stages: &StageTable,
    ) -> std::result::Result<Self, String> {
        let stage = markers
            .stage
            .unwrap_or_else(|| stages.default_stage().to_string());
        let stage_ordinal = stages.ordinal(&stage).ok_or_else(|| {
            format!(
                "{}-{}: unknown stage '{}' (known: {})",
                section,
                name,
                stage,
                stages.names().join(" ")
            )
        })?;

        let mut provides = vec![name.to_string()];
        push_unique(&mut provides, markers.provides.into_iter());

        Ok(Self {
            section,
            name: name.to_string(),
            path,
            stage,
            stage_ordinal,
            depends: markers.depends,
            provides,
            modules: markers.modules,
        })
    }

    pub fn provides(&self, capability: &str) -> bool {
        self.provides.iter().any(|p| p == capability)
    }

    pub fn base_level(&self) -> i32 {
        self.section.base_level(self.stage_ordinal)
    }

    /// File extension of the script, reused for installed links.
    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }
}

/// All scripts found in the script directory, in file-name order.
#[derive(Debug, Clone, Default)]
pub struct ScriptCatalog {
    scripts: Vec<Script>,
}

impl ScriptCatalog {
    pub fn from_scripts(scripts: Vec<Script>) -> Self {
        Self { scripts }
    }

    /// Scan `dir` for initrd scripts.
    ///
    /// Scripts with an unknown stage, a second file for an already catalogued
    /// (section, name), or an unreadable link are reported and left out.
    /// Nothing is executed.
    pub fn scan(dir: &Path, stages: &StageTable, diags: &mut Diagnostics) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Script directory not found: {}", dir.display());
        }
        let mut scripts: Vec<Script> = Vec::new();
        let mut seen: HashMap<(Section, String), usize> = HashMap::new();

        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(e)
                        .with_context(|| format!("Failed to scan scripts in {}", dir.display()));
                }
                Err(e) => {
                    let is_script = e
                        .path()
                        .and_then(Path::file_name)
                        .is_some_and(|n| split_script_name(&n.to_string_lossy()).is_some());
                    if is_script {
                        diags.warn(Origin::Catalog, format!("skipping script: {}", e));
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            let Some((section, name)) = split_script_name(&file_name) else {
                continue;
            };

            let bytes = fs::read(entry.path())
                .with_context(|| format!("Failed to read script {}", entry.path().display()))?;
            let markers = Markers::parse(&String::from_utf8_lossy(&bytes));

            let key = (section, name.to_string());
            if let Some(&first) = seen.get(&key) {
                diags.warn(
                    Origin::Catalog,
                    format!(
                        "{}-{}: duplicate script {} ignored, keeping {}",
                        section,
                        name,
                        entry.path().display(),
                        scripts[first].path.display()
                    ),
                );
                continue;
            }

            match Script::from_markers(section, name, entry.path().to_path_buf(), markers, stages) {
                Ok(script) => {
                    seen.insert(key, scripts.len());
                    scripts.push(script);
                }
                Err(msg) => diags.warn(Origin::Catalog, msg),
            }
        }

        Ok(Self { scripts })
    }

    pub fn scripts(&self) -> &[Script] {
        &self.scripts
    }

    pub fn get(&self, index: usize) -> &Script {
        &self.scripts[index]
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Indices of the scripts in `section`, in scan order.
    pub fn section_indices(&self, section: Section) -> Vec<usize> {
        self.scripts
            .iter()
            .enumerate()
            .filter(|(_, s)| s.section == section)
            .map(|(i, _)| i)
            .collect()
    }

    /// Indices of scripts in `section` providing `capability`.
    pub fn providers(&self, section: Section, capability: &str) -> Vec<usize> {
        self.scripts
            .iter()
            .enumerate()
            .filter(|(_, s)| s.section == section && s.provides(capability))
            .map(|(i, _)| i)
            .collect()
    }
}
