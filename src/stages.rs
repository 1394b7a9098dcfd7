//! Stage table: the coarse ordering of initrd scripts.
//!
//! A stage's ordinal is its zero-based position in the table. Scripts take
//! their base level from the ordinal of the stage they declare.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Stages used when no stage file is configured.
pub const DEFAULT_STAGES: &[&str] = &[
    "boot",
    "udev",
    "network",
    "device",
    "block",
    "filesystem",
    "setup",
];

/// Ordered list of named stages.
#[derive(Debug, Clone)]
pub struct StageTable {
    names: Vec<String>,
    ordinals: HashMap<String, usize>,
}

impl StageTable {
    /// Build a table from names in declaration order.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self {
            names: Vec::new(),
            ordinals: HashMap::new(),
        };
        for name in names {
            let name = name.as_ref();
            if table.ordinals.contains_key(name) {
                bail!("Stage '{}' is declared twice", name);
            }
            table.ordinals.insert(name.to_string(), table.names.len());
            table.names.push(name.to_string());
        }
        if table.names.is_empty() {
            bail!("Stage table is empty");
        }
        Ok(table)
    }

    /// The built-in table.
    pub fn builtin() -> Self {
        Self {
            names: DEFAULT_STAGES.iter().map(|s| s.to_string()).collect(),
            ordinals: DEFAULT_STAGES
                .iter()
                .enumerate()
                .map(|(i, s)| (s.to_string(), i))
                .collect(),
        }
    }

    /// Parse a stage declaration: one name per line, `#` comments ignored.
    pub fn parse(content: &str) -> Result<Self> {
        let names = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        Self::new(names)
    }

    /// Load a stage declaration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read stage file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid stage file {}", path.display()))
    }

    /// Ordinal of a stage, if it exists.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.ordinals.get(name).copied()
    }

    /// Stage assumed for scripts that declare none: the last one.
    pub fn default_stage(&self) -> &str {
        // new() rejects empty tables
        &self.names[self.names.len() - 1]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
