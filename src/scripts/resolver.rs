//! Execution levels for catalogued scripts.
//!
//! A script starts at its stage's base level (see [`Section::base_level`]) and
//! is pushed above every script in its section that provides one of its
//! dependencies. Providers are resolved first and memoized, so each script is
//! levelled exactly once.

use serde::Serialize;
use thiserror::Error;

use super::catalog::{Script, ScriptCatalog, Section};
use crate::report::{Diagnostics, Origin};

/// Highest level that fits the two-digit prefix.
pub const MAX_LEVEL: i32 = 99;

/// Fatal ordering failures.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Scripts depend on each other in a loop.
    #[error("cyclic dependency among {section} scripts: {}", .chain.join(" -> "))]
    Cycle { section: Section, chain: Vec<String> },
}

/// A script with its final level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelledScript {
    pub level: i32,
    #[serde(flatten)]
    pub script: Script,
}

impl LevelledScript {
    /// `NN-name`, the form used by the installed script listing.
    pub fn prefixed_name(&self) -> String {
        format!("{:02}-{}", self.level, self.script.name)
    }
}

/// Scripts sorted by level within each section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptOrder {
    pub setup: Vec<LevelledScript>,
    pub boot: Vec<LevelledScript>,
}

impl ScriptOrder {
    pub fn section(&self, section: Section) -> &[LevelledScript] {
        match section {
            Section::Setup => &self.setup,
            Section::Boot => &self.boot,
        }
    }

    /// Listing lines (`NN-name`) for one section in execution order.
    pub fn listing(&self, section: Section) -> Vec<String> {
        self.section(section)
            .iter()
            .map(LevelledScript::prefixed_name)
            .collect()
    }

    pub fn level_of(&self, section: Section, name: &str) -> Option<i32> {
        self.section(section)
            .iter()
            .find(|s| s.script.name == name)
            .map(|s| s.level)
    }

    /// Kernel modules declared by scripts, setup first, in execution order.
    pub fn declared_modules(&self) -> Vec<String> {
        let mut modules: Vec<String> = Vec::new();
        for section in Section::ALL {
            for entry in self.section(section) {
                for module in &entry.script.modules {
                    if !modules.contains(module) {
                        modules.push(module.clone());
                    }
                }
            }
        }
        modules
    }

    pub fn print(&self) {
        for section in Section::ALL {
            println!("{}:", section);
            for entry in self.section(section) {
                println!("  {}", entry.prefixed_name());
            }
        }
    }
}

/// Computes levels over one catalog.
pub struct DependencyResolver<'a> {
    catalog: &'a ScriptCatalog,
    levels: Vec<Option<i32>>,
    visiting: Vec<bool>,
    stack: Vec<usize>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(catalog: &'a ScriptCatalog) -> Self {
        Self {
            catalog,
            levels: vec![None; catalog.len()],
            visiting: vec![false; catalog.len()],
            stack: Vec::new(),
        }
    }

    /// Level every script and sort each section.
    ///
    /// Unmet capabilities are reported and skipped. A dependency cycle is
    /// fatal.
    pub fn resolve(mut self, diags: &mut Diagnostics) -> Result<ScriptOrder, OrderError> {
        for index in 0..self.catalog.len() {
            self.level_of(index, diags)?;
        }

        let mut order = ScriptOrder::default();
        for section in Section::ALL {
            let mut entries: Vec<LevelledScript> = self
                .catalog
                .section_indices(section)
                .into_iter()
                .filter_map(|i| {
                    self.levels[i].map(|level| LevelledScript {
                        level,
                        script: self.catalog.get(i).clone(),
                    })
                })
                .collect();
            // stable: equal levels keep scan order
            entries.sort_by_key(|e| e.level);

            for entry in &entries {
                if !(0..=MAX_LEVEL).contains(&entry.level) {
                    diags.warn(
                        Origin::Order,
                        format!(
                            "{}-{}: level {} does not fit a two-digit prefix",
                            section, entry.script.name, entry.level
                        ),
                    );
                }
            }

            match section {
                Section::Setup => order.setup = entries,
                Section::Boot => order.boot = entries,
            }
        }
        Ok(order)
    }

    fn level_of(&mut self, index: usize, diags: &mut Diagnostics) -> Result<i32, OrderError> {
        if let Some(level) = self.levels[index] {
            return Ok(level);
        }

        let catalog = self.catalog;
        let script = catalog.get(index);

        if self.visiting[index] {
            let start = self.stack.iter().position(|&i| i == index).unwrap_or(0);
            let mut chain: Vec<String> = self.stack[start..]
                .iter()
                .map(|&i| catalog.get(i).name.clone())
                .collect();
            chain.push(script.name.clone());
            return Err(OrderError::Cycle {
                section: script.section,
                chain,
            });
        }

        self.visiting[index] = true;
        self.stack.push(index);

        let mut level = script.base_level();
        for capability in &script.depends {
            let providers: Vec<usize> = catalog
                .providers(script.section, capability)
                .into_iter()
                .filter(|&p| p != index)
                .collect();

            if providers.is_empty() {
                diags.warn(
                    Origin::Order,
                    format!(
                        "{}-{}: unresolved dependency '{}'",
                        script.section, script.name, capability
                    ),
                );
                continue;
            }

            let mut highest = i32::MIN;
            for provider in providers {
                highest = highest.max(self.level_of(provider, diags)?);
            }
            if highest >= level {
                level = highest + 1;
            }
        }

        self.stack.pop();
        self.visiting[index] = false;
        self.levels[index] = Some(level);
        Ok(level)
    }
}

/// Convenience wrapper: level and sort a whole catalog.
pub fn resolve(
    catalog: &ScriptCatalog,
    diags: &mut Diagnostics,
) -> Result<ScriptOrder, OrderError> {
    DependencyResolver::new(catalog).resolve(diags)
}
