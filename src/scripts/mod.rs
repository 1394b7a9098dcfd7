//! Initrd script ordering.
//!
//! - `catalog` - scan `setup-*`/`boot-*` scripts and read their markers
//! - `resolver` - turn stages and capability dependencies into levels
//! - `install` - lay out `NN-name` links and listings

pub mod catalog;
pub mod install;
pub mod resolver;

pub use catalog::{Script, ScriptCatalog, Section};
pub use install::install_links;
pub use resolver::{resolve, DependencyResolver, LevelledScript, OrderError, ScriptOrder};
