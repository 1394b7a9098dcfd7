//! Show command - displays information.

use anyhow::Result;

use super::order::load_stages;
use crate::config::Config;
use crate::scripts::Section;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the stage table with base levels
    Stages,
}

/// Execute the show command.
pub fn cmd_show(config: &Config, target: ShowTarget) -> Result<()> {
    match target {
        ShowTarget::Config => config.print(),
        ShowTarget::Stages => {
            let stages = load_stages(config.stages_file.as_deref())?;
            println!("{:<4} {:<16} {:>5} {:>5}", "#", "stage", "setup", "boot");
            for (ordinal, name) in stages.names().iter().enumerate() {
                println!(
                    "{:<4} {:<16} {:>5} {:>5}",
                    ordinal,
                    name,
                    Section::Setup.base_level(ordinal),
                    Section::Boot.base_level(ordinal)
                );
            }
        }
    }
    Ok(())
}
