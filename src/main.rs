//! initrd-layout - initrd script ordering and kernel module resolution.
//!
//! Lays out an initrd staging tree:
//! - setup/boot scripts ordered by stage and capability dependencies
//! - kernel modules resolved through modprobe plus `# INITRD:` directives
//! - module map files regenerated with depmod

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use initrd_layout::commands;
use initrd_layout::config::Config;

#[derive(Parser)]
#[command(name = "initrd-layout")]
#[command(about = "Order initrd scripts and resolve the kernel modules they need")]
#[command(
    after_help = "QUICK START:\n  initrd-layout show config   Check configuration\n  initrd-layout order         List script levels\n  initrd-layout modules ext4  Resolve a module manifest\n  initrd-layout build         Assemble the staging tree"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Level the setup/boot scripts and print them in execution order
    Order {
        /// Script directory (default: INITRD_SCRIPTS_DIR)
        #[arg(long)]
        scripts: Option<PathBuf>,
        /// Stage declaration file (default: INITRD_STAGES or built-in)
        #[arg(long)]
        stages: Option<PathBuf>,
        /// Install NN-name links under this directory
        #[arg(long)]
        install: Option<PathBuf>,
        /// Print JSON instead of listings
        #[arg(long)]
        json: bool,
    },

    /// Resolve the kernel module manifest (prefix a name with - to exclude it)
    Modules {
        /// Target kernel version (default: INITRD_KERNEL_VERSION or running kernel)
        #[arg(short, long)]
        kernel: Option<String>,
        /// Print JSON instead of the manifest
        #[arg(long)]
        json: bool,
        /// Modules to resolve (default: INITRD_MODULES)
        #[arg(allow_hyphen_values = true)]
        modules: Vec<String>,
    },

    /// Order scripts, resolve and install modules into the staging tree
    Build {
        /// Target kernel version (default: INITRD_KERNEL_VERSION or running kernel)
        #[arg(short, long)]
        kernel: Option<String>,
        /// Staging directory (default: INITRD_STAGING)
        #[arg(long)]
        staging: Option<PathBuf>,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Remove the staging tree
    Clean {
        /// Staging directory (default: INITRD_STAGING)
        #[arg(long)]
        staging: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show stages with their base levels
    Stages,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    let config = Config::load();

    match cli.command {
        Commands::Order {
            scripts,
            stages,
            install,
            json,
        } => {
            commands::cmd_order(
                &config,
                commands::order::OrderOptions {
                    scripts_dir: scripts,
                    stages_file: stages,
                    install,
                    json,
                },
            )?;
        }

        Commands::Modules {
            kernel,
            json,
            modules,
        } => {
            commands::cmd_modules(&config, kernel, modules, json)?;
        }

        Commands::Build { kernel, staging } => {
            commands::cmd_build(&config, kernel, staging)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Stages => commands::show::ShowTarget::Stages,
            };
            commands::cmd_show(&config, show_target)?;
        }

        Commands::Clean { staging } => {
            commands::cmd_clean(&config, staging)?;
        }
    }

    Ok(())
}
