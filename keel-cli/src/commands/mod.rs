//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod definition;
mod init;

pub use init::InitCommands;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Load a definition file and check every stage and dependency
    Validate {
        /// Path to the Lua definition file
        file: PathBuf,
    },
    /// Print stage descriptors
    Show {
        /// Path to the Lua definition file
        file: PathBuf,

        /// Only show the stage with this id
        #[arg(short, long)]
        stage: Option<String>,
    },
    /// Print stages in dependency order with their policies
    Plan {
        /// Path to the Lua definition file
        file: PathBuf,
    },
    /// Export stage descriptors as JSON for the pipeline engine
    Export {
        /// Path to the Lua definition file
        file: PathBuf,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Initialize development environment
    Init {
        #[command(subcommand)]
        command: InitCommands,
    },
}

/// Route a command to its handler
pub fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Validate { file } => definition::validate(&file, config),
        Commands::Show { file, stage } => definition::show(&file, stage.as_deref(), config),
        Commands::Plan { file } => definition::plan(&file, config),
        Commands::Export {
            file,
            pretty,
            output,
        } => definition::export(&file, pretty, output.as_deref(), config),
        Commands::Init { command } => init::handle_init_command(command, config),
    }
}
