//! tiledrape CLI - Command-line interface
//!
//! Runs the building height pipeline against a PostGIS database and an
//! external draping tool, configured by `~/.tiledrape/config.ini`.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tiledrape::config::config_file_path;

use commands::config::ConfigCommands;
use commands::index::IndexArgs;
use commands::run::RunArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Parser)]
#[command(name = "tiledrape")]
#[command(version = tiledrape::VERSION)]
#[command(about = "Tile-parallel building heights from elevation point clouds", long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.tiledrape/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process all selected tiles and merge the results
    Run {
        /// Worker threads (overrides [scheduler] threads)
        #[arg(long)]
        threads: Option<usize>,

        /// Attempts per tile (overrides [scheduler] max_attempts)
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Classify the selected tiles and show the planned runs
    Plan,

    /// Scan the point cloud directories
    Index {
        /// Tile ids to list files for
        tiles: Vec<String>,
    },

    /// Merge the published run tables into the final table
    Merge,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = dispatch(cli) {
        e.exit();
    }
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let runner = || CliRunner::new(cli.config.as_deref(), cli.debug);
    match cli.command {
        Commands::Run {
            threads,
            max_attempts,
        } => commands::run::run(
            runner()?,
            RunArgs {
                threads,
                max_attempts,
            },
        ),
        Commands::Plan => commands::plan::run(&runner()?),
        Commands::Index { tiles } => commands::index::run(&runner()?, IndexArgs { tiles }),
        Commands::Merge => commands::merge::run(&runner()?),
        Commands::Config { command } => {
            let path = cli.config.clone().unwrap_or_else(config_file_path);
            commands::config::run(command, &path)
        }
    }
}
