//! Configuration management CLI commands.
//!
//! `config init` writes a default file, `config path` prints where it is
//! read from and `config show` prints the effective settings.

use std::path::Path;

use clap::Subcommand;
use tiledrape::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the configuration file path
    Path,

    /// Print the effective configuration
    Show,
}

/// Run a config subcommand against the file at `path`.
pub fn run(command: ConfigCommands, path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init { force } => run_init(path, force),
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = ConfigFile::load_from(path)?;
            print!("{}", config.to_ini_string());
            Ok(())
        }
    }
}

fn run_init(path: &Path, force: bool) -> Result<(), CliError> {
    if force {
        ConfigFile::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
    } else if ConfigFile::ensure_exists_at(path)? {
        println!("Created {}", path.display());
    } else {
        println!("{} already exists (use --force to overwrite)", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_keeps_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[scheduler]\nthreads = 2\n").unwrap();

        run(ConfigCommands::Init { force: false }, &path).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap().scheduler.threads, 2);

        run(ConfigCommands::Init { force: true }, &path).unwrap();
        let reloaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(reloaded.scheduler.max_attempts, ConfigFile::default().scheduler.max_attempts);
    }

    #[test]
    fn test_init_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        run(ConfigCommands::Init { force: false }, &path).unwrap();
        assert!(path.is_file());
    }
}
