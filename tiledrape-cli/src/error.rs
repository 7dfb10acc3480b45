//! CLI error handling with user-friendly messages.
//!
//! Every failure ends the process with exit code 1.

use std::fmt;
use std::process;

use tiledrape::config::ConfigFileError;
use tiledrape::pipeline::PipelineError;
use tiledrape::pointcloud::IndexError;
use tiledrape::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration file could not be read or written
    Config(ConfigFileError),
    /// Failed to start the async runtime used for database access
    Runtime(std::io::Error),
    /// Failed to connect to the database
    Connect(StoreError),
    /// Point cloud sources could not be indexed
    Index(IndexError),
    /// The pipeline stopped with an error
    Pipeline(PipelineError),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Connect(_) => {
                eprintln!();
                eprintln!("Check the [database] section of the configuration file:");
                eprintln!("  tiledrape config show");
            }
            CliError::Pipeline(PipelineError::Merge(_)) => {
                eprintln!();
                eprintln!("The run tables were kept; fix the footprints and rerun:");
                eprintln!("  tiledrape merge");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Connect(e) => write!(f, "Failed to connect to database: {}", e),
            CliError::Index(e) => write!(f, "Failed to index point clouds: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Connect(e) => Some(e),
            CliError::Index(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
            CliError::LoggingInit(_) => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        CliError::Index(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}
