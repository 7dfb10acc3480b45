//! CLI runner for common setup and operations.
//!
//! Encapsulates configuration loading, logging initialization and the
//! construction of the store, tool and pipeline shared by the commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;
use tracing::info;

use crate::error::CliError;
use tiledrape::config::{config_file_path, ConfigFile};
use tiledrape::drape::ProcessDrapeTool;
use tiledrape::log::TracingLogger;
use tiledrape::logging::{default_log_file, init_logging, LoggingGuard};
use tiledrape::pipeline::Pipeline;
use tiledrape::store::{PostgisLayout, PostgisStore};

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    config: ConfigFile,
    config_path: PathBuf,
}

impl CliRunner {
    /// Load the configuration and initialize logging.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Configuration file; the default location when `None`
    /// * `debug_mode` - When true, enables debug-level logging regardless of RUST_LOG
    pub fn new(config_path: Option<&Path>, debug_mode: bool) -> Result<Self, CliError> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(config_file_path);
        let config = ConfigFile::load_from(&config_path)?;

        let (log_dir, log_file) = split_log_path(&config.logging.file);
        let logging_guard = init_logging(&log_dir, &log_file, true, debug_mode)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
            config_path,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigFile {
        &mut self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("tiledrape v{}", tiledrape::VERSION);
        info!(config = %self.config_path.display(), "tiledrape CLI: {} command", command);
    }

    /// Runtime that drives the database pool.
    ///
    /// The pipeline itself runs on the calling thread and its workers, which
    /// block on this runtime for every query.
    pub fn runtime(&self) -> Result<Runtime, CliError> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("tiledrape-db")
            .enable_all()
            .build()
            .map_err(CliError::Runtime)
    }

    pub fn connect(&self, runtime: &Runtime) -> Result<Arc<PostgisStore>, CliError> {
        let layout = PostgisLayout::from_config(&self.config);
        PostgisStore::connect(&self.config.database, layout, runtime.handle().clone())
            .map(Arc::new)
            .map_err(CliError::Connect)
    }

    /// Pipeline over the configured database and draping tool.
    pub fn pipeline(&self, store: Arc<PostgisStore>) -> Pipeline {
        let drape = &self.config.drape;
        let tool = ProcessDrapeTool::new(
            &drape.executable,
            drape.arguments.clone(),
            Duration::from_secs(self.config.scheduler.tool_timeout),
        )
        .with_logger(Arc::new(TracingLogger));
        Pipeline::new(
            self.config.clone(),
            store.clone(),
            store,
            Arc::new(tool),
            Arc::new(TracingLogger),
        )
    }
}

/// Directory and file name of the configured log path.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| default_log_file().to_string());
    (dir, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_log_path() {
        let (dir, file) = split_log_path(Path::new("/var/log/tiledrape/run.log"));
        assert_eq!(dir, PathBuf::from("/var/log/tiledrape"));
        assert_eq!(file, "run.log");

        let (dir, file) = split_log_path(Path::new("run.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(file, "run.log");
    }
}
