//! Errors that stop a pipeline run.
//!
//! Per-tile failures never appear here; they are skip outcomes in the run
//! summaries.

use std::path::PathBuf;

use thiserror::Error;

use crate::border::PlanError;
use crate::import::ImportError;
use crate::merge::MergeError;
use crate::pointcloud::IndexError;
use crate::scheduler::SchedulerError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Point cloud sources could not be configured or scanned
    #[error("point cloud index: {0}")]
    Index(#[from] IndexError),

    /// Tile classification or border index preparation failed
    #[error("planning failed: {0}")]
    Plan(#[from] PlanError),

    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("database: {0}")]
    Store(#[from] StoreError),

    /// Output directory could not be reset
    #[error("cannot prepare output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no tiles selected")]
    NoTiles,
}
