//! External draping tool: per-tile input document and process runner.

mod document;
mod tool;

pub use document::{
    BuildingLifting, DrapeDocument, DrapeOptions, ElevationInput, FootprintSource, HeightRule,
    LiftingOptions, LiftingParameters, PolygonInput,
};
pub use tool::{DrapeTool, ProcessDrapeTool, ToolStatus};

use std::path::PathBuf;

use thiserror::Error;

/// Failures to run the tool at all. A tool that runs and fails is a
/// [`ToolStatus::Failed`], not an error.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("cannot start {}: {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("waiting for draping tool failed: {0}")]
    Wait(#[source] std::io::Error),

    #[error("cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot render tool document: {0}")]
    Document(#[from] serde_yaml::Error),
}
