//! Border reconciliation planning.
//!
//! Where a newer elevation acquisition meets an older one, the new tiles on
//! the edge are clipped and only partly covered. Those border tiles are
//! draped twice, once per coverage, and reconciled later by the merge
//! engine. Everything else is an interior tile, draped once.
//!
//! ```text
//!   requested tiles ──► classify ──► interior ──► run "_rest"        (new coverage)
//!                          │
//!                          └───────► border ───► run "_border_old"  (old coverage, border index)
//!                                          └───► run "_border_new"  (new coverage)
//! ```

mod planner;
mod prepare;
mod variant;

pub use planner::{
    classify, validate_partition, BorderPlanner, Classification, CoverageSettings, RunPlan,
};
pub use prepare::{file_date, BorderIndexPreparer};
pub use variant::{BaseRunConfig, ProcessingConfig, RunOverrides, RunVariant};

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;
use crate::tile::TileId;

/// Planning failures. Classification errors abort the pipeline.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("tiles classified as neither interior nor border: {}", join(.tiles))]
    Unclassified { tiles: Vec<TileId> },

    #[error("tiles classified as both interior and border: {}", join(.tiles))]
    DoublyClassified { tiles: Vec<TileId> },

    #[error("coverage directory {} is not among the point cloud directories", .directory.display())]
    UnknownCoverageDirectory { directory: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn join(tiles: &[TileId]) -> String {
    tiles.iter().map(TileId::as_str).collect::<Vec<_>>().join(", ")
}
