//! Building height records and the boundary merge.
//!
//! Border tiles are draped twice, once per coverage. The merge keeps a
//! building's new-coverage row only when every required height is present,
//! falls back to the old-coverage row otherwise, and unions the result with
//! the interior rows. Building ids must be unique in the result; a duplicate
//! means a tile was run as both interior and border and aborts the merge.

mod engine;
mod policy;
mod record;
pub mod sql;

pub use engine::{merge_final, reconcile_border, BoundaryMergeEngine, MergeTables};
pub use policy::{HeightField, MergePolicy};
pub use record::{BuildingRecord, GROUND_PERCENTILES, ROOF_PERCENTILES};

use thiserror::Error;

use crate::store::StoreError;

/// Merge failures. All of them abort the pipeline.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Primary key violation on the building id.
    #[error(
        "building {} occurs more than once in {table}: footprints overlap between border and interior tiles",
        .id.map(|i| i.to_string()).unwrap_or_else(|| "id".to_string())
    )]
    DuplicateBuilding { table: String, id: Option<i64> },

    /// The same table passed as two merge inputs.
    #[error("merge input {0} is used for more than one role")]
    AliasedInput(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}
