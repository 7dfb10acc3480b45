//! Spatial database seam.
//!
//! The pipeline reads the elevation and footprint tile indexes through
//! [`ElevationIndex`] (called concurrently from scheduler workers) and writes
//! height rows, published run tables and the merged result through
//! [`HeightStore`] (called only after a stage's workers have joined).
//!
//! Two implementations exist: [`PostgisStore`] for a PostGIS database and
//! [`MemoryStore`], an in-process store over axis-aligned tile bounds.

mod error;
mod memory;
mod postgis;
pub mod sql;
mod types;

pub use error::StoreError;
pub use memory::{Footprint, IndexRow, MemoryStore};
pub use postgis::{PostgisLayout, PostgisStore};
pub use types::{CoverageInfo, CoverageVersion, ElevationTile, TableRef, TileMatch};

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::merge::{BuildingRecord, MergeError, MergePolicy, MergeTables};
use crate::tile::{TileId, TileSelection};

/// Read side: tile indexes.
pub trait ElevationIndex: Send + Sync {
    /// Elevation tiles covering a footprint tile, in `index`.
    ///
    /// With [`TileMatch::Identical`] the footprint and elevation tilings are
    /// the same and the lookup is by id. Rows without a coverage version are
    /// left out.
    fn elevation_tiles_for(
        &self,
        footprint_tile: &TileId,
        index: &TableRef,
        mode: TileMatch,
    ) -> Result<Vec<ElevationTile>, StoreError>;

    /// Coverage version and file date of one elevation tile.
    fn coverage_of(&self, tile: &TileId, index: &TableRef)
        -> Result<Option<CoverageInfo>, StoreError>;

    /// Footprint tile ids for a selection, sorted.
    fn footprint_tiles(&self, selection: &TileSelection) -> Result<Vec<TileId>, StoreError>;

    /// Tiles of version `new` whose bounds touch, without overlapping, a
    /// tile of version `old`.
    fn border_tiles(
        &self,
        index: &TableRef,
        new: CoverageVersion,
        old: CoverageVersion,
    ) -> Result<BTreeSet<TileId>, StoreError>;
}

/// Write side: staging, publishing and merging.
pub trait HeightStore: Send + Sync {
    /// Replace `border` with the rows of `source` for `tiles`, relabelled
    /// to `version`. Returns the number of rows copied.
    fn prepare_border_index(
        &self,
        source: &TableRef,
        border: &TableRef,
        tiles: &BTreeSet<TileId>,
        version: CoverageVersion,
    ) -> Result<usize, StoreError>;

    /// Set the file date of the listed tiles in an index table.
    fn set_file_dates(
        &self,
        index: &TableRef,
        dates: &[(TileId, NaiveDate)],
    ) -> Result<usize, StoreError>;

    /// Create (or replace) a staging heights table and bulk-load `records`.
    fn load_heights(&self, staging: &TableRef, records: &[BuildingRecord])
        -> Result<usize, StoreError>;

    /// Join a staging table with the footprints into `published`, derive the
    /// validity flag, index it and drop the staging table.
    fn publish_run(&self, staging: &TableRef, published: &TableRef) -> Result<usize, StoreError>;

    /// Reconcile the border tables and union them with the interior table
    /// into `tables.target`, then drop the three inputs.
    fn merge(&self, tables: &MergeTables, policy: &MergePolicy) -> Result<usize, MergeError>;

    fn row_count(&self, table: &TableRef) -> Result<usize, StoreError>;

    fn drop_table(&self, table: &TableRef) -> Result<(), StoreError>;
}
