//! Border index table for the old-coverage border run.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate};
use tracing::info;

use super::{CoverageSettings, PlanError};
use crate::log::Logger;
use crate::log_warn;
use crate::pointcloud::PointCloudIndex;
use crate::store::{HeightStore, TableRef};
use crate::tile::TileId;

/// Builds the border index from the new-coverage index rows.
///
/// The old coverage's own index does not list the border tiles, so their
/// new-coverage rows are copied and relabelled with the old version. The
/// file date of each row is then taken from the old-coverage file that
/// covers the tile.
pub struct BorderIndexPreparer {
    store: Arc<dyn HeightStore>,
    logger: Arc<dyn Logger>,
}

impl BorderIndexPreparer {
    pub fn new(store: Arc<dyn HeightStore>, logger: Arc<dyn Logger>) -> Self {
        Self { store, logger }
    }

    /// Replace the border index with `tiles` from `source`.
    ///
    /// Returns the number of rows in the new border index. Tiles without a
    /// readable old-coverage file keep an empty file date.
    pub fn prepare(
        &self,
        source: &TableRef,
        coverage: &CoverageSettings,
        tiles: &BTreeSet<TileId>,
        old_files: &PointCloudIndex,
    ) -> Result<usize, PlanError> {
        let rows = self.store.prepare_border_index(
            source,
            &coverage.border_index,
            tiles,
            coverage.old_version,
        )?;

        let mut dates = Vec::new();
        for tile in tiles {
            let Some(file) = old_files.files_for(tile).and_then(|files| files.first()) else {
                log_warn!(self.logger, "border tile {} has no old coverage file", tile);
                continue;
            };
            match file_date(file) {
                Ok(date) => dates.push((tile.clone(), date)),
                Err(e) => log_warn!(
                    self.logger,
                    "cannot read modification time of {}: {}",
                    file.display(),
                    e
                ),
            }
        }
        let dated = self.store.set_file_dates(&coverage.border_index, &dates)?;

        info!(
            table = %coverage.border_index,
            rows,
            dated,
            "border index prepared"
        );
        Ok(rows)
    }
}

/// Local calendar date of a file's last modification.
pub fn file_date(path: &Path) -> std::io::Result<NaiveDate> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified).date_naive())
}
