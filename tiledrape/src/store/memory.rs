//! In-process store over axis-aligned tile rectangles.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;
use parking_lot::RwLock;
use tracing::debug;

use super::{
    CoverageInfo, CoverageVersion, ElevationIndex, ElevationTile, HeightStore, StoreError,
    TableRef, TileMatch,
};
use crate::merge::{merge_final, reconcile_border, BuildingRecord, MergeError, MergePolicy, MergeTables};
use crate::tile::{TileBounds, TileId, TileSelection};

/// One row of an elevation tile index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub tile: TileId,
    pub bounds: TileBounds,
    pub version: Option<CoverageVersion>,
    pub file_date: Option<NaiveDate>,
}

impl IndexRow {
    pub fn new(tile: impl Into<TileId>, bounds: TileBounds, version: i16) -> Self {
        Self {
            tile: tile.into(),
            bounds,
            version: Some(CoverageVersion(version)),
            file_date: None,
        }
    }
}

/// A building footprint, as far as publishing needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub id: i64,
    pub construction: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
enum Table {
    Index(Vec<IndexRow>),
    Heights(Vec<BuildingRecord>),
    Published(Vec<BuildingRecord>),
}

impl Table {
    fn len(&self) -> usize {
        match self {
            Table::Index(rows) => rows.len(),
            Table::Heights(rows) | Table::Published(rows) => rows.len(),
        }
    }
}

/// [`ElevationIndex`] and [`HeightStore`] held in memory.
///
/// Geometry is reduced to tile bounding rectangles, so "intersects" and
/// "touches" follow [`TileBounds`]. Buildings without a footprint are
/// dropped when a run is published, like an inner join.
#[derive(Debug, Default)]
pub struct MemoryStore {
    footprint_index: RwLock<BTreeMap<TileId, TileBounds>>,
    footprints: RwLock<HashMap<i64, Footprint>>,
    tables: RwLock<HashMap<TableRef, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_footprint_tile(&self, tile: impl Into<TileId>, bounds: TileBounds) {
        self.footprint_index.write().insert(tile.into(), bounds);
    }

    pub fn add_footprint(&self, footprint: Footprint) {
        self.footprints.write().insert(footprint.id, footprint);
    }

    /// Append rows to an elevation index table, creating it when missing.
    pub fn add_index_rows(
        &self,
        table: &TableRef,
        rows: impl IntoIterator<Item = IndexRow>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let entry = tables
            .entry(table.clone())
            .or_insert_with(|| Table::Index(Vec::new()));
        match entry {
            Table::Index(existing) => {
                existing.extend(rows);
                Ok(())
            }
            _ => Err(wrong_kind(table, "add_index_rows")),
        }
    }

    pub fn index_rows(&self, table: &TableRef) -> Result<Vec<IndexRow>, StoreError> {
        match self.tables.read().get(table) {
            Some(Table::Index(rows)) => Ok(rows.clone()),
            Some(_) => Err(wrong_kind(table, "index_rows")),
            None => Err(StoreError::MissingTable(table.to_string())),
        }
    }

    /// Rows of a staging, published or merged table.
    pub fn height_rows(&self, table: &TableRef) -> Result<Vec<BuildingRecord>, StoreError> {
        match self.tables.read().get(table) {
            Some(Table::Heights(rows)) | Some(Table::Published(rows)) => Ok(rows.clone()),
            Some(Table::Index(_)) => Err(wrong_kind(table, "height_rows")),
            None => Err(StoreError::MissingTable(table.to_string())),
        }
    }

    pub fn has_table(&self, table: &TableRef) -> bool {
        self.tables.read().contains_key(table)
    }

    fn published(&self, table: &TableRef) -> Result<Vec<BuildingRecord>, StoreError> {
        match self.tables.read().get(table) {
            Some(Table::Published(rows)) => Ok(rows.clone()),
            Some(_) => Err(wrong_kind(table, "merge")),
            None => Err(StoreError::MissingTable(table.to_string())),
        }
    }
}

fn wrong_kind(table: &TableRef, operation: &str) -> StoreError {
    StoreError::WrongTableKind {
        table: table.to_string(),
        operation: operation.to_string(),
    }
}

impl ElevationIndex for MemoryStore {
    fn elevation_tiles_for(
        &self,
        footprint_tile: &TileId,
        index: &TableRef,
        mode: TileMatch,
    ) -> Result<Vec<ElevationTile>, StoreError> {
        let tables = self.tables.read();
        let rows = match tables.get(index) {
            Some(Table::Index(rows)) => rows,
            Some(_) => return Err(wrong_kind(index, "elevation_tiles_for")),
            None => return Err(StoreError::MissingTable(index.to_string())),
        };

        let matched: Vec<&IndexRow> = match mode {
            TileMatch::Identical => rows.iter().filter(|r| &r.tile == footprint_tile).collect(),
            TileMatch::Intersecting => {
                let Some(bounds) = self.footprint_index.read().get(footprint_tile).copied() else {
                    return Ok(Vec::new());
                };
                rows.iter().filter(|r| r.bounds.intersects(&bounds)).collect()
            }
        };

        let mut tiles = Vec::new();
        for row in matched {
            match row.version {
                Some(version) => tiles.push(ElevationTile {
                    id: row.tile.clone(),
                    version,
                }),
                None => debug!(tile = %row.tile, "elevation tile has no coverage version"),
            }
        }
        tiles.sort_by(|a, b| a.id.cmp(&b.id));
        tiles.dedup();
        Ok(tiles)
    }

    fn coverage_of(
        &self,
        tile: &TileId,
        index: &TableRef,
    ) -> Result<Option<CoverageInfo>, StoreError> {
        let tables = self.tables.read();
        match tables.get(index) {
            Some(Table::Index(rows)) => Ok(rows.iter().find(|r| &r.tile == tile).and_then(|r| {
                r.version.map(|version| CoverageInfo {
                    version,
                    file_date: r.file_date,
                })
            })),
            Some(_) => Err(wrong_kind(index, "coverage_of")),
            None => Err(StoreError::MissingTable(index.to_string())),
        }
    }

    fn footprint_tiles(&self, selection: &TileSelection) -> Result<Vec<TileId>, StoreError> {
        let index = self.footprint_index.read();
        let tiles = match selection {
            TileSelection::All => index.keys().cloned().collect(),
            TileSelection::List(ids) => {
                let mut found: Vec<TileId> =
                    ids.iter().filter(|id| index.contains_key(*id)).cloned().collect();
                found.sort();
                found.dedup();
                found
            }
            TileSelection::Extent(wkt) => {
                let extent = TileBounds::from_wkt(wkt)
                    .ok_or_else(|| StoreError::InvalidGeometry(wkt.clone()))?;
                index
                    .iter()
                    .filter(|(_, bounds)| bounds.intersects(&extent))
                    .map(|(id, _)| id.clone())
                    .collect()
            }
        };
        Ok(tiles)
    }

    fn border_tiles(
        &self,
        index: &TableRef,
        new: CoverageVersion,
        old: CoverageVersion,
    ) -> Result<BTreeSet<TileId>, StoreError> {
        let rows = self.index_rows(index)?;
        let old_rows: Vec<&IndexRow> = rows.iter().filter(|r| r.version == Some(old)).collect();
        Ok(rows
            .iter()
            .filter(|r| r.version == Some(new))
            .filter(|n| old_rows.iter().any(|o| n.bounds.touches(&o.bounds)))
            .map(|r| r.tile.clone())
            .collect())
    }
}

impl HeightStore for MemoryStore {
    fn prepare_border_index(
        &self,
        source: &TableRef,
        border: &TableRef,
        tiles: &BTreeSet<TileId>,
        version: CoverageVersion,
    ) -> Result<usize, StoreError> {
        let rows: Vec<IndexRow> = self
            .index_rows(source)?
            .into_iter()
            .filter(|r| tiles.contains(&r.tile))
            .map(|mut r| {
                r.version = Some(version);
                r
            })
            .collect();
        let count = rows.len();
        self.tables.write().insert(border.clone(), Table::Index(rows));
        Ok(count)
    }

    fn set_file_dates(
        &self,
        index: &TableRef,
        dates: &[(TileId, NaiveDate)],
    ) -> Result<usize, StoreError> {
        let mut tables = self.tables.write();
        let rows = match tables.get_mut(index) {
            Some(Table::Index(rows)) => rows,
            Some(_) => return Err(wrong_kind(index, "set_file_dates")),
            None => return Err(StoreError::MissingTable(index.to_string())),
        };
        let mut updated = 0;
        for (tile, date) in dates {
            for row in rows.iter_mut().filter(|r| &r.tile == tile) {
                row.file_date = Some(*date);
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn load_heights(
        &self,
        staging: &TableRef,
        records: &[BuildingRecord],
    ) -> Result<usize, StoreError> {
        self.tables
            .write()
            .insert(staging.clone(), Table::Heights(records.to_vec()));
        Ok(records.len())
    }

    fn publish_run(&self, staging: &TableRef, published: &TableRef) -> Result<usize, StoreError> {
        let mut tables = self.tables.write();
        let rows = match tables.remove(staging) {
            Some(Table::Heights(rows)) => rows,
            Some(other) => {
                tables.insert(staging.clone(), other);
                return Err(wrong_kind(staging, "publish_run"));
            }
            None => return Err(StoreError::MissingTable(staging.to_string())),
        };

        let footprints = self.footprints.read();
        let joined: Vec<BuildingRecord> = rows
            .into_iter()
            .filter_map(|mut r| {
                let footprint = footprints.get(&r.id)?;
                r.height_valid = Some(r.derive_validity(footprint.construction));
                Some(r)
            })
            .collect();
        let count = joined.len();
        tables.insert(published.clone(), Table::Published(joined));
        Ok(count)
    }

    fn merge(&self, tables: &MergeTables, policy: &MergePolicy) -> Result<usize, MergeError> {
        let interior = self.published(&tables.interior)?;
        let old = self.published(&tables.border_old)?;
        let new = self.published(&tables.border_new)?;

        let border = reconcile_border(&old, &new, policy);
        let rows = merge_final(interior, border, &tables.target)?;
        let count = rows.len();

        let mut store = self.tables.write();
        store.insert(tables.target.clone(), Table::Published(rows));
        for input in tables.inputs() {
            store.remove(input);
        }
        Ok(count)
    }

    fn row_count(&self, table: &TableRef) -> Result<usize, StoreError> {
        self.tables
            .read()
            .get(table)
            .map(Table::len)
            .ok_or_else(|| StoreError::MissingTable(table.to_string()))
    }

    fn drop_table(&self, table: &TableRef) -> Result<(), StoreError> {
        self.tables.write().remove(table);
        Ok(())
    }
}
