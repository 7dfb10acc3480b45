//! Loads draping tool output into height records.
//!
//! Each output file belongs to one footprint tile; the tile id is the file
//! stem without the footprint view prefix. Rows get the coverage version
//! and file date of the elevation tile they were draped from.

mod row;

pub use row::{parse_record, reader, NULL_VALUE};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::log::Logger;
use crate::merge::BuildingRecord;
use crate::store::{CoverageInfo, ElevationIndex, StoreError, TableRef, TileMatch};
use crate::tile::TileId;
use crate::{log_debug, log_warn};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read {} as CSV: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("output file name {} has no tile id", .0.display())]
    NoTile(PathBuf),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads tool CSV files and attaches elevation metadata.
pub struct HeightImporter {
    index: Arc<dyn ElevationIndex>,
    tile_prefix: String,
    logger: Arc<dyn Logger>,
}

impl HeightImporter {
    pub fn new(
        index: Arc<dyn ElevationIndex>,
        tile_prefix: impl Into<String>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            index,
            tile_prefix: tile_prefix.into(),
            logger,
        }
    }

    /// Footprint tile of an output file.
    pub fn tile_of(&self, path: &Path) -> Option<TileId> {
        let stem = path.file_stem()?.to_str()?;
        let tile = TileId::new(stem).strip_prefix(&self.tile_prefix);
        (!tile.as_str().is_empty()).then_some(tile)
    }

    /// Records of every file, in file order.
    pub fn import_all(
        &self,
        paths: &[PathBuf],
        elevation_index: &TableRef,
    ) -> Result<Vec<BuildingRecord>, ImportError> {
        let mut records = Vec::new();
        for path in paths {
            records.extend(self.import_file(path, elevation_index)?);
        }
        debug!(files = paths.len(), rows = records.len(), "tool output imported");
        Ok(records)
    }

    /// Records of one file. The header row is skipped; malformed rows are
    /// logged and left out.
    pub fn import_file(
        &self,
        path: &Path,
        elevation_index: &TableRef,
    ) -> Result<Vec<BuildingRecord>, ImportError> {
        let tile = self
            .tile_of(path)
            .ok_or_else(|| ImportError::NoTile(path.to_path_buf()))?;
        let file = File::open(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let coverage = self.coverage_for(&tile, elevation_index)?;
        if coverage.is_none() {
            log_warn!(
                self.logger,
                "tile {}: no coverage version in {}, rows will be excluded from the merge",
                tile,
                elevation_index
            );
        }

        let mut records = Vec::new();
        for result in reader(file).records() {
            let parsed = match result {
                Ok(row) => {
                    let line = row.position().map_or(0, |p| p.line());
                    (line, parse_record(&row, &tile))
                }
                Err(e) if e.is_io_error() => {
                    return Err(ImportError::Csv {
                        path: path.to_path_buf(),
                        source: e,
                    })
                }
                Err(e) => (e.position().map_or(0, |p| p.line()), Err(e.to_string())),
            };
            match parsed {
                (_, Ok(mut record)) => {
                    if let Some(info) = coverage {
                        record.version = Some(info.version);
                        record.file_date = info.file_date;
                    }
                    records.push(record);
                }
                (line, Err(reason)) => log_warn!(
                    self.logger,
                    "{}:{}: skipping row: {}",
                    path.display(),
                    line,
                    reason
                ),
            }
        }
        log_debug!(self.logger, "tile {}: {} rows from {}", tile, records.len(), path.display());
        Ok(records)
    }

    /// Coverage of the elevation tile with the same id, or else of the
    /// newest elevation tiles intersecting the footprint tile.
    fn coverage_for(
        &self,
        tile: &TileId,
        elevation_index: &TableRef,
    ) -> Result<Option<CoverageInfo>, ImportError> {
        if let Some(info) = self.index.coverage_of(tile, elevation_index)? {
            return Ok(Some(info));
        }

        let candidates =
            self.index
                .elevation_tiles_for(tile, elevation_index, TileMatch::Intersecting)?;
        let Some(newest) = candidates.iter().map(|c| c.version).max() else {
            return Ok(None);
        };
        let mut file_date = None;
        for candidate in candidates.iter().filter(|c| c.version == newest) {
            if let Some(info) = self.index.coverage_of(&candidate.id, elevation_index)? {
                file_date = file_date.max(info.file_date);
            }
        }
        Ok(Some(CoverageInfo {
            version: newest,
            file_date,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CaptureLogger, LogLevel, NoOpLogger};
    use crate::store::{CoverageVersion, IndexRow, MemoryStore};
    use crate::tile::TileBounds;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "id,ground-0.00,ground-0.10,ground-0.20,ground-0.30,ground-0.40,ground-0.50,\
                          roof-0.00,rmse-0.00,roof-0.10,rmse-0.10,roof-0.25,rmse-0.25,roof-0.50,rmse-0.50,\
                          roof-0.75,rmse-0.75,roof-0.90,rmse-0.90,roof-0.95,rmse-0.95,roof-0.99,rmse-0.99,\
                          roof_flat,nr_ground_pts,nr_roof_pts";

    fn row(id: i64) -> String {
        let mut fields = vec![id.to_string()];
        fields.extend((0..6).map(|i| format!("{}.5", i)));
        fields.extend((0..16).map(|i| format!("1{}.25", i)));
        fields.extend(["true".to_string(), "12".to_string(), "40".to_string(), String::new()]);
        fields.join(",")
    }

    fn index() -> TableRef {
        TableRef::new("tile_index", "ahn_index")
    }

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let mut row = IndexRow::new("37hn1", TileBounds::new(0.0, 0.0, 1.0, 1.0), 3);
        row.file_date = NaiveDate::from_ymd_opt(2019, 4, 1);
        store.add_index_rows(&index(), [row]).unwrap();
        Arc::new(store)
    }

    #[test]
    fn test_tile_of_strips_view_prefix() {
        let importer = HeightImporter::new(store(), "t_", Arc::new(NoOpLogger));
        assert_eq!(
            importer.tile_of(Path::new("/out/t_37HN1.csv")),
            Some(TileId::new("37hn1"))
        );
        assert_eq!(importer.tile_of(Path::new("/out/t_.csv")), None);
    }

    #[test]
    fn test_import_attaches_coverage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t_37hn1.csv");
        fs::write(&path, format!("{}\n{}\n{}\n", HEADER, row(1), row(2))).unwrap();

        let importer = HeightImporter::new(store(), "t_", Arc::new(NoOpLogger));
        let records = importer.import_file(&path, &index()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[1].id, 2);
        assert!(records.iter().all(|r| r.version == Some(CoverageVersion(3))));
        assert_eq!(records[0].file_date, NaiveDate::from_ymd_opt(2019, 4, 1));
        assert_eq!(records[0].tile, TileId::new("37hn1"));
        assert_eq!(records[0].roof_points, Some(40));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t_37hn1.csv");
        fs::write(&path, format!("{}\n{}\nbroken,row\n\n{}\n", HEADER, row(1), row(3))).unwrap();
        let logger = Arc::new(CaptureLogger::new());

        let records = HeightImporter::new(store(), "t_", logger.clone())
            .import_file(&path, &index())
            .unwrap();

        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(logger.contains(LogLevel::Warn, ":3: skipping row"));
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t_37hn1.csv");
        let mut content = format!("{}\n{}\n", HEADER, row(1)).into_bytes();
        content.extend_from_slice(b"2,\xff\xfe\n");
        content.extend_from_slice(format!("{}\n", row(4)).as_bytes());
        fs::write(&path, content).unwrap();
        let logger = Arc::new(CaptureLogger::new());

        let records = HeightImporter::new(store(), "t_", logger.clone())
            .import_file(&path, &index())
            .unwrap();

        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 4]);
        assert!(logger.contains(LogLevel::Warn, ":3: skipping row"));
    }

    #[test]
    fn test_unknown_tile_has_no_version() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t_99zz9.csv");
        fs::write(&path, format!("{}\n{}\n", HEADER, row(5))).unwrap();
        let logger = Arc::new(CaptureLogger::new());

        let records = HeightImporter::new(store(), "t_", logger.clone())
            .import_file(&path, &index())
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].version, None);
        assert!(logger.contains(LogLevel::Warn, "no coverage version"));
    }

    #[test]
    fn test_coverage_from_intersecting_tiles() {
        let store = MemoryStore::new();
        store.add_footprint_tile("f1", TileBounds::new(0.0, 0.0, 10.0, 10.0));
        let mut old = IndexRow::new("e_old", TileBounds::new(0.0, 0.0, 5.0, 10.0), 2);
        old.file_date = NaiveDate::from_ymd_opt(2010, 1, 1);
        let mut new = IndexRow::new("e_new", TileBounds::new(5.0, 0.0, 10.0, 10.0), 3);
        new.file_date = NaiveDate::from_ymd_opt(2018, 6, 1);
        store.add_index_rows(&index(), [old, new]).unwrap();

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("t_f1.csv");
        fs::write(&path, format!("{}\n{}\n", HEADER, row(8))).unwrap();

        let records = HeightImporter::new(Arc::new(store), "t_", Arc::new(NoOpLogger))
            .import_file(&path, &index())
            .unwrap();

        assert_eq!(records[0].version, Some(CoverageVersion(3)));
        assert_eq!(records[0].file_date, NaiveDate::from_ymd_opt(2018, 6, 1));
    }

    #[test]
    fn test_missing_file() {
        let importer = HeightImporter::new(store(), "t_", Arc::new(NoOpLogger));
        let result = importer.import_file(Path::new("/nonexistent/t_37hn1.csv"), &index());
        assert!(matches!(result, Err(ImportError::Io { .. })));
    }
}
