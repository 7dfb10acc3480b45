//! One building's height statistics.

use chrono::NaiveDate;

use crate::store::CoverageVersion;
use crate::tile::TileId;

/// Ground percentile labels, in tool output order.
pub const GROUND_PERCENTILES: [&str; 6] = ["0_00", "0_10", "0_20", "0_30", "0_40", "0_50"];

/// Roof (and roof RMSE) percentile labels, in tool output order.
pub const ROOF_PERCENTILES: [&str; 8] = [
    "0_00", "0_10", "0_25", "0_50", "0_75", "0_90", "0_95", "0_99",
];

/// A height row, before or after publishing.
///
/// `file_date`, `version` and `tile` are attached from the elevation index
/// when the tool output is imported. `height_valid` is only set once the row
/// is joined with its footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingRecord {
    pub id: i64,
    pub ground: [Option<f32>; 6],
    pub roof: [Option<f32>; 8],
    pub rmse: [Option<f32>; 8],
    pub roof_flat: Option<bool>,
    pub ground_points: Option<i64>,
    pub roof_points: Option<i64>,
    pub file_date: Option<NaiveDate>,
    pub version: Option<CoverageVersion>,
    pub tile: TileId,
    pub height_valid: Option<bool>,
}

impl BuildingRecord {
    /// Row with every measurement missing.
    pub fn new(id: i64, tile: TileId) -> Self {
        Self {
            id,
            ground: [None; 6],
            roof: [None; 8],
            rmse: [None; 8],
            roof_flat: None,
            ground_points: None,
            roof_points: None,
            file_date: None,
            version: None,
            tile,
            height_valid: None,
        }
    }

    /// Row with all ground and roof heights set to `height`, version 1.
    #[cfg(test)]
    pub(crate) fn complete(id: i64, tile: TileId, height: f32) -> Self {
        let mut record = Self::new(id, tile);
        record.ground = [Some(height); 6];
        record.roof = [Some(height); 8];
        record.rmse = [Some(0.1); 8];
        record.roof_flat = Some(false);
        record.ground_points = Some(10);
        record.roof_points = Some(20);
        record.version = Some(CoverageVersion(1));
        record
    }

    /// Column names of a staging heights table, in load order.
    pub fn columns() -> Vec<String> {
        let mut columns = vec!["id".to_string()];
        columns.extend(GROUND_PERCENTILES.iter().map(|p| format!("ground_{}", p)));
        columns.extend(ROOF_PERCENTILES.iter().map(|p| format!("roof_{}", p)));
        columns.extend(ROOF_PERCENTILES.iter().map(|p| format!("rmse_{}", p)));
        for c in [
            "roof_flat",
            "ground_points",
            "roof_points",
            "file_date",
            "coverage_version",
            "tile_id",
        ] {
            columns.push(c.to_string());
        }
        columns
    }

    /// Validity of the height against the building's construction date.
    ///
    /// A building constructed after the point cloud was acquired, or with no
    /// roof points, has no usable height. Unknown dates or counts do not
    /// invalidate the row.
    pub fn derive_validity(&self, construction: Option<NaiveDate>) -> bool {
        if let (Some(built), Some(acquired)) = (construction, self.file_date) {
            if built > acquired {
                return false;
            }
        }
        self.roof_points != Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_columns_order() {
        let columns = BuildingRecord::columns();
        assert_eq!(columns.len(), 1 + 6 + 8 + 8 + 6);
        assert_eq!(columns[0], "id");
        assert_eq!(columns[1], "ground_0_00");
        assert_eq!(columns[7], "roof_0_00");
        assert_eq!(columns[15], "rmse_0_00");
        assert_eq!(columns.last().unwrap(), "tile_id");
    }

    #[test]
    fn test_validity_built_after_acquisition() {
        let mut record = BuildingRecord::complete(1, TileId::new("a"), 3.0);
        record.file_date = Some(date(2015, 3, 1));
        assert!(!record.derive_validity(Some(date(2016, 1, 1))));
        assert!(record.derive_validity(Some(date(2015, 3, 1))));
        assert!(record.derive_validity(Some(date(2010, 1, 1))));
    }

    #[test]
    fn test_validity_no_roof_points() {
        let mut record = BuildingRecord::complete(1, TileId::new("a"), 3.0);
        record.roof_points = Some(0);
        assert!(!record.derive_validity(None));
    }

    #[test]
    fn test_validity_unknowns_fall_through() {
        let record = BuildingRecord::new(1, TileId::new("a"));
        assert!(record.derive_validity(Some(date(2020, 1, 1))));
        assert!(record.derive_validity(None));
    }
}
