//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::file::config_directory;
use super::settings::*;
use crate::merge::HeightField;
use crate::tile::TileSelection;

/// Get the number of available CPU cores.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;

/// Attempts per tile before it is reported as permanently skipped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Seconds a single draping process may run.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 3600;

pub const DEFAULT_DRAPE_EXECUTABLE: &str = "3dfier";
pub const DEFAULT_DRAPE_ARGUMENTS: [&str; 2] = ["--stat_RMSE", "--CSV-BUILDINGS-MULTIPLE"];
pub const DEFAULT_OUTPUT_FORMAT: &str = "csv";
pub const DEFAULT_ROOF_PERCENTILE: u8 = 95;
pub const DEFAULT_GROUND_PERCENTILE: u8 = 10;
pub const DEFAULT_VERTEX_RADIUS: f64 = 0.5;

pub const DEFAULT_OLD_VERSION: i16 = 2;
pub const DEFAULT_NEW_VERSION: i16 = 3;

/// Default worker count: one per core.
pub fn default_threads() -> usize {
    num_cpus()
}

impl Default for ConfigFile {
    fn default() -> Self {
        let config_dir = config_directory();

        Self {
            database: DatabaseSettings {
                host: DEFAULT_DB_HOST.to_string(),
                port: DEFAULT_DB_PORT,
                dbname: "bag3d".to_string(),
                user: "postgres".to_string(),
                password: None,
                max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            },
            footprints: FootprintSettings {
                schema: "bagactueel".to_string(),
                table: "pand".to_string(),
                id_field: "identificatie".to_string(),
                geometry_field: "geovlak".to_string(),
                construction_field: Some("bouwjaar".to_string()),
                tile_schema: "bag_tiles".to_string(),
                tile_prefix: "t_".to_string(),
                clip_prefix: None,
                uniqueid: "identificatie".to_string(),
            },
            footprint_index: FootprintIndexSettings {
                schema: "tile_index".to_string(),
                table: "bag_index".to_string(),
                tile_field: "unit".to_string(),
                geometry_field: "geom".to_string(),
            },
            elevation_index: ElevationIndexSettings {
                schema: "tile_index".to_string(),
                table: "ahn_index".to_string(),
                tile_field: "unit".to_string(),
                geometry_field: "geom".to_string(),
                version_field: "ahn_version".to_string(),
                file_date_field: "file_date".to_string(),
                identical_tiling: false,
            },
            pointcloud: PointCloudSettings {
                directories: Vec::new(),
                patterns: Vec::new(),
            },
            tiles: TilesSettings {
                selection: TileSelection::All,
            },
            scheduler: SchedulerSettings {
                threads: default_threads(),
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                tool_timeout: DEFAULT_TOOL_TIMEOUT_SECS,
                work_dir: None,
            },
            drape: DrapeSettings {
                executable: PathBuf::from(DEFAULT_DRAPE_EXECUTABLE),
                arguments: DEFAULT_DRAPE_ARGUMENTS.iter().map(|s| s.to_string()).collect(),
                output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
                roof_percentile: DEFAULT_ROOF_PERCENTILE,
                ground_percentile: DEFAULT_GROUND_PERCENTILE,
                building_classes_old: vec![1],
                building_classes_new: vec![6],
                ground_classes: vec![2],
                omit_classes: Vec::new(),
                thinning: 0,
                building_radius_vertex_elevation: DEFAULT_VERTEX_RADIUS,
                radius_vertex_elevation: DEFAULT_VERTEX_RADIUS,
                threshold_jump_edges: DEFAULT_VERTEX_RADIUS,
            },
            output: OutputSettings {
                directory: config_dir.join("output"),
                schema: "bagactueel".to_string(),
                heights_table: "heights".to_string(),
                buildings_table: "pand3d".to_string(),
                final_table: "pand3d_final".to_string(),
            },
            border: BorderSettings {
                enabled: false,
                old_directory: None,
                new_directory: None,
                old_version: DEFAULT_OLD_VERSION,
                new_version: DEFAULT_NEW_VERSION,
                border_table: "border_tiles".to_string(),
            },
            merge: MergeSettings {
                required_fields: HeightField::all(),
            },
            logging: LoggingSettings {
                file: config_dir.join("tiledrape.log"),
            },
        }
    }
}
