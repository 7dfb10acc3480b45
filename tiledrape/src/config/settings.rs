//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic.

use std::path::PathBuf;

use crate::merge::HeightField;
use crate::pointcloud::DatasetItem;
use crate::tile::TileSelection;

/// Complete pipeline configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub database: DatabaseSettings,
    pub footprints: FootprintSettings,
    pub footprint_index: FootprintIndexSettings,
    pub elevation_index: ElevationIndexSettings,
    pub pointcloud: PointCloudSettings,
    pub tiles: TilesSettings,
    pub scheduler: SchedulerSettings,
    pub drape: DrapeSettings,
    pub output: OutputSettings,
    pub border: BorderSettings,
    pub merge: MergeSettings,
    pub logging: LoggingSettings,
}

/// Database connection.
#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    /// Falls back to `PGPASSWORD` when empty.
    pub password: Option<String>,
    pub max_connections: u32,
}

/// Building footprint relation and the per-tile footprint views.
#[derive(Debug, Clone)]
pub struct FootprintSettings {
    pub schema: String,
    pub table: String,
    pub id_field: String,
    pub geometry_field: String,
    /// Construction year column used for the validity flag
    pub construction_field: Option<String>,
    /// Schema holding one footprint view per tile
    pub tile_schema: String,
    /// Name prefix of the per-tile views
    pub tile_prefix: String,
    /// Prefix of clipped views, not part of output file names
    pub clip_prefix: Option<String>,
    /// Unique id column the draping tool writes as `id`
    pub uniqueid: String,
}

/// Footprint tile index relation.
#[derive(Debug, Clone)]
pub struct FootprintIndexSettings {
    pub schema: String,
    pub table: String,
    pub tile_field: String,
    pub geometry_field: String,
}

/// Elevation tile index relation.
#[derive(Debug, Clone)]
pub struct ElevationIndexSettings {
    pub schema: String,
    pub table: String,
    pub tile_field: String,
    pub geometry_field: String,
    pub version_field: String,
    pub file_date_field: String,
    /// Footprint and elevation tiles share ids
    pub identical_tiling: bool,
}

/// Point cloud source directories and their file name patterns.
///
/// Both lists have the same shape: the top-level position is the priority
/// and a bracketed group holds equal-priority entries.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudSettings {
    pub directories: Vec<DatasetItem>,
    pub patterns: Vec<DatasetItem>,
}

/// Tiles to process.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesSettings {
    pub selection: TileSelection,
}

/// Worker pool and retry bounds.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub threads: usize,
    pub max_attempts: u32,
    /// Seconds before a draping process is killed
    pub tool_timeout: u64,
    /// Directory for per-tile tool documents; defaults under the output directory
    pub work_dir: Option<PathBuf>,
}

/// External draping tool.
#[derive(Debug, Clone)]
pub struct DrapeSettings {
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    /// `csv` or `obj`
    pub output_format: String,
    pub roof_percentile: u8,
    pub ground_percentile: u8,
    /// Building LAS classes of the old coverage
    pub building_classes_old: Vec<u8>,
    /// Building LAS classes of the new coverage
    pub building_classes_new: Vec<u8>,
    pub ground_classes: Vec<u8>,
    pub omit_classes: Vec<u8>,
    pub thinning: u32,
    pub building_radius_vertex_elevation: f64,
    pub radius_vertex_elevation: f64,
    pub threshold_jump_edges: f64,
}

/// Output locations.
#[derive(Debug, Clone)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub schema: String,
    /// Staging table of imported tool output
    pub heights_table: String,
    /// Published per-run table
    pub buildings_table: String,
    /// Merged result
    pub final_table: String,
}

/// Border reconciliation between two coverages.
#[derive(Debug, Clone)]
pub struct BorderSettings {
    pub enabled: bool,
    pub old_directory: Option<PathBuf>,
    pub new_directory: Option<PathBuf>,
    pub old_version: i16,
    pub new_version: i16,
    /// Elevation index copy used by the old-coverage border run
    pub border_table: String,
}

/// Boundary merge policy.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeSettings {
    pub required_fields: Vec<HeightField>,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
