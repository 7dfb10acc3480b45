//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use crate::pointcloud::DatasetItem;
use crate::tile::TileSelection;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let (tile_list, extent) = match &config.tiles.selection {
        TileSelection::Extent(wkt) => (String::new(), wkt.clone()),
        other => (other.to_string(), String::new()),
    };
    let required_fields = if config.merge.required_fields.len() == 14 {
        "all".to_string()
    } else {
        join(config.merge.required_fields.iter().map(|f| f.column()))
    };

    format!(
        r#"[database]
host = {}
port = {}
dbname = {}
user = {}
; Leave empty to use PGPASSWORD
password = {}
max_connections = {}

[footprints]
; Building footprint relation
schema = {}
table = {}
id_field = {}
geometry_field = {}
; Construction year column; buildings built after the point cloud date get height_valid = false
construction_field = {}
; Schema with one footprint view per tile, named <tile_prefix><tile>
tile_schema = {}
tile_prefix = {}
; Prefix of clipped footprint views, stripped from output file names
clip_prefix = {}
uniqueid = {}

[footprint_index]
schema = {}
table = {}
tile_field = {}
geometry_field = {}

[elevation_index]
schema = {}
table = {}
tile_field = {}
geometry_field = {}
version_field = {}
file_date_field = {}
; true when footprint tiles and elevation tiles share ids
identical_tiling = {}

[pointcloud]
; Point cloud directories, highest priority first.
; A bracketed group holds directories of equal priority whose files are combined:
;   directories = /data/ahn3, [/data/ahn2/a, /data/ahn2/b]
directories = {}
; One file name pattern per directory with a single {{tile}} placeholder.
; A group may give one pattern for all of its directories.
;   patterns = C_{{tile}}.LAZ, [u{{tile}}.laz, g{{tile}}.laz]
patterns = {}

[tiles]
; Comma separated footprint tile ids, or 'all'
list = {}
; Alternatively a WKT polygon; footprint tiles intersecting it are processed
extent = {}

[scheduler]
; Concurrent draping processes (default: number of CPU cores)
threads = {}
; Runs per tile before it is reported as skipped (default: 3)
max_attempts = {}
; Seconds before a draping process is killed (default: 3600)
tool_timeout = {}
; Directory for per-tile tool documents (default: <output.directory>/work)
work_dir = {}

[drape]
executable = {}
; Arguments placed between the tool document and the output path
arguments = {}
; csv or obj
output_format = {}
roof_percentile = {}
ground_percentile = {}
; LAS classes of buildings per coverage version
building_classes_old = {}
building_classes_new = {}
ground_classes = {}
omit_classes = {}
thinning = {}
building_radius_vertex_elevation = {}
radius_vertex_elevation = {}
threshold_jump_edges = {}

[output]
; Tool output files; one subdirectory per run
directory = {}
schema = {}
; Staging table of imported tool output
heights_table = {}
; Per-run table joined with footprints
buildings_table = {}
; Merged result
final_table = {}

[border]
; Process tiles on the boundary between two coverages under both of them
enabled = {}
; Must appear in [pointcloud] directories
old_directory = {}
new_directory = {}
old_version = {}
new_version = {}
; Copy of the border rows of the elevation index, relabelled to old_version
border_table = {}

[merge]
; Height columns a new-coverage border row needs to win over the old one, or 'all'
required_fields = {}

[logging]
; Log file path (default: ~/.tiledrape/tiledrape.log)
file = {}
"#,
        config.database.host,
        config.database.port,
        config.database.dbname,
        config.database.user,
        config.database.password.as_deref().unwrap_or(""),
        config.database.max_connections,
        config.footprints.schema,
        config.footprints.table,
        config.footprints.id_field,
        config.footprints.geometry_field,
        config.footprints.construction_field.as_deref().unwrap_or(""),
        config.footprints.tile_schema,
        config.footprints.tile_prefix,
        config.footprints.clip_prefix.as_deref().unwrap_or(""),
        config.footprints.uniqueid,
        config.footprint_index.schema,
        config.footprint_index.table,
        config.footprint_index.tile_field,
        config.footprint_index.geometry_field,
        config.elevation_index.schema,
        config.elevation_index.table,
        config.elevation_index.tile_field,
        config.elevation_index.geometry_field,
        config.elevation_index.version_field,
        config.elevation_index.file_date_field,
        config.elevation_index.identical_tiling,
        dataset_list(&config.pointcloud.directories),
        dataset_list(&config.pointcloud.patterns),
        tile_list,
        extent,
        config.scheduler.threads,
        config.scheduler.max_attempts,
        config.scheduler.tool_timeout,
        config
            .scheduler
            .work_dir
            .as_ref()
            .map(|p| path_to_string(p))
            .unwrap_or_default(),
        path_to_string(&config.drape.executable),
        config.drape.arguments.join(" "),
        config.drape.output_format,
        config.drape.roof_percentile,
        config.drape.ground_percentile,
        join(config.drape.building_classes_old.iter()),
        join(config.drape.building_classes_new.iter()),
        join(config.drape.ground_classes.iter()),
        join(config.drape.omit_classes.iter()),
        config.drape.thinning,
        config.drape.building_radius_vertex_elevation,
        config.drape.radius_vertex_elevation,
        config.drape.threshold_jump_edges,
        path_to_string(&config.output.directory),
        config.output.schema,
        config.output.heights_table,
        config.output.buildings_table,
        config.output.final_table,
        config.border.enabled,
        config
            .border
            .old_directory
            .as_ref()
            .map(|p| path_to_string(p))
            .unwrap_or_default(),
        config
            .border
            .new_directory
            .as_ref()
            .map(|p| path_to_string(p))
            .unwrap_or_default(),
        config.border.old_version,
        config.border.new_version,
        config.border.border_table,
        required_fields,
        path_to_string(&config.logging.file),
    )
}

fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
    items.map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn dataset_list(items: &[DatasetItem]) -> String {
    join(items.iter())
}

/// Convert path to string, collapsing home dir to ~.
pub(super) fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use crate::merge::HeightField;
    use crate::pointcloud::parse_dataset_list;
    use crate::tile::{TileId, TileSelection};
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.database.host = "gis.example.org".to_string();
        config.scheduler.threads = 3;
        config.scheduler.max_attempts = 5;
        config.pointcloud.directories = parse_dataset_list("/ahn3, [/ahn2/a, /ahn2/b]").unwrap();
        config.pointcloud.patterns = parse_dataset_list("C_{tile}.laz, u{tile}.laz").unwrap();
        config.tiles.selection = TileSelection::List(vec![TileId::new("25gn1"), TileId::new("25gn2")]);
        config.border.enabled = true;
        config.border.old_directory = Some(PathBuf::from("/ahn2/a"));
        config.border.new_directory = Some(PathBuf::from("/ahn3"));
        config.merge.required_fields = vec![HeightField::roof(6).unwrap()];

        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded.database.host, "gis.example.org");
        assert_eq!(loaded.scheduler.threads, 3);
        assert_eq!(loaded.scheduler.max_attempts, 5);
        assert_eq!(loaded.pointcloud, config.pointcloud);
        assert_eq!(loaded.tiles.selection, config.tiles.selection);
        assert!(loaded.border.enabled);
        assert_eq!(loaded.border.new_directory, Some(PathBuf::from("/ahn3")));
        assert_eq!(loaded.merge.required_fields, vec![HeightField::roof(6).unwrap()]);
        assert_eq!(loaded.drape.arguments, config.drape.arguments);
    }

    #[test]
    fn test_default_round_trip_keeps_extent() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.tiles.selection =
            TileSelection::Extent("POLYGON((0 0, 5 0, 5 5, 0 5, 0 0))".to_string());
        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(loaded.tiles.selection, config.tiles.selection);
        assert_eq!(loaded.merge.required_fields.len(), 14);
    }
}
