//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use std::path::PathBuf;
use std::str::FromStr;

use ini::{Ini, Properties};

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use crate::merge::HeightField;
use crate::pointcloud::{parse_dataset_list, source_entries, DatasetItem};
use crate::tile::TileSelection;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [database] section
    if let Some(section) = ini.section(Some("database")) {
        set_string(section, "host", &mut config.database.host);
        if let Some(v) = section.get("port") {
            config.database.port = parse_number(v, "database", "port", "must be a port number")?;
        }
        set_string(section, "dbname", &mut config.database.dbname);
        set_string(section, "user", &mut config.database.user);
        config.database.password = optional(section, "password").or(config.database.password);
        if let Some(v) = section.get("max_connections") {
            config.database.max_connections = parse_positive(v, "database", "max_connections")?;
        }
    }
    if config.database.password.is_none() {
        config.database.password = std::env::var("PGPASSWORD").ok().filter(|p| !p.is_empty());
    }

    // [footprints] section
    if let Some(section) = ini.section(Some("footprints")) {
        let fp = &mut config.footprints;
        set_string(section, "schema", &mut fp.schema);
        set_string(section, "table", &mut fp.table);
        set_string(section, "id_field", &mut fp.id_field);
        set_string(section, "geometry_field", &mut fp.geometry_field);
        if section.contains_key("construction_field") {
            fp.construction_field = optional(section, "construction_field");
        }
        set_string(section, "tile_schema", &mut fp.tile_schema);
        if let Some(v) = section.get("tile_prefix") {
            fp.tile_prefix = v.trim().to_string();
        }
        if section.contains_key("clip_prefix") {
            fp.clip_prefix = optional(section, "clip_prefix");
        }
        set_string(section, "uniqueid", &mut fp.uniqueid);
    }

    // [footprint_index] section
    if let Some(section) = ini.section(Some("footprint_index")) {
        let idx = &mut config.footprint_index;
        set_string(section, "schema", &mut idx.schema);
        set_string(section, "table", &mut idx.table);
        set_string(section, "tile_field", &mut idx.tile_field);
        set_string(section, "geometry_field", &mut idx.geometry_field);
    }

    // [elevation_index] section
    if let Some(section) = ini.section(Some("elevation_index")) {
        let idx = &mut config.elevation_index;
        set_string(section, "schema", &mut idx.schema);
        set_string(section, "table", &mut idx.table);
        set_string(section, "tile_field", &mut idx.tile_field);
        set_string(section, "geometry_field", &mut idx.geometry_field);
        set_string(section, "version_field", &mut idx.version_field);
        set_string(section, "file_date_field", &mut idx.file_date_field);
        if let Some(v) = section.get("identical_tiling") {
            idx.identical_tiling = parse_bool(v);
        }
    }

    // [pointcloud] section
    if let Some(section) = ini.section(Some("pointcloud")) {
        if let Some(v) = section.get("directories") {
            config.pointcloud.directories = parse_list(v, "pointcloud", "directories")?;
        }
        if let Some(v) = section.get("patterns") {
            config.pointcloud.patterns = parse_list(v, "pointcloud", "patterns")?;
        }
        source_entries(&config.pointcloud.directories, &config.pointcloud.patterns).map_err(
            |e| ConfigFileError::InvalidValue {
                section: "pointcloud".to_string(),
                key: "patterns".to_string(),
                value: section.get("patterns").unwrap_or_default().to_string(),
                reason: e.to_string(),
            },
        )?;
    }

    // [tiles] section
    if let Some(section) = ini.section(Some("tiles")) {
        let list = section.get("list").and_then(TileSelection::parse_list);
        let extent = optional(section, "extent");
        config.tiles.selection = match (list, extent) {
            (Some(_), Some(extent)) => {
                return Err(ConfigFileError::InvalidValue {
                    section: "tiles".to_string(),
                    key: "extent".to_string(),
                    value: extent,
                    reason: "set either list or extent, not both".to_string(),
                });
            }
            (Some(list), None) => list,
            (None, Some(extent)) => {
                let selection = TileSelection::Extent(extent.clone());
                if selection.extent_bounds().is_none() {
                    return Err(ConfigFileError::InvalidValue {
                        section: "tiles".to_string(),
                        key: "extent".to_string(),
                        value: extent,
                        reason: "must be a WKT polygon".to_string(),
                    });
                }
                selection
            }
            (None, None) => config.tiles.selection.clone(),
        };
    }

    // [scheduler] section
    if let Some(section) = ini.section(Some("scheduler")) {
        if let Some(v) = section.get("threads") {
            config.scheduler.threads = parse_positive(v, "scheduler", "threads")?;
        }
        if let Some(v) = section.get("max_attempts") {
            config.scheduler.max_attempts = parse_positive(v, "scheduler", "max_attempts")?;
        }
        if let Some(v) = section.get("tool_timeout") {
            config.scheduler.tool_timeout = parse_positive(v, "scheduler", "tool_timeout")?;
        }
        if let Some(v) = optional(section, "work_dir") {
            config.scheduler.work_dir = Some(expand_tilde(&v));
        }
    }

    // [drape] section
    if let Some(section) = ini.section(Some("drape")) {
        let drape = &mut config.drape;
        if let Some(v) = optional(section, "executable") {
            drape.executable = expand_tilde(&v);
        }
        if let Some(v) = section.get("arguments") {
            drape.arguments = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = section.get("output_format") {
            let v = v.trim().to_lowercase();
            if v != "csv" && v != "obj" {
                return Err(ConfigFileError::InvalidValue {
                    section: "drape".to_string(),
                    key: "output_format".to_string(),
                    value: v,
                    reason: "must be 'csv' or 'obj'".to_string(),
                });
            }
            drape.output_format = v;
        }
        if let Some(v) = section.get("roof_percentile") {
            drape.roof_percentile = parse_percentile(v, "roof_percentile")?;
        }
        if let Some(v) = section.get("ground_percentile") {
            drape.ground_percentile = parse_percentile(v, "ground_percentile")?;
        }
        if let Some(v) = section.get("building_classes_old") {
            drape.building_classes_old = parse_classes(v, "building_classes_old")?;
        }
        if let Some(v) = section.get("building_classes_new") {
            drape.building_classes_new = parse_classes(v, "building_classes_new")?;
        }
        if let Some(v) = section.get("ground_classes") {
            drape.ground_classes = parse_classes(v, "ground_classes")?;
        }
        if let Some(v) = section.get("omit_classes") {
            drape.omit_classes = parse_classes(v, "omit_classes")?;
        }
        if let Some(v) = section.get("thinning") {
            drape.thinning = parse_number(v, "drape", "thinning", "must be a non-negative integer")?;
        }
        for (key, target) in [
            (
                "building_radius_vertex_elevation",
                &mut drape.building_radius_vertex_elevation,
            ),
            ("radius_vertex_elevation", &mut drape.radius_vertex_elevation),
            ("threshold_jump_edges", &mut drape.threshold_jump_edges),
        ] {
            if let Some(v) = section.get(key) {
                *target = parse_number(v, "drape", key, "must be a number")?;
            }
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        let out = &mut config.output;
        if let Some(v) = optional(section, "directory") {
            out.directory = expand_tilde(&v);
        }
        set_string(section, "schema", &mut out.schema);
        set_string(section, "heights_table", &mut out.heights_table);
        set_string(section, "buildings_table", &mut out.buildings_table);
        set_string(section, "final_table", &mut out.final_table);
    }

    // [border] section
    if let Some(section) = ini.section(Some("border")) {
        let border = &mut config.border;
        if let Some(v) = section.get("enabled") {
            border.enabled = parse_bool(v);
        }
        border.old_directory = optional(section, "old_directory").map(|v| expand_tilde(&v));
        border.new_directory = optional(section, "new_directory").map(|v| expand_tilde(&v));
        if let Some(v) = section.get("old_version") {
            border.old_version = parse_number(v, "border", "old_version", "must be an integer")?;
        }
        if let Some(v) = section.get("new_version") {
            border.new_version = parse_number(v, "border", "new_version", "must be an integer")?;
        }
        set_string(section, "border_table", &mut border.border_table);
    }
    if config.border.enabled {
        validate_border(&config)?;
    }

    // [merge] section
    if let Some(section) = ini.section(Some("merge")) {
        if let Some(v) = section.get("required_fields") {
            config.merge.required_fields = parse_fields(v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = optional(section, "file") {
            config.logging.file = expand_tilde(&v);
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: impl Into<String>) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Overwrite `target` with a non-empty value.
fn set_string(section: &Properties, key: &str, target: &mut String) {
    if let Some(v) = optional(section, key) {
        *target = v;
    }
}

/// Trimmed value, `None` when missing or empty.
fn optional(section: &Properties, key: &str) -> Option<String> {
    section
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_number<T: FromStr>(
    value: &str,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn parse_positive<T>(value: &str, section: &str, key: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    let parsed: T = parse_number(value, section, key, "must be a positive integer")?;
    if parsed <= T::default() {
        return Err(invalid(section, key, value, "must be at least 1"));
    }
    Ok(parsed)
}

fn parse_percentile(value: &str, key: &str) -> Result<u8, ConfigFileError> {
    let parsed: u8 = parse_number(value, "drape", key, "must be an integer percentile")?;
    if parsed > 100 {
        return Err(invalid("drape", key, value, "must be between 0 and 100"));
    }
    Ok(parsed)
}

/// Comma separated LAS class codes.
fn parse_classes(value: &str, key: &str) -> Result<Vec<u8>, ConfigFileError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_number(s, "drape", key, "must be a list of LAS class codes"))
        .collect()
}

fn parse_list(value: &str, section: &str, key: &str) -> Result<Vec<DatasetItem>, ConfigFileError> {
    parse_dataset_list(value).map_err(|e| invalid(section, key, value, e.to_string()))
}

/// `all` or a comma separated list of height columns.
fn parse_fields(value: &str) -> Result<Vec<HeightField>, ConfigFileError> {
    if value.trim().eq_ignore_ascii_case("all") {
        return Ok(HeightField::all());
    }
    let fields = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<HeightField>()
                .map_err(|reason| invalid("merge", "required_fields", value, reason))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if fields.is_empty() {
        return Err(invalid(
            "merge",
            "required_fields",
            value,
            "list at least one height column or 'all'",
        ));
    }
    Ok(fields)
}

/// Border handling needs both coverage directories among the sources and
/// two distinct versions.
fn validate_border(config: &ConfigFile) -> Result<(), ConfigFileError> {
    let border = &config.border;
    if border.old_version == border.new_version {
        return Err(invalid(
            "border",
            "new_version",
            &border.new_version.to_string(),
            "must differ from old_version",
        ));
    }
    for (key, dir) in [
        ("old_directory", &border.old_directory),
        ("new_directory", &border.new_directory),
    ] {
        if dir.is_none() {
            return Err(invalid("border", key, "", "required when border handling is enabled"));
        }
    }
    Ok(())
}

/// Parse a boolean value from a config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive)
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
