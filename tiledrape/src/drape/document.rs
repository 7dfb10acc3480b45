//! The per-tile document handed to the draping tool.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::{DatabaseSettings, DrapeSettings};
use crate::store::CoverageVersion;

/// Database connection and schema the tool reads a footprint view from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootprintSource {
    pub dbname: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub tile_schema: String,
    pub uniqueid: String,
}

impl FootprintSource {
    pub fn new(database: &DatabaseSettings, tile_schema: &str, uniqueid: &str) -> Self {
        Self {
            dbname: database.dbname.clone(),
            host: database.host.clone(),
            port: database.port,
            user: database.user.clone(),
            password: database.password.clone(),
            tile_schema: tile_schema.to_string(),
            uniqueid: uniqueid.to_string(),
        }
    }

    /// OGR connection string for one footprint view.
    pub fn dsn(&self, view: &str) -> String {
        let password = self
            .password
            .as_deref()
            .map(|p| format!(" password={}", p))
            .unwrap_or_default();
        format!(
            "PG:dbname={} host={} port={} user={}{} schemas={} tables={}",
            self.dbname, self.host, self.port, self.user, password, self.tile_schema, view
        )
    }
}

/// Lifting parameters, shared by every tile of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct LiftingParameters {
    pub roof_percentile: u8,
    pub ground_percentile: u8,
    pub old_version: CoverageVersion,
    pub building_classes_old: Vec<u8>,
    pub building_classes_new: Vec<u8>,
    pub ground_classes: Vec<u8>,
    pub omit_classes: Vec<u8>,
    pub thinning: u32,
    pub building_radius_vertex_elevation: f64,
    pub radius_vertex_elevation: f64,
    pub threshold_jump_edges: f64,
}

impl LiftingParameters {
    pub fn from_settings(drape: &DrapeSettings, old_version: CoverageVersion) -> Self {
        Self {
            roof_percentile: drape.roof_percentile,
            ground_percentile: drape.ground_percentile,
            old_version,
            building_classes_old: drape.building_classes_old.clone(),
            building_classes_new: drape.building_classes_new.clone(),
            ground_classes: drape.ground_classes.clone(),
            omit_classes: drape.omit_classes.clone(),
            thinning: drape.thinning,
            building_radius_vertex_elevation: drape.building_radius_vertex_elevation,
            radius_vertex_elevation: drape.radius_vertex_elevation,
            threshold_jump_edges: drape.threshold_jump_edges,
        }
    }

    /// Building classes for the coverage versions among a tile's files.
    ///
    /// Each coverage classifies buildings differently; a tile drawing on both
    /// uses both sets.
    pub fn building_classes(&self, versions: &BTreeSet<CoverageVersion>) -> Vec<u8> {
        let mut classes: Vec<u8> = versions
            .iter()
            .flat_map(|v| {
                if *v == self.old_version {
                    self.building_classes_old.iter()
                } else {
                    self.building_classes_new.iter()
                }
            })
            .copied()
            .collect();
        classes.sort_unstable();
        classes.dedup();
        classes
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonInput {
    pub datasets: Vec<String>,
    pub uniqueid: String,
    pub lifting: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightRule {
    pub height: String,
    #[serde(rename = "use_LAS_classes")]
    pub use_las_classes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingLifting {
    pub roof: HeightRule,
    pub ground: HeightRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiftingOptions {
    #[serde(rename = "Building")]
    pub building: BuildingLifting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevationInput {
    pub datasets: Vec<PathBuf>,
    #[serde(rename = "omit_LAS_classes")]
    pub omit_las_classes: Vec<u8>,
    pub thinning: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrapeOptions {
    pub building_radius_vertex_elevation: f64,
    pub radius_vertex_elevation: f64,
    pub threshold_jump_edges: f64,
}

/// Tool input for one footprint tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrapeDocument {
    pub input_polygons: Vec<PolygonInput>,
    pub lifting_options: LiftingOptions,
    pub input_elevation: Vec<ElevationInput>,
    pub options: DrapeOptions,
}

impl DrapeDocument {
    /// Document draping footprint view `view` with `files`.
    pub fn new(
        source: &FootprintSource,
        view: &str,
        files: &[PathBuf],
        versions: &BTreeSet<CoverageVersion>,
        params: &LiftingParameters,
    ) -> Self {
        Self {
            input_polygons: vec![PolygonInput {
                datasets: vec![source.dsn(view)],
                uniqueid: source.uniqueid.clone(),
                lifting: "Building".to_string(),
            }],
            lifting_options: LiftingOptions {
                building: BuildingLifting {
                    roof: HeightRule {
                        height: format!("percentile-{}", params.roof_percentile),
                        use_las_classes: params.building_classes(versions),
                    },
                    ground: HeightRule {
                        height: format!("percentile-{}", params.ground_percentile),
                        use_las_classes: params.ground_classes.clone(),
                    },
                },
            },
            input_elevation: vec![ElevationInput {
                datasets: files.to_vec(),
                omit_las_classes: params.omit_classes.clone(),
                thinning: params.thinning,
            }],
            options: DrapeOptions {
                building_radius_vertex_elevation: params.building_radius_vertex_elevation,
                radius_vertex_elevation: params.radius_vertex_elevation,
                threshold_jump_edges: params.threshold_jump_edges,
            },
        }
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;

    fn source(password: Option<&str>) -> FootprintSource {
        FootprintSource {
            dbname: "bag3d".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "etl".to_string(),
            password: password.map(str::to_string),
            tile_schema: "bag_tiles".to_string(),
            uniqueid: "identificatie".to_string(),
        }
    }

    fn params() -> LiftingParameters {
        LiftingParameters::from_settings(&ConfigFile::default().drape, CoverageVersion(2))
    }

    fn versions(v: &[i16]) -> BTreeSet<CoverageVersion> {
        v.iter().map(|v| CoverageVersion(*v)).collect()
    }

    #[test]
    fn test_dsn_without_password() {
        assert_eq!(
            source(None).dsn("t_25gn1"),
            "PG:dbname=bag3d host=localhost port=5432 user=etl schemas=bag_tiles tables=t_25gn1"
        );
    }

    #[test]
    fn test_dsn_with_password() {
        assert!(source(Some("pw")).dsn("t_1").contains("user=etl password=pw schemas="));
    }

    #[test]
    fn test_building_classes_by_version() {
        let p = params();
        assert_eq!(p.building_classes(&versions(&[2])), vec![1]);
        assert_eq!(p.building_classes(&versions(&[3])), vec![6]);
        assert_eq!(p.building_classes(&versions(&[2, 3])), vec![1, 6]);
        assert!(p.building_classes(&versions(&[])).is_empty());
    }

    #[test]
    fn test_yaml_layout() {
        let doc = DrapeDocument::new(
            &source(None),
            "t_25gn1",
            &[PathBuf::from("/ahn3/C_25GN1.LAZ")],
            &versions(&[3]),
            &params(),
        );
        let yaml = doc.to_yaml().unwrap();

        assert!(yaml.contains("input_polygons:"));
        assert!(yaml.contains("lifting: Building"));
        assert!(yaml.contains("Building:"));
        assert!(yaml.contains("height: percentile-95"));
        assert!(yaml.contains("height: percentile-10"));
        assert!(yaml.contains("use_LAS_classes:"));
        assert!(yaml.contains("omit_LAS_classes: []"));
        assert!(yaml.contains("/ahn3/C_25GN1.LAZ"));
        assert!(yaml.contains("threshold_jump_edges: 0.5"));

        let parsed: DrapeDocument = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, doc);
    }
}
