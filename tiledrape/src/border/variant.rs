//! Per-run processing configurations.
//!
//! A [`BaseRunConfig`] is built once from the configuration file and never
//! mutated. Each run is derived from it with a small [`RunOverrides`] value.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::ConfigFile;
use crate::pointcloud::{source_entries, IndexError, SourceEntry};
use crate::store::TableRef;
use crate::tile::TileId;

/// Which of the three runs a configuration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RunVariant {
    /// Interior tiles, draped with the new coverage.
    Rest,
    /// Border tiles, draped with the old coverage.
    BorderOld,
    /// Border tiles, draped with the new coverage.
    BorderNew,
}

impl RunVariant {
    pub const ALL: [RunVariant; 3] = [RunVariant::Rest, RunVariant::BorderOld, RunVariant::BorderNew];

    /// Appended to output directory and table names.
    pub fn suffix(&self) -> &'static str {
        match self {
            RunVariant::Rest => "_rest",
            RunVariant::BorderOld => "_border_old",
            RunVariant::BorderNew => "_border_new",
        }
    }

    pub fn name(&self) -> &'static str {
        &self.suffix()[1..]
    }
}

impl fmt::Display for RunVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Settings shared by every run.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRunConfig {
    pub sources: Vec<SourceEntry>,
    pub elevation_index: TableRef,
    pub output_dir: PathBuf,
    /// Staging table the tool output is loaded into.
    pub heights_table: TableRef,
    /// Published table joined with the footprints.
    pub buildings_table: TableRef,
}

impl BaseRunConfig {
    /// # Errors
    ///
    /// Fails when the point cloud directories and patterns do not pair up.
    pub fn from_config(config: &ConfigFile) -> Result<Self, IndexError> {
        let output = &config.output;
        Ok(Self {
            sources: source_entries(&config.pointcloud.directories, &config.pointcloud.patterns)?,
            elevation_index: TableRef::new(
                config.elevation_index.schema.clone(),
                config.elevation_index.table.clone(),
            ),
            output_dir: output.directory.clone(),
            heights_table: TableRef::new(output.schema.clone(), output.heights_table.clone()),
            buildings_table: TableRef::new(output.schema.clone(), output.buildings_table.clone()),
        })
    }

    /// Configuration of one run over `tiles`.
    ///
    /// Output directory and both tables get the variant's suffix; sources
    /// and elevation index come from `overrides` when set.
    pub fn derive(
        &self,
        variant: RunVariant,
        tiles: Vec<TileId>,
        overrides: RunOverrides,
    ) -> ProcessingConfig {
        let suffix = variant.suffix();
        ProcessingConfig {
            variant,
            tiles,
            sources: overrides.sources.unwrap_or_else(|| self.sources.clone()),
            elevation_index: overrides
                .elevation_index
                .unwrap_or_else(|| self.elevation_index.clone()),
            output_dir: suffixed_dir(&self.output_dir, suffix),
            heights_table: self.heights_table.with_suffix(suffix),
            buildings_table: self.buildings_table.with_suffix(suffix),
        }
    }
}

/// What a run changes relative to the base.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOverrides {
    pub sources: Option<Vec<SourceEntry>>,
    pub elevation_index: Option<TableRef>,
}

impl RunOverrides {
    pub fn sources(mut self, sources: Vec<SourceEntry>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn elevation_index(mut self, index: TableRef) -> Self {
        self.elevation_index = Some(index);
        self
    }
}

/// Everything one scheduler run needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingConfig {
    pub variant: RunVariant,
    pub tiles: Vec<TileId>,
    pub sources: Vec<SourceEntry>,
    pub elevation_index: TableRef,
    pub output_dir: PathBuf,
    pub heights_table: TableRef,
    pub buildings_table: TableRef,
}

/// `/out/heights` + `_rest` → `/out/heights_rest`.
fn suffixed_dir(dir: &Path, suffix: &str) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    match dir.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
