//! Interior/border classification and run planning.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::{join, BaseRunConfig, PlanError, ProcessingConfig, RunOverrides, RunVariant};
use crate::config::ConfigFile;
use crate::log::Logger;
use crate::log_warn;
use crate::pointcloud::SourceEntry;
use crate::store::{CoverageVersion, ElevationIndex, TableRef};
use crate::tile::TileId;

/// The two elevation acquisitions and where the border index lives.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSettings {
    pub old_directory: PathBuf,
    pub new_directory: PathBuf,
    pub old_version: CoverageVersion,
    pub new_version: CoverageVersion,
    /// Copy of the new-coverage border rows relabelled as old.
    pub border_index: TableRef,
}

impl CoverageSettings {
    /// `None` unless border handling is enabled with both directories set.
    pub fn from_config(config: &ConfigFile) -> Option<Self> {
        let border = &config.border;
        if !border.enabled {
            return None;
        }
        Some(Self {
            old_directory: border.old_directory.clone()?,
            new_directory: border.new_directory.clone()?,
            old_version: CoverageVersion(border.old_version),
            new_version: CoverageVersion(border.new_version),
            border_index: TableRef::new(
                config.elevation_index.schema.clone(),
                border.border_table.clone(),
            ),
        })
    }
}

/// Requested tiles split into interior and border tiles, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub interior: Vec<TileId>,
    pub border: Vec<TileId>,
    /// Border tiles that were not requested and are left out.
    pub unrequested_border: Vec<TileId>,
}

/// Split `requested` by membership in `border_set`.
pub fn classify(requested: &[TileId], border_set: &BTreeSet<TileId>) -> Classification {
    let requested: BTreeSet<&TileId> = requested.iter().collect();
    let (border, interior): (Vec<TileId>, Vec<TileId>) = requested
        .iter()
        .map(|t| (*t).clone())
        .partition(|t| border_set.contains(t));
    let unrequested_border = border_set
        .iter()
        .filter(|t| !requested.contains(t))
        .cloned()
        .collect();
    Classification {
        interior,
        border,
        unrequested_border,
    }
}

/// Every requested tile must be in exactly one of the two sets.
///
/// # Errors
///
/// [`PlanError::Unclassified`] or [`PlanError::DoublyClassified`] naming the
/// offending tiles.
pub fn validate_partition(
    requested: &[TileId],
    classification: &Classification,
) -> Result<(), PlanError> {
    let interior: BTreeSet<&TileId> = classification.interior.iter().collect();
    let border: BTreeSet<&TileId> = classification.border.iter().collect();

    let doubly: Vec<TileId> = interior.intersection(&border).map(|t| (*t).clone()).collect();
    if !doubly.is_empty() {
        return Err(PlanError::DoublyClassified { tiles: doubly });
    }

    let unclassified: BTreeSet<TileId> = requested
        .iter()
        .filter(|t| !interior.contains(t) && !border.contains(t))
        .cloned()
        .collect();
    if !unclassified.is_empty() {
        return Err(PlanError::Unclassified {
            tiles: unclassified.into_iter().collect(),
        });
    }
    Ok(())
}

/// The runs of one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPlan {
    pub classification: Classification,
    /// Rest, border-old and border-new, in that order.
    pub runs: Vec<ProcessingConfig>,
}

impl RunPlan {
    pub fn run(&self, variant: RunVariant) -> Option<&ProcessingConfig> {
        self.runs.iter().find(|r| r.variant == variant)
    }
}

/// Derives the three processing configurations from a base configuration.
///
/// Without [`CoverageSettings`] every requested tile is interior and the
/// rest run uses all point cloud sources; the border runs get no tiles.
pub struct BorderPlanner {
    base: BaseRunConfig,
    coverage: Option<CoverageSettings>,
    index: Arc<dyn ElevationIndex>,
    logger: Arc<dyn Logger>,
}

impl BorderPlanner {
    pub fn new(
        base: BaseRunConfig,
        coverage: Option<CoverageSettings>,
        index: Arc<dyn ElevationIndex>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            base,
            coverage,
            index,
            logger,
        }
    }

    pub fn base(&self) -> &BaseRunConfig {
        &self.base
    }

    pub fn coverage(&self) -> Option<&CoverageSettings> {
        self.coverage.as_ref()
    }

    /// New-coverage tiles touching an old-coverage tile.
    pub fn border_set(&self) -> Result<BTreeSet<TileId>, PlanError> {
        let Some(coverage) = &self.coverage else {
            return Ok(BTreeSet::new());
        };
        let tiles = self.index.border_tiles(
            &self.base.elevation_index,
            coverage.new_version,
            coverage.old_version,
        )?;
        info!(border_tiles = tiles.len(), "border tiles identified");
        Ok(tiles)
    }

    /// Classify `requested` against `border_set` and derive the runs.
    ///
    /// # Errors
    ///
    /// A classification that is not a partition of the request, or a
    /// coverage directory missing from the point cloud sources.
    pub fn plan(
        &self,
        requested: &[TileId],
        border_set: &BTreeSet<TileId>,
    ) -> Result<RunPlan, PlanError> {
        let classification = classify(requested, border_set);
        validate_partition(requested, &classification)?;

        if !classification.unrequested_border.is_empty() && !classification.border.is_empty() {
            log_warn!(
                self.logger,
                "only {} of {} border tiles were requested; border processing is narrowed to {}",
                classification.border.len(),
                border_set.len(),
                join(&classification.border)
            );
        }
        if !classification.border.is_empty() {
            log_warn!(
                self.logger,
                "tiles {} are on the coverage border and may be missing points",
                join(&classification.border)
            );
        }

        let runs = match &self.coverage {
            None => vec![
                self.base.derive(
                    RunVariant::Rest,
                    classification.interior.clone(),
                    RunOverrides::default(),
                ),
                self.base
                    .derive(RunVariant::BorderOld, Vec::new(), RunOverrides::default()),
                self.base
                    .derive(RunVariant::BorderNew, Vec::new(), RunOverrides::default()),
            ],
            Some(coverage) => {
                let old_sources = self.sources_in(&coverage.old_directory)?;
                let new_sources = self.sources_in(&coverage.new_directory)?;
                vec![
                    self.base.derive(
                        RunVariant::Rest,
                        classification.interior.clone(),
                        RunOverrides::default().sources(new_sources.clone()),
                    ),
                    self.base.derive(
                        RunVariant::BorderOld,
                        classification.border.clone(),
                        RunOverrides::default()
                            .sources(old_sources)
                            .elevation_index(coverage.border_index.clone()),
                    ),
                    self.base.derive(
                        RunVariant::BorderNew,
                        classification.border.clone(),
                        RunOverrides::default().sources(new_sources),
                    ),
                ]
            }
        };

        info!(
            interior = classification.interior.len(),
            border = classification.border.len(),
            "runs planned"
        );
        Ok(RunPlan {
            classification,
            runs,
        })
    }

    /// Source entries for one coverage directory, as a single priority.
    fn sources_in(&self, directory: &Path) -> Result<Vec<SourceEntry>, PlanError> {
        let sources: Vec<SourceEntry> = self
            .base
            .sources
            .iter()
            .filter(|e| e.is_directory(directory))
            .map(|e| e.clone().with_priority(0))
            .collect();
        if sources.is_empty() {
            return Err(PlanError::UnknownCoverageDirectory {
                directory: directory.to_path_buf(),
            });
        }
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CaptureLogger, LogLevel, NoOpLogger};
    use crate::pointcloud::NamePattern;
    use crate::store::{IndexRow, MemoryStore};
    use crate::tile::TileBounds;

    fn tiles(ids: &[&str]) -> Vec<TileId> {
        ids.iter().map(TileId::new).collect()
    }

    fn set(ids: &[&str]) -> BTreeSet<TileId> {
        tiles(ids).into_iter().collect()
    }

    fn base() -> BaseRunConfig {
        BaseRunConfig {
            sources: vec![
                SourceEntry::new("/ahn3", NamePattern::parse("C_{tile}.LAZ").unwrap(), 0),
                SourceEntry::new("/ahn2", NamePattern::parse("g{tile}.laz").unwrap(), 1),
            ],
            elevation_index: TableRef::new("tile_index", "ahn_index"),
            output_dir: PathBuf::from("/out/run"),
            heights_table: TableRef::new("bag3d", "heights"),
            buildings_table: TableRef::new("bag3d", "pand3d"),
        }
    }

    fn coverage() -> CoverageSettings {
        CoverageSettings {
            old_directory: PathBuf::from("/ahn2"),
            new_directory: PathBuf::from("/ahn3"),
            old_version: CoverageVersion(2),
            new_version: CoverageVersion(3),
            border_index: TableRef::new("tile_index", "border_tiles"),
        }
    }

    fn planner(coverage: Option<CoverageSettings>, logger: Arc<dyn Logger>) -> BorderPlanner {
        BorderPlanner::new(base(), coverage, Arc::new(MemoryStore::new()), logger)
    }

    #[test]
    fn test_classify_is_a_partition() {
        let requested = tiles(&["a", "b", "c", "d"]);
        let classification = classify(&requested, &set(&["b", "d", "z"]));

        assert_eq!(classification.interior, tiles(&["a", "c"]));
        assert_eq!(classification.border, tiles(&["b", "d"]));
        assert_eq!(classification.unrequested_border, tiles(&["z"]));
        validate_partition(&requested, &classification).unwrap();
    }

    #[test]
    fn test_validate_rejects_unclassified_tile() {
        let classification = Classification {
            interior: tiles(&["a"]),
            border: tiles(&["b"]),
            unrequested_border: Vec::new(),
        };
        let err = validate_partition(&tiles(&["a", "b", "c"]), &classification).unwrap_err();
        assert!(matches!(err, PlanError::Unclassified { tiles } if tiles == vec![TileId::new("c")]));
    }

    #[test]
    fn test_validate_rejects_doubly_classified_tile() {
        let classification = Classification {
            interior: tiles(&["a", "b"]),
            border: tiles(&["b"]),
            unrequested_border: Vec::new(),
        };
        let err = validate_partition(&tiles(&["a", "b"]), &classification).unwrap_err();
        assert!(matches!(err, PlanError::DoublyClassified { .. }));
    }

    #[test]
    fn test_plan_with_coverage_overrides_runs() {
        let plan = planner(Some(coverage()), Arc::new(NoOpLogger))
            .plan(&tiles(&["a", "b", "c"]), &set(&["c"]))
            .unwrap();

        let rest = plan.run(RunVariant::Rest).unwrap();
        assert_eq!(rest.tiles, tiles(&["a", "b"]));
        assert_eq!(rest.sources.len(), 1);
        assert_eq!(rest.sources[0].directory, PathBuf::from("/ahn3"));
        assert_eq!(rest.elevation_index.name, "ahn_index");

        let old = plan.run(RunVariant::BorderOld).unwrap();
        assert_eq!(old.tiles, tiles(&["c"]));
        assert_eq!(old.sources[0].directory, PathBuf::from("/ahn2"));
        assert_eq!(old.sources[0].priority, 0);
        assert_eq!(old.elevation_index.name, "border_tiles");
        assert_eq!(old.buildings_table.name, "pand3d_border_old");

        let new = plan.run(RunVariant::BorderNew).unwrap();
        assert_eq!(new.tiles, tiles(&["c"]));
        assert_eq!(new.sources[0].directory, PathBuf::from("/ahn3"));
        assert_eq!(new.elevation_index.name, "ahn_index");
        assert_eq!(new.output_dir, PathBuf::from("/out/run_border_new"));
    }

    #[test]
    fn test_plan_without_coverage_keeps_all_sources() {
        let plan = planner(None, Arc::new(NoOpLogger))
            .plan(&tiles(&["a", "b"]), &BTreeSet::new())
            .unwrap();

        assert_eq!(plan.runs.len(), 3);
        let rest = plan.run(RunVariant::Rest).unwrap();
        assert_eq!(rest.tiles, tiles(&["a", "b"]));
        assert_eq!(rest.sources.len(), 2);
        assert!(plan.run(RunVariant::BorderOld).unwrap().tiles.is_empty());
        assert!(plan.run(RunVariant::BorderNew).unwrap().tiles.is_empty());
    }

    #[test]
    fn test_partial_border_request_warns_and_narrows() {
        let logger = Arc::new(CaptureLogger::new());
        let plan = planner(Some(coverage()), logger.clone())
            .plan(&tiles(&["a", "b"]), &set(&["b", "x", "y"]))
            .unwrap();

        assert_eq!(plan.classification.border, tiles(&["b"]));
        assert_eq!(plan.run(RunVariant::BorderOld).unwrap().tiles, tiles(&["b"]));
        assert!(logger.contains(LogLevel::Warn, "only 1 of 3 border tiles"));
    }

    #[test]
    fn test_unknown_coverage_directory() {
        let mut settings = coverage();
        settings.old_directory = PathBuf::from("/elsewhere");

        let err = planner(Some(settings), Arc::new(NoOpLogger))
            .plan(&tiles(&["a"]), &BTreeSet::new())
            .unwrap_err();
        assert!(matches!(err, PlanError::UnknownCoverageDirectory { directory }
            if directory == PathBuf::from("/elsewhere")));
    }

    #[test]
    fn test_border_set_from_index() {
        let store = MemoryStore::new();
        let index = TableRef::new("tile_index", "ahn_index");
        store
            .add_index_rows(
                &index,
                [
                    IndexRow::new("old1", TileBounds::new(0.0, 0.0, 10.0, 10.0), 2),
                    IndexRow::new("edge", TileBounds::new(10.0, 0.0, 20.0, 10.0), 3),
                    IndexRow::new("inner", TileBounds::new(20.0, 0.0, 30.0, 10.0), 3),
                ],
            )
            .unwrap();
        let planner = BorderPlanner::new(
            base(),
            Some(coverage()),
            Arc::new(store),
            Arc::new(NoOpLogger),
        );

        assert_eq!(planner.border_set().unwrap(), set(&["edge"]));
    }

    #[test]
    fn test_border_set_empty_without_coverage() {
        assert!(planner(None, Arc::new(NoOpLogger)).border_set().unwrap().is_empty());
    }

    #[test]
    fn test_coverage_settings_from_config() {
        let mut config = ConfigFile::default();
        assert!(CoverageSettings::from_config(&config).is_none());

        config.border.enabled = true;
        config.border.old_directory = Some(PathBuf::from("/ahn2"));
        config.border.new_directory = Some(PathBuf::from("/ahn3"));
        let coverage = CoverageSettings::from_config(&config).unwrap();
        assert_eq!(coverage.border_index, TableRef::new("tile_index", "border_tiles"));
        assert_eq!(coverage.new_version, CoverageVersion(3));
    }
}
