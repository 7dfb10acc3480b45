//! End-to-end pipeline: plan, drape, import, publish, merge.
//!
//! ```text
//!   footprint tiles ─► BorderPlanner ─► [border index] ─► for each run:
//!                                                          index point clouds
//!                                                          reset output dir
//!                                                          RetryController ─► Scheduler ─► DrapeTaskExecutor
//!                                                          HeightImporter ─► load ─► publish
//!                       BoundaryMergeEngine ◄─ rest + border_old + border_new
//! ```
//!
//! Runs execute one after another. The merge starts only after all three
//! have been published.

mod error;
mod report;

pub use error::PipelineError;
pub use report::{PipelineReport, RunReport};

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::border::{
    BaseRunConfig, BorderIndexPreparer, BorderPlanner, CoverageSettings, ProcessingConfig,
    RunPlan, RunVariant,
};
use crate::config::ConfigFile;
use crate::drape::{DrapeTool, FootprintSource, LiftingParameters};
use crate::import::HeightImporter;
use crate::log::Logger;
use crate::log_warn;
use crate::merge::{BoundaryMergeEngine, MergePolicy, MergeTables};
use crate::pointcloud::{PointCloudIndex, PointCloudIndexBuilder};
use crate::scheduler::{RetryController, RetryPolicy, Scheduler};
use crate::store::{CoverageVersion, ElevationIndex, HeightStore, TableRef, TileMatch};
use crate::task::{DrapeTaskExecutor, OutputFormat, TaskSpec};
use crate::tile::TileId;

/// A classified tile request and the runs derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedRequest {
    pub requested: Vec<TileId>,
    pub border_set: BTreeSet<TileId>,
    pub plan: RunPlan,
}

/// The whole pipeline over one configuration.
pub struct Pipeline {
    config: ConfigFile,
    index: Arc<dyn ElevationIndex>,
    store: Arc<dyn HeightStore>,
    tool: Arc<dyn DrapeTool>,
    logger: Arc<dyn Logger>,
}

impl Pipeline {
    pub fn new(
        config: ConfigFile,
        index: Arc<dyn ElevationIndex>,
        store: Arc<dyn HeightStore>,
        tool: Arc<dyn DrapeTool>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            config,
            index,
            store,
            tool,
            logger,
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Resolve the tile selection and classify it.
    pub fn plan(&self) -> Result<PlannedRequest, PipelineError> {
        let requested = self.index.footprint_tiles(&self.config.tiles.selection)?;
        if requested.is_empty() {
            return Err(PipelineError::NoTiles);
        }
        info!(tiles = requested.len(), "tiles selected");

        let planner = self.planner()?;
        let border_set = planner.border_set()?;
        let plan = planner.plan(&requested, &border_set)?;
        Ok(PlannedRequest {
            requested,
            border_set,
            plan,
        })
    }

    /// Run everything and merge.
    ///
    /// Cancelling `cancel` stops the current run from taking new tiles;
    /// remaining runs and the merge are skipped and the report is marked
    /// cancelled.
    ///
    /// # Errors
    ///
    /// Classification and merge invariant violations, and infrastructure
    /// failures. Tiles that fail to drape are reported, not errors.
    pub fn run(&self, cancel: &CancellationToken) -> Result<PipelineReport, PipelineError> {
        let planned = self.plan()?;
        let plan = planned.plan;
        let coverage = CoverageSettings::from_config(&self.config);

        let mut indexes = Vec::with_capacity(plan.runs.len());
        for run in &plan.runs {
            indexes.push(Arc::new(build_index(run)?));
        }

        if let Some(coverage) = &coverage {
            if !plan.classification.border.is_empty() {
                let position = plan.runs.iter().position(|r| r.variant == RunVariant::BorderOld);
                let old_files = position.map(|i| indexes[i].as_ref());
                let border: BTreeSet<TileId> = plan.classification.border.iter().cloned().collect();
                BorderIndexPreparer::new(Arc::clone(&self.store), Arc::clone(&self.logger)).prepare(
                    &self.elevation_index(),
                    coverage,
                    &border,
                    old_files.unwrap_or(&PointCloudIndex::default()),
                )?;
            }
        }

        let mut runs = Vec::with_capacity(plan.runs.len());
        let mut cancelled = false;
        for (run, index) in plan.runs.iter().zip(indexes) {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            runs.push(self.execute_run(run, index, cancel)?);
        }
        cancelled |= cancel.is_cancelled();

        let final_table = TableRef::new(
            self.config.output.schema.clone(),
            self.config.output.final_table.clone(),
        );
        let final_rows = if cancelled {
            warn!("pipeline cancelled, merge skipped");
            None
        } else {
            Some(self.merge(&final_table)?)
        };

        let report = PipelineReport {
            classification: plan.classification,
            runs,
            final_rows,
            final_table,
            cancelled,
        };
        self.log_report(&report);
        Ok(report)
    }

    /// Merge the three published run tables into the final table.
    pub fn merge(&self, final_table: &TableRef) -> Result<usize, PipelineError> {
        let base = BaseRunConfig::from_config(&self.config)?;
        let tables = MergeTables::for_runs(&base.buildings_table, final_table.clone());
        let policy = MergePolicy::requiring(self.config.merge.required_fields.clone());
        let rows = BoundaryMergeEngine::new(Arc::clone(&self.store), policy).merge(&tables)?;
        Ok(rows)
    }

    fn planner(&self) -> Result<BorderPlanner, PipelineError> {
        Ok(BorderPlanner::new(
            BaseRunConfig::from_config(&self.config)?,
            CoverageSettings::from_config(&self.config),
            Arc::clone(&self.index),
            Arc::clone(&self.logger),
        ))
    }

    fn elevation_index(&self) -> TableRef {
        TableRef::new(
            self.config.elevation_index.schema.clone(),
            self.config.elevation_index.table.clone(),
        )
    }

    fn execute_run(
        &self,
        run: &ProcessingConfig,
        index: Arc<PointCloudIndex>,
        cancel: &CancellationToken,
    ) -> Result<RunReport, PipelineError> {
        info!(run = %run.variant, tiles = run.tiles.len(), "run starting");
        reset_dir(&run.output_dir)?;

        let work_dir = self.work_dir(run);
        let executor = DrapeTaskExecutor::new(
            self.task_spec(run, work_dir.clone()),
            index,
            Arc::clone(&self.index),
            Arc::clone(&self.tool),
            LiftingParameters::from_settings(
                &self.config.drape,
                CoverageVersion(self.config.border.old_version),
            ),
            Arc::clone(&self.logger),
        );
        let scheduler = Scheduler::new(self.config.scheduler.threads, Arc::clone(&self.logger))
            .with_work_dir(work_dir);
        let controller = RetryController::new(
            scheduler,
            RetryPolicy::from_settings(&self.config.scheduler),
            Arc::clone(&self.logger),
        );
        let summary = controller.run_with_retry(&run.tiles, &executor, cancel)?;

        let importer = HeightImporter::new(
            Arc::clone(&self.index),
            self.config.footprints.tile_prefix.clone(),
            Arc::clone(&self.logger),
        );
        let records = importer.import_all(&summary.produced_paths(), &run.elevation_index)?;
        self.store.load_heights(&run.heights_table, &records)?;
        let published = self.store.publish_run(&run.heights_table, &run.buildings_table)?;

        info!(
            run = %run.variant,
            produced = summary.produced.len(),
            skipped = summary.skipped.len(),
            imported = records.len(),
            published,
            "run finished"
        );
        Ok(RunReport {
            variant: run.variant,
            summary,
            imported: records.len(),
            published,
            table: run.buildings_table.clone(),
        })
    }

    fn task_spec(&self, run: &ProcessingConfig, work_dir: PathBuf) -> TaskSpec {
        let footprints = &self.config.footprints;
        TaskSpec {
            elevation_index: run.elevation_index.clone(),
            tile_match: if self.config.elevation_index.identical_tiling {
                TileMatch::Identical
            } else {
                TileMatch::Intersecting
            },
            footprint: FootprintSource::new(
                &self.config.database,
                &footprints.tile_schema,
                &footprints.uniqueid,
            ),
            tile_prefix: footprints.tile_prefix.clone(),
            clip_prefix: footprints.clip_prefix.clone(),
            output_dir: run.output_dir.clone(),
            output_format: OutputFormat::from_setting(&self.config.drape.output_format),
            work_dir,
        }
    }

    /// Per-run directory for tool documents.
    fn work_dir(&self, run: &ProcessingConfig) -> PathBuf {
        match &self.config.scheduler.work_dir {
            Some(dir) => dir.join(run.variant.name()),
            None => run.output_dir.join(".work"),
        }
    }

    fn log_report(&self, report: &PipelineReport) {
        let skipped = report.permanently_skipped();
        info!(
            outputs = report.produced_outputs(),
            tiles = report.produced_tiles().len(),
            skipped = skipped.len(),
            final_rows = ?report.final_rows,
            "pipeline finished"
        );
        if !skipped.is_empty() {
            let ids: Vec<&str> = skipped.keys().map(TileId::as_str).collect();
            log_warn!(
                self.logger,
                "{} tiles produced no output: {}",
                skipped.len(),
                ids.join(", ")
            );
        }
    }
}

/// Point cloud index for a run; empty when the run has no tiles.
fn build_index(run: &ProcessingConfig) -> Result<PointCloudIndex, PipelineError> {
    if run.tiles.is_empty() {
        return Ok(PointCloudIndex::default());
    }
    Ok(PointCloudIndexBuilder::new()
        .add_entries(run.sources.iter().cloned())
        .build()?)
}

/// Remove and recreate a run's output directory.
fn reset_dir(dir: &Path) -> Result<(), PipelineError> {
    let wrap = |source| PipelineError::OutputDir {
        path: dir.to_path_buf(),
        source,
    };
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(wrap)?;
    }
    fs::create_dir_all(dir).map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reset_dir_clears_previous_output() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("out_rest");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("t_old.csv"), "stale").unwrap();

        reset_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
    }

    #[test]
    fn test_build_index_skips_scan_without_tiles() {
        let run = BaseRunConfig {
            sources: Vec::new(),
            elevation_index: TableRef::new("a", "b"),
            output_dir: PathBuf::from("/nonexistent"),
            heights_table: TableRef::new("a", "h"),
            buildings_table: TableRef::new("a", "p"),
        }
        .derive(RunVariant::BorderOld, Vec::new(), Default::default());

        assert!(build_index(&run).unwrap().is_empty());
    }
}
