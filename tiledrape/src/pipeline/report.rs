//! What a pipeline run did.

use std::collections::{BTreeMap, BTreeSet};

use crate::border::{Classification, RunVariant};
use crate::scheduler::RunSummary;
use crate::store::TableRef;
use crate::task::SkipReason;
use crate::tile::TileId;

/// One processing run: scheduling, import and publishing.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub variant: RunVariant,
    pub summary: RunSummary,
    /// Rows read from the tool output.
    pub imported: usize,
    /// Rows in the published table after joining the footprints.
    pub published: usize,
    pub table: TableRef,
}

/// Result of [`super::Pipeline::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub classification: Classification,
    pub runs: Vec<RunReport>,
    /// Rows in the merged table; `None` when the run was cancelled first.
    pub final_rows: Option<usize>,
    pub final_table: TableRef,
    pub cancelled: bool,
}

impl PipelineReport {
    pub fn run(&self, variant: RunVariant) -> Option<&RunReport> {
        self.runs.iter().find(|r| r.variant == variant)
    }

    /// Output files produced, counted per run.
    pub fn produced_outputs(&self) -> usize {
        self.runs.iter().map(|r| r.summary.produced.len()).sum()
    }

    /// Tiles with output from at least one run.
    pub fn produced_tiles(&self) -> BTreeSet<TileId> {
        self.runs
            .iter()
            .flat_map(|r| r.summary.produced.keys().cloned())
            .collect()
    }

    /// Tiles that no run produced output for, with the last skip reason.
    ///
    /// A border tile skipped under one coverage but draped under the other
    /// is not listed.
    pub fn permanently_skipped(&self) -> BTreeMap<TileId, SkipReason> {
        let produced = self.produced_tiles();
        let mut skipped = BTreeMap::new();
        for run in &self.runs {
            for (tile, reason) in &run.summary.skipped {
                if !produced.contains(tile) {
                    skipped.insert(tile.clone(), reason.clone());
                }
            }
        }
        skipped
    }
}
