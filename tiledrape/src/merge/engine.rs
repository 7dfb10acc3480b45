//! Boundary merge: precedence between coverages, union, uniqueness.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::policy::MergePolicy;
use super::record::BuildingRecord;
use super::MergeError;
use crate::store::{HeightStore, TableRef};

/// Inputs and output of one merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeTables {
    pub interior: TableRef,
    pub border_old: TableRef,
    pub border_new: TableRef,
    pub target: TableRef,
}

impl MergeTables {
    /// The three run tables derived from `published` by suffix, merged into
    /// `target`.
    pub fn for_runs(published: &TableRef, target: TableRef) -> Self {
        Self {
            interior: published.with_suffix("_rest"),
            border_old: published.with_suffix("_border_old"),
            border_new: published.with_suffix("_border_new"),
            target,
        }
    }

    pub fn inputs(&self) -> [&TableRef; 3] {
        [&self.interior, &self.border_old, &self.border_new]
    }

    /// Every table must play exactly one role.
    pub fn check_distinct(&self) -> Result<(), MergeError> {
        let mut seen = HashSet::new();
        for table in self.inputs().into_iter().chain([&self.target]) {
            if !seen.insert(table) {
                return Err(MergeError::AliasedInput(table.to_string()));
            }
        }
        Ok(())
    }
}

/// Reconcile the two border runs.
///
/// New-coverage rows are kept when complete under `policy`. Old-coverage rows
/// fill in every building without a complete new row. The two contributing
/// sets are disjoint on id.
pub fn reconcile_border(
    border_old: &[BuildingRecord],
    border_new: &[BuildingRecord],
    policy: &MergePolicy,
) -> Vec<BuildingRecord> {
    let complete_new: Vec<&BuildingRecord> = border_new
        .iter()
        .filter(|r| policy.is_complete(r))
        .collect();
    let taken: HashSet<i64> = complete_new.iter().map(|r| r.id).collect();

    complete_new
        .into_iter()
        .chain(border_old.iter().filter(|r| !taken.contains(&r.id)))
        .cloned()
        .collect()
}

/// Union interior and reconciled border rows into the final table rows.
///
/// Rows without a coverage version were never draped and are dropped. A
/// building id that occurs twice is a [`MergeError::DuplicateBuilding`].
/// The result is ordered by id.
pub fn merge_final(
    interior: Vec<BuildingRecord>,
    border: Vec<BuildingRecord>,
    target: &TableRef,
) -> Result<Vec<BuildingRecord>, MergeError> {
    let mut rows: Vec<BuildingRecord> = interior
        .into_iter()
        .chain(border)
        .filter(|r| r.version.is_some())
        .collect();
    rows.sort_by_key(|r| r.id);

    if let Some(pair) = rows.windows(2).find(|w| w[0].id == w[1].id) {
        return Err(MergeError::DuplicateBuilding {
            table: target.to_string(),
            id: Some(pair[0].id),
        });
    }
    Ok(rows)
}

/// Runs the merge against a [`HeightStore`].
pub struct BoundaryMergeEngine {
    store: Arc<dyn HeightStore>,
    policy: MergePolicy,
}

impl BoundaryMergeEngine {
    pub fn new(store: Arc<dyn HeightStore>, policy: MergePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &MergePolicy {
        &self.policy
    }

    /// Merge the run tables into `tables.target` and drop the inputs.
    ///
    /// Returns the number of rows in the final table.
    pub fn merge(&self, tables: &MergeTables) -> Result<usize, MergeError> {
        tables.check_distinct()?;

        for input in tables.inputs() {
            let rows = self.store.row_count(input)?;
            info!(table = %input, rows, "merge input");
        }

        let rows = match self.store.merge(tables, &self.policy) {
            Ok(rows) => rows,
            Err(e @ MergeError::DuplicateBuilding { .. }) => {
                warn!(target_table = %tables.target, error = %e, "final table violates building uniqueness");
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        info!(
            table = %tables.target,
            rows,
            required_fields = self.policy.required().len(),
            "boundary merge complete"
        );
        Ok(rows)
    }
}
