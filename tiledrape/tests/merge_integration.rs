//! Integration tests for the boundary merge through the in-memory store.

use std::sync::Arc;

use tiledrape::merge::{BoundaryMergeEngine, BuildingRecord, HeightField, MergeError, MergePolicy, MergeTables};
use tiledrape::store::{CoverageVersion, Footprint, HeightStore, MemoryStore, TableRef};
use tiledrape::tile::TileId;

// =============================================================================
// Test Helpers
// =============================================================================

fn record(id: i64, tile: &str, height: Option<f32>, version: i16) -> BuildingRecord {
    let mut record = BuildingRecord::new(id, TileId::new(tile));
    record.ground = [Some(0.5); 6];
    record.roof = [height; 8];
    record.ground_points = Some(12);
    record.roof_points = Some(40);
    record.version = Some(CoverageVersion(version));
    record
}

struct Fixture {
    store: Arc<MemoryStore>,
    tables: MergeTables,
}

fn fixture(ids: &[i64]) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    for &id in ids {
        store.add_footprint(Footprint {
            id,
            construction: None,
        });
    }
    let tables = MergeTables::for_runs(
        &TableRef::new("bag3d", "heights"),
        TableRef::new("bag3d", "heights_final"),
    );
    Fixture { store, tables }
}

impl Fixture {
    fn publish(&self, table: &TableRef, rows: &[BuildingRecord]) {
        let staging = table.with_suffix("_staging");
        self.store.load_heights(&staging, rows).unwrap();
        self.store.publish_run(&staging, table).unwrap();
    }

    fn publish_all(&self, interior: &[BuildingRecord], old: &[BuildingRecord], new: &[BuildingRecord]) {
        self.publish(&self.tables.interior, interior);
        self.publish(&self.tables.border_old, old);
        self.publish(&self.tables.border_new, new);
    }

    fn merge(&self, policy: MergePolicy) -> Result<usize, MergeError> {
        BoundaryMergeEngine::new(self.store.clone(), policy).merge(&self.tables)
    }

    fn final_row(&self, id: i64) -> BuildingRecord {
        self.store
            .height_rows(&self.tables.target)
            .unwrap()
            .into_iter()
            .find(|r| r.id == id)
            .unwrap()
    }
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn test_complete_new_row_wins() {
    let f = fixture(&[1, 2]);
    f.publish_all(
        &[record(1, "i1", Some(8.0), 3)],
        &[record(2, "b1", Some(5.0), 2)],
        &[record(2, "b1", Some(9.0), 3)],
    );

    assert_eq!(f.merge(MergePolicy::default()).unwrap(), 2);
    let row = f.final_row(2);
    assert_eq!(row.version, Some(CoverageVersion(3)));
    assert_eq!(row.roof[0], Some(9.0));
}

#[test]
fn test_incomplete_new_row_falls_back_to_old() {
    let f = fixture(&[2, 3]);
    let mut partial = record(2, "b1", Some(9.0), 3);
    partial.roof[7] = None;
    f.publish_all(
        &[],
        &[record(2, "b1", Some(5.0), 2), record(3, "b1", Some(6.0), 2)],
        &[partial],
    );

    assert_eq!(f.merge(MergePolicy::default()).unwrap(), 2);
    let row = f.final_row(2);
    assert_eq!(row.version, Some(CoverageVersion(2)));
    assert_eq!(row.roof[0], Some(5.0));
    // building only seen under old coverage
    assert_eq!(f.final_row(3).roof[0], Some(6.0));
}

#[test]
fn test_narrow_policy_accepts_partial_new_row() {
    let f = fixture(&[2]);
    let mut partial = record(2, "b1", Some(9.0), 3);
    partial.roof[7] = None;
    f.publish_all(&[], &[record(2, "b1", Some(5.0), 2)], &[partial]);

    let policy = MergePolicy::requiring(vec![
        HeightField::roof(0).unwrap(),
        HeightField::ground(0).unwrap(),
    ]);
    f.merge(policy).unwrap();
    assert_eq!(f.final_row(2).version, Some(CoverageVersion(3)));
}

#[test]
fn test_undraped_rows_are_dropped() {
    let f = fixture(&[1, 2]);
    let mut undraped = record(2, "i1", None, 3);
    undraped.version = None;
    f.publish_all(&[record(1, "i1", Some(4.0), 3), undraped], &[], &[]);

    assert_eq!(f.merge(MergePolicy::default()).unwrap(), 1);
}

// =============================================================================
// Uniqueness
// =============================================================================

#[test]
fn test_building_in_interior_and_border_is_rejected() {
    let f = fixture(&[7]);
    f.publish_all(
        &[record(7, "i1", Some(4.0), 3)],
        &[record(7, "b1", Some(5.0), 2)],
        &[],
    );

    let err = f.merge(MergePolicy::default()).unwrap_err();
    assert!(matches!(err, MergeError::DuplicateBuilding { id: Some(7), .. }));
}

#[test]
fn test_aliased_tables_are_rejected() {
    let f = fixture(&[]);
    let tables = MergeTables {
        target: f.tables.interior.clone(),
        ..f.tables.clone()
    };
    let err = BoundaryMergeEngine::new(f.store.clone(), MergePolicy::default())
        .merge(&tables)
        .unwrap_err();
    assert!(matches!(err, MergeError::AliasedInput(_)));
}

#[test]
fn test_missing_run_table() {
    let f = fixture(&[1]);
    f.publish(&f.tables.interior, &[record(1, "i1", Some(4.0), 3)]);

    let err = f.merge(MergePolicy::default()).unwrap_err();
    assert!(matches!(err, MergeError::Store(_)));
}
