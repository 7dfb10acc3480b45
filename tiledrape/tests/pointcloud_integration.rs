//! Integration tests for point cloud indexing across prioritised sources.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tiledrape::pointcloud::{parse_dataset_list, source_entries, PointCloudIndexBuilder};
use tiledrape::tile::TileId;

fn touch(dir: &Path, names: &[&str]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    for name in names {
        fs::write(dir.join(name), "points").unwrap();
    }
    dir.to_path_buf()
}

fn file_names(files: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = files
        .iter()
        .filter_map(|f| f.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();
    names.sort();
    names
}

#[test]
fn test_higher_priority_replaces_lower() {
    let temp = TempDir::new().unwrap();
    let new = touch(&temp.path().join("ahn3"), &["C_25gn1.LAZ", "C_25gn2.LAZ"]);
    let old = touch(&temp.path().join("ahn2"), &["g25gn1.laz", "g37hn1.laz"]);

    let directories = parse_dataset_list(&format!("{}, {}", new.display(), old.display())).unwrap();
    let patterns = parse_dataset_list("C_{tile}.LAZ, g{tile}.laz").unwrap();
    let entries = source_entries(&directories, &patterns).unwrap();
    let index = PointCloudIndexBuilder::new().add_entries(entries).build().unwrap();

    assert_eq!(index.len(), 3);
    assert_eq!(file_names(index.files_for(&TileId::new("25GN1")).unwrap()), vec!["C_25gn1.LAZ"]);
    assert_eq!(file_names(index.files_for(&TileId::new("37hn1")).unwrap()), vec!["g37hn1.laz"]);
    assert_eq!(index.directories(), &[new, old]);
}

#[test]
fn test_equal_priority_group_unions_files() {
    let temp = TempDir::new().unwrap();
    let a = touch(&temp.path().join("a"), &["25gn1_a.laz"]);
    let b = touch(&temp.path().join("b"), &["25gn1_b.laz", "25gn2_b.laz"]);

    let directories =
        parse_dataset_list(&format!("[{}, {}]", a.display(), b.display())).unwrap();
    let patterns = parse_dataset_list("[{tile}_a.laz, {tile}_b.laz]").unwrap();
    let entries = source_entries(&directories, &patterns).unwrap();
    assert!(entries.iter().all(|e| e.priority == 0));

    let index = PointCloudIndexBuilder::new().add_entries(entries).build().unwrap();
    assert_eq!(
        file_names(index.files_for(&TileId::new("25gn1")).unwrap()),
        vec!["25gn1_a.laz", "25gn1_b.laz"]
    );

    let resolved = index.resolve([&TileId::new("25gn1"), &TileId::new("25gn2"), &TileId::new("x")]);
    assert_eq!(resolved.len(), 3);
}

#[test]
fn test_mismatched_lists_are_rejected() {
    let directories = parse_dataset_list("/a, /b").unwrap();
    let patterns = parse_dataset_list("{tile}.laz").unwrap();
    assert!(source_entries(&directories, &patterns).is_err());
}

#[test]
fn test_unreadable_directory_fails_build() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing");
    let directories = parse_dataset_list(&missing.display().to_string()).unwrap();
    let patterns = parse_dataset_list("{tile}.laz").unwrap();
    let entries = source_entries(&directories, &patterns).unwrap();

    assert!(PointCloudIndexBuilder::new().add_entries(entries).build().is_err());
}
