//! Parallel directory scanning and priority merge.
//!
//! Every source directory is scanned on the rayon pool into a
//! [`PartialIndex`]. Partials are merged from the lowest priority to the
//! highest: directories of equal priority are concatenated into one group
//! first, then each group replaces the tiles it has in the running result.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use super::error::IndexError;
use super::source::SourceEntry;
use crate::tile::TileId;

/// Files found in one source directory.
#[derive(Debug)]
pub struct PartialIndex {
    /// Position of the entry in the configured list.
    pub entry_idx: usize,
    pub priority: usize,
    pub directory: PathBuf,
    pub files: HashMap<TileId, Vec<PathBuf>>,
    pub file_count: usize,
}

impl PartialIndex {
    pub fn new(entry_idx: usize, entry: &SourceEntry) -> Self {
        Self {
            entry_idx,
            priority: entry.priority,
            directory: entry.directory.clone(),
            files: HashMap::new(),
            file_count: 0,
        }
    }

    pub fn add_file(&mut self, tile: TileId, path: PathBuf) {
        self.files.entry(tile).or_default().push(path);
        self.file_count += 1;
    }
}

/// Scan the regular files directly inside one source directory.
///
/// Subdirectories are not descended into. File names are visited in sorted
/// order so the resulting lists are deterministic.
pub fn scan_entry(entry_idx: usize, entry: &SourceEntry) -> Result<PartialIndex, IndexError> {
    let io_err = |source| IndexError::Io {
        path: entry.directory.clone(),
        source,
    };

    let mut partial = PartialIndex::new(entry_idx, entry);
    let mut paths: Vec<PathBuf> = Vec::new();
    for dir_entry in std::fs::read_dir(&entry.directory).map_err(io_err)? {
        let dir_entry = dir_entry.map_err(io_err)?;
        let file_type = dir_entry.file_type().map_err(io_err)?;
        let path = dir_entry.path();
        if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            paths.push(path);
        }
    }
    paths.sort();

    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(tile) = entry.pattern.tile_of(name) {
            let absolute = std::path::absolute(&path).unwrap_or_else(|_| path.clone());
            partial.add_file(tile, absolute);
        }
    }

    tracing::debug!(
        directory = %entry.directory.display(),
        tiles = partial.files.len(),
        files = partial.file_count,
        "Scanned point cloud directory"
    );

    Ok(partial)
}

/// Scan all entries in parallel.
///
/// The first unreadable directory aborts the scan.
pub fn scan_sources_parallel(entries: &[SourceEntry]) -> Result<Vec<PartialIndex>, IndexError> {
    let total_files = AtomicUsize::new(0);

    let partials: Result<Vec<PartialIndex>, IndexError> = entries
        .par_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let partial = scan_entry(idx, entry)?;
            total_files.fetch_add(partial.file_count, Ordering::Relaxed);
            Ok(partial)
        })
        .collect();

    tracing::debug!(
        directories = entries.len(),
        files = total_files.load(Ordering::Relaxed),
        "Point cloud scan complete"
    );

    partials
}

/// Merge partial indexes by priority.
///
/// Within a priority, file lists are appended in configured order. Across
/// priorities, a tile found at a higher priority replaces the lower-priority
/// files entirely; tiles found only at one level are kept.
pub fn merge_partial_indexes(mut partials: Vec<PartialIndex>) -> HashMap<TileId, Vec<PathBuf>> {
    partials.sort_by_key(|p| p.entry_idx);

    let mut groups: BTreeMap<usize, HashMap<TileId, Vec<PathBuf>>> = BTreeMap::new();
    for partial in partials {
        let group = groups.entry(partial.priority).or_default();
        for (tile, files) in partial.files {
            group.entry(tile).or_default().extend(files);
        }
    }

    let mut merged: HashMap<TileId, Vec<PathBuf>> = HashMap::new();
    for (_, group) in groups.into_iter().rev() {
        merged.extend(group);
    }
    merged
}
