//! The merged tile → files lookup.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::tile::TileId;

/// Immutable tile → elevation file lookup, built by
/// [`super::PointCloudIndexBuilder`].
#[derive(Debug, Clone, Default)]
pub struct PointCloudIndex {
    files: HashMap<TileId, Vec<PathBuf>>,
    directories: Vec<PathBuf>,
}

impl PointCloudIndex {
    pub(super) fn new(files: HashMap<TileId, Vec<PathBuf>>, directories: Vec<PathBuf>) -> Self {
        Self { files, directories }
    }

    /// Files for one elevation tile.
    pub fn files_for(&self, tile: &TileId) -> Option<&[PathBuf]> {
        self.files.get(tile).map(Vec::as_slice)
    }

    /// Files of every tile in `tiles` that the index knows, in the order the
    /// tiles are given. Unknown tiles contribute nothing.
    pub fn resolve<'a>(&self, tiles: impl IntoIterator<Item = &'a TileId>) -> Vec<PathBuf> {
        tiles
            .into_iter()
            .filter_map(|tile| self.files.get(tile))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn contains(&self, tile: &TileId) -> bool {
        self.files.contains_key(tile)
    }

    /// Tile ids in sorted order.
    pub fn tiles(&self) -> Vec<&TileId> {
        let mut tiles: Vec<&TileId> = self.files.keys().collect();
        tiles.sort();
        tiles
    }

    /// Number of indexed tiles.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total number of indexed files.
    pub fn file_count(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }

    /// Directories that were scanned, in priority order.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

impl FromIterator<(TileId, Vec<PathBuf>)> for PointCloudIndex {
    /// Index over already resolved files, without scanned directories.
    fn from_iter<I: IntoIterator<Item = (TileId, Vec<PathBuf>)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect(), Vec::new())
    }
}
