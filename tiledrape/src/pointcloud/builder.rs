//! Builder for [`PointCloudIndex`].

use super::error::IndexError;
use super::index::PointCloudIndex;
use super::parallel::{merge_partial_indexes, scan_sources_parallel};
use super::source::SourceEntry;

/// Collects source entries, then scans and merges them in `build()`.
///
/// Only the directories added here are read, so output directories written
/// by earlier runs never leak into the index.
#[derive(Debug, Default)]
pub struct PointCloudIndexBuilder {
    entries: Vec<SourceEntry>,
}

impl PointCloudIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entry(mut self, entry: SourceEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn add_entries(mut self, entries: impl IntoIterator<Item = SourceEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    /// Scan every directory and merge the results by priority.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] for the first directory that cannot be read.
    pub fn build(self) -> Result<PointCloudIndex, IndexError> {
        if self.entries.is_empty() {
            return Ok(PointCloudIndex::default());
        }

        tracing::info!(directories = self.entries.len(), "Indexing point cloud files");

        let mut entries = self.entries;
        entries.sort_by_key(|e| e.priority);
        let directories = entries.iter().map(|e| e.directory.clone()).collect();

        let partials = scan_sources_parallel(&entries)?;
        let index = PointCloudIndex::new(merge_partial_indexes(partials), directories);

        tracing::info!(
            tiles = index.len(),
            files = index.file_count(),
            "Point cloud index built"
        );
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointcloud::NamePattern;
    use crate::tile::TileId;
    use tempfile::TempDir;

    #[test]
    fn test_builder_empty() {
        let index = PointCloudIndexBuilder::new().build().unwrap();
        assert!(index.is_empty());
        assert!(index.directories().is_empty());
    }

    #[test]
    fn test_builder_orders_directories_by_priority() {
        let temp = TempDir::new().unwrap();
        let low = temp.path().join("low");
        let high = temp.path().join("high");
        std::fs::create_dir_all(&low).unwrap();
        std::fs::create_dir_all(&high).unwrap();
        std::fs::write(low.join("t_a.laz"), b"").unwrap();
        std::fs::write(high.join("t_a.laz"), b"").unwrap();

        let pattern = NamePattern::parse("t_{tile}.laz").unwrap();
        let index = PointCloudIndexBuilder::new()
            .add_entry(SourceEntry::new(&low, pattern.clone(), 4))
            .add_entry(SourceEntry::new(&high, pattern, 1))
            .build()
            .unwrap();

        assert_eq!(index.directories(), &[high.clone(), low]);
        let files = index.files_for(&TileId::new("a")).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].starts_with(std::path::absolute(&high).unwrap()));
    }
}
