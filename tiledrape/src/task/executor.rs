//! Drapes one footprint tile.
//!
//! For a tile the executor finds the overlapping elevation tiles, resolves
//! their point cloud files, writes the tool document into the work
//! directory and runs the draping tool. Every failure ends up as a
//! [`SkipReason`]; the executor itself never returns an error.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{SkipReason, TaskOutcome};
use crate::drape::{DrapeDocument, DrapeTool, FootprintSource, LiftingParameters, ToolStatus};
use crate::log::Logger;
use crate::pointcloud::PointCloudIndex;
use crate::store::{CoverageVersion, ElevationIndex, TableRef, TileMatch};
use crate::tile::TileId;
use crate::{log_debug, log_warn};

/// Output file kind requested from the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Obj,
}

impl OutputFormat {
    /// `obj` when the configured format names it, `csv` otherwise.
    pub fn from_setting(value: &str) -> Self {
        if value.to_lowercase().contains("obj") {
            OutputFormat::Obj
        } else {
            OutputFormat::Csv
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Obj => "obj",
        }
    }
}

/// Everything about a run that is the same for each of its tiles.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub elevation_index: TableRef,
    pub tile_match: TileMatch,
    pub footprint: FootprintSource,
    /// Prepended to a footprint tile id to name its footprint view.
    pub tile_prefix: String,
    /// Removed from the view name to form the output file stem.
    pub clip_prefix: Option<String>,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    /// Tool documents are written here and removed after the tool ran.
    pub work_dir: PathBuf,
}

impl TaskSpec {
    /// Footprint view name of a tile.
    pub fn view_of(&self, tile: &TileId) -> TileId {
        TileId::new(format!("{}{}", self.tile_prefix, tile))
    }

    /// Where the tool writes its result for `tile`.
    pub fn output_path(&self, tile: &TileId) -> PathBuf {
        let stem = self.view_of(tile).output_stem(self.clip_prefix.as_deref());
        self.output_dir
            .join(format!("{}.{}", stem, self.output_format.extension()))
    }

    fn document_path(&self, tile: &TileId) -> PathBuf {
        self.work_dir.join(format!("{}.yml", self.view_of(tile)))
    }
}

/// Processes a single tile. Called concurrently by scheduler workers.
pub trait TileExecutor: Send + Sync {
    fn execute(&self, tile: &TileId, cancel: &CancellationToken) -> TaskOutcome;
}

/// [`TileExecutor`] backed by an elevation index, a point cloud file index
/// and an external [`DrapeTool`].
pub struct DrapeTaskExecutor {
    spec: TaskSpec,
    index: Arc<PointCloudIndex>,
    elevation: Arc<dyn ElevationIndex>,
    tool: Arc<dyn DrapeTool>,
    lifting: LiftingParameters,
    logger: Arc<dyn Logger>,
}

impl DrapeTaskExecutor {
    pub fn new(
        spec: TaskSpec,
        index: Arc<PointCloudIndex>,
        elevation: Arc<dyn ElevationIndex>,
        tool: Arc<dyn DrapeTool>,
        lifting: LiftingParameters,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            spec,
            index,
            elevation,
            tool,
            lifting,
            logger,
        }
    }

    pub fn spec(&self) -> &TaskSpec {
        &self.spec
    }

    /// Point cloud files and coverage versions for a tile.
    ///
    /// Elevation tiles without files in the point cloud index are ignored.
    fn inputs_for(
        &self,
        tile: &TileId,
    ) -> Result<(Vec<PathBuf>, BTreeSet<CoverageVersion>), SkipReason> {
        let elevation = self
            .elevation
            .elevation_tiles_for(tile, &self.spec.elevation_index, self.spec.tile_match)
            .map_err(|e| SkipReason::Lookup(e.to_string()))?;

        let mut versions = BTreeSet::new();
        let mut covered = Vec::new();
        for candidate in &elevation {
            if self.index.contains(&candidate.id) {
                versions.insert(candidate.version);
                covered.push(&candidate.id);
            } else {
                log_debug!(
                    self.logger,
                    "tile {}: no point cloud file for elevation tile {}",
                    tile,
                    candidate.id
                );
            }
        }

        let files = self.index.resolve(covered);
        if files.is_empty() {
            return Err(SkipReason::NoElevationData);
        }
        Ok((files, versions))
    }

    fn write_document(
        &self,
        tile: &TileId,
        files: &[PathBuf],
        versions: &BTreeSet<CoverageVersion>,
    ) -> Result<PathBuf, SkipReason> {
        let view = self.spec.view_of(tile);
        let document = DrapeDocument::new(
            &self.spec.footprint,
            view.as_str(),
            files,
            versions,
            &self.lifting,
        );
        let yaml = document
            .to_yaml()
            .map_err(|e| SkipReason::Io(e.to_string()))?;

        let path = self.spec.document_path(tile);
        fs::write(&path, yaml)
            .map_err(|e| SkipReason::Io(format!("{}: {}", path.display(), e)))?;
        Ok(path)
    }

    fn remove_document(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            log_warn!(
                self.logger,
                "cannot remove tool document {}: {}",
                path.display(),
                e
            );
        }
    }
}

impl TileExecutor for DrapeTaskExecutor {
    fn execute(&self, tile: &TileId, cancel: &CancellationToken) -> TaskOutcome {
        if cancel.is_cancelled() {
            return TaskOutcome::Skipped(SkipReason::Cancelled);
        }

        let (files, versions) = match self.inputs_for(tile) {
            Ok(inputs) => inputs,
            Err(reason) => return TaskOutcome::Skipped(reason),
        };
        log_debug!(
            self.logger,
            "tile {}: {} point cloud files, versions {:?}",
            tile,
            files.len(),
            versions
        );

        let document = match self.write_document(tile, &files, &versions) {
            Ok(path) => path,
            Err(reason) => return TaskOutcome::Skipped(reason),
        };

        let output = self.spec.output_path(tile);
        let status = self.tool.run(&document, &output, cancel);
        self.remove_document(&document);

        match status {
            Ok(ToolStatus::Success) => {
                let written = fs::metadata(&output).map(|m| m.len() > 0).unwrap_or(false);
                if written {
                    TaskOutcome::Produced(output)
                } else {
                    TaskOutcome::Skipped(SkipReason::EmptyOutput)
                }
            }
            Ok(ToolStatus::Failed { code }) => TaskOutcome::Skipped(SkipReason::ToolFailed { code }),
            Ok(ToolStatus::TimedOut) => TaskOutcome::Skipped(SkipReason::TimedOut),
            Ok(ToolStatus::Cancelled) => TaskOutcome::Skipped(SkipReason::Cancelled),
            Err(e) => TaskOutcome::Skipped(SkipReason::Tool(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFile;
    use crate::drape::ToolError;
    use crate::log::NoOpLogger;
    use crate::store::{IndexRow, MemoryStore};
    use crate::tile::TileBounds;
    use parking_lot::Mutex;
    use tempfile::TempDir;

    /// Writes `contents` to the output and records the document it was given.
    struct FakeTool {
        contents: &'static str,
        status: ToolStatus,
        documents: Mutex<Vec<String>>,
    }

    impl FakeTool {
        fn new(contents: &'static str, status: ToolStatus) -> Self {
            Self {
                contents,
                status,
                documents: Mutex::new(Vec::new()),
            }
        }
    }

    impl DrapeTool for FakeTool {
        fn run(
            &self,
            document: &Path,
            output: &Path,
            _cancel: &CancellationToken,
        ) -> Result<ToolStatus, ToolError> {
            self.documents
                .lock()
                .push(fs::read_to_string(document).unwrap());
            fs::write(output, self.contents).unwrap();
            Ok(self.status)
        }
    }

    fn index_table() -> TableRef {
        TableRef::new("tile_index", "ahn_index")
    }

    fn store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        store.add_footprint_tile("a1", TileBounds::new(0.0, 0.0, 10.0, 10.0));
        store.add_footprint_tile("a2", TileBounds::new(50.0, 50.0, 60.0, 60.0));
        store
            .add_index_rows(
                &index_table(),
                [
                    IndexRow::new("e1", TileBounds::new(0.0, 0.0, 5.0, 10.0), 3),
                    IndexRow::new("e2", TileBounds::new(5.0, 0.0, 10.0, 10.0), 2),
                    IndexRow::new("e3", TileBounds::new(50.0, 50.0, 60.0, 60.0), 3),
                ],
            )
            .unwrap();
        Arc::new(store)
    }

    fn spec(temp: &TempDir) -> TaskSpec {
        TaskSpec {
            elevation_index: index_table(),
            tile_match: TileMatch::Intersecting,
            footprint: FootprintSource::new(&ConfigFile::default().database, "bag_tiles", "gid"),
            tile_prefix: "t_".to_string(),
            clip_prefix: None,
            output_dir: temp.path().to_path_buf(),
            output_format: OutputFormat::Csv,
            work_dir: temp.path().to_path_buf(),
        }
    }

    fn executor(temp: &TempDir, tool: Arc<dyn DrapeTool>) -> DrapeTaskExecutor {
        let index: PointCloudIndex = [
            (TileId::new("e1"), vec![PathBuf::from("/ahn3/c_e1.laz")]),
            (TileId::new("e2"), vec![PathBuf::from("/ahn2/g_e2.laz")]),
        ]
        .into_iter()
        .collect();
        let lifting =
            LiftingParameters::from_settings(&ConfigFile::default().drape, CoverageVersion(2));
        DrapeTaskExecutor::new(
            spec(temp),
            Arc::new(index),
            store(),
            tool,
            lifting,
            Arc::new(NoOpLogger),
        )
    }

    #[test]
    fn test_output_format_from_setting() {
        assert_eq!(OutputFormat::from_setting("CSV-BUILDINGS-MULTIPLE"), OutputFormat::Csv);
        assert_eq!(OutputFormat::from_setting("OBJ"), OutputFormat::Obj);
        assert_eq!(OutputFormat::Obj.extension(), "obj");
    }

    #[test]
    fn test_output_path_strips_clip_prefix() {
        let temp = TempDir::new().unwrap();
        let mut spec = spec(&temp);
        spec.tile_prefix = "c_t_".to_string();
        spec.clip_prefix = Some("c_".to_string());

        let path = spec.output_path(&TileId::new("37HN1"));
        assert_eq!(path, temp.path().join("t_37hn1.csv"));
    }

    #[test]
    fn test_execute_produces_output() {
        let temp = TempDir::new().unwrap();
        let tool = Arc::new(FakeTool::new("id\n1,2\n", ToolStatus::Success));
        let executor = executor(&temp, tool.clone());

        let outcome = executor.execute(&TileId::new("a1"), &CancellationToken::new());

        assert_eq!(outcome, TaskOutcome::Produced(temp.path().join("t_a1.csv")));
        let documents = tool.documents.lock();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].contains("/ahn3/c_e1.laz"));
        assert!(documents[0].contains("/ahn2/g_e2.laz"));
        assert!(documents[0].contains("tables=t_a1"));
        assert!(!temp.path().join("t_a1.yml").exists());
    }

    #[test]
    fn test_execute_without_point_clouds_skips() {
        let temp = TempDir::new().unwrap();
        let tool = Arc::new(FakeTool::new("x", ToolStatus::Success));
        let executor = executor(&temp, tool.clone());

        // a2 only overlaps e3, which has no file in the point cloud index
        let outcome = executor.execute(&TileId::new("a2"), &CancellationToken::new());

        assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::NoElevationData));
        assert!(tool.documents.lock().is_empty());
    }

    #[test]
    fn test_execute_empty_output_skips() {
        let temp = TempDir::new().unwrap();
        let executor = executor(&temp, Arc::new(FakeTool::new("", ToolStatus::Success)));

        let outcome = executor.execute(&TileId::new("a1"), &CancellationToken::new());
        assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::EmptyOutput));
    }

    #[test]
    fn test_execute_maps_tool_failure() {
        let temp = TempDir::new().unwrap();
        let tool = FakeTool::new("partial", ToolStatus::Failed { code: Some(2) });
        let executor = executor(&temp, Arc::new(tool));

        let outcome = executor.execute(&TileId::new("a1"), &CancellationToken::new());
        assert_eq!(
            outcome,
            TaskOutcome::Skipped(SkipReason::ToolFailed { code: Some(2) })
        );
    }

    #[test]
    fn test_execute_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let tool = Arc::new(FakeTool::new("x", ToolStatus::Success));
        let executor = executor(&temp, tool.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = executor.execute(&TileId::new("a1"), &cancel);

        assert_eq!(outcome, TaskOutcome::Skipped(SkipReason::Cancelled));
        assert!(tool.documents.lock().is_empty());
    }

    #[test]
    fn test_execute_missing_index_table_is_lookup_failure() {
        let temp = TempDir::new().unwrap();
        let mut executor = executor(&temp, Arc::new(FakeTool::new("x", ToolStatus::Success)));
        executor.spec.elevation_index = TableRef::new("tile_index", "missing");

        let outcome = executor.execute(&TileId::new("a1"), &CancellationToken::new());
        assert!(matches!(outcome, TaskOutcome::Skipped(SkipReason::Lookup(_))));
    }
}
