//! Per-tile results.

use std::fmt;
use std::path::PathBuf;

use crate::tile::TileId;

/// Why a tile produced nothing. Every reason is retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No point cloud file resolves for the tile.
    NoElevationData,
    /// The tool exited non-zero, or was killed by a signal (`None`).
    ToolFailed { code: Option<i32> },
    TimedOut,
    /// Exit 0 without a non-empty output file.
    EmptyOutput,
    /// The tool could not be started.
    Tool(String),
    /// The tool document could not be written.
    Io(String),
    /// The elevation index query failed.
    Lookup(String),
    /// The executor panicked.
    Panicked(String),
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoElevationData => f.write_str("no elevation data"),
            SkipReason::ToolFailed { code: Some(code) } => {
                write!(f, "draping tool exited with status {}", code)
            }
            SkipReason::ToolFailed { code: None } => {
                f.write_str("draping tool terminated by signal")
            }
            SkipReason::TimedOut => f.write_str("draping tool timed out"),
            SkipReason::EmptyOutput => f.write_str("draping tool produced no output"),
            SkipReason::Tool(e) => write!(f, "cannot run draping tool: {}", e),
            SkipReason::Io(e) => write!(f, "i/o error: {}", e),
            SkipReason::Lookup(e) => write!(f, "elevation lookup failed: {}", e),
            SkipReason::Panicked(e) => write!(f, "task panicked: {}", e),
            SkipReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What one execution of a tile yielded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Produced(PathBuf),
    Skipped(SkipReason),
}

impl TaskOutcome {
    pub fn is_produced(&self) -> bool {
        matches!(self, TaskOutcome::Produced(_))
    }
}

/// Outcome tagged with its tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub tile: TileId,
    pub outcome: TaskOutcome,
}

impl TaskResult {
    pub fn new(tile: TileId, outcome: TaskOutcome) -> Self {
        Self { tile, outcome }
    }

    pub fn skipped(tile: TileId, reason: SkipReason) -> Self {
        Self::new(tile, TaskOutcome::Skipped(reason))
    }
}
