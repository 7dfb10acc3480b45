//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, path, show)
//! - [`index`] - Point cloud index inspection
//! - [`merge`] - Merge already published run tables
//! - [`plan`] - Tile classification without processing
//! - [`run`] - Main command (all runs, then merge)

pub mod config;
pub mod index;
pub mod merge;
pub mod plan;
pub mod run;

use tiledrape::tile::TileId;

/// Comma separated tile list for terminal output.
pub(crate) fn tile_list(tiles: &[TileId]) -> String {
    if tiles.is_empty() {
        return "-".to_string();
    }
    tiles.iter().map(TileId::as_str).collect::<Vec<_>>().join(", ")
}
