//! Index command - scan the point cloud directories and report coverage.

use tiledrape::pointcloud::{source_entries, PointCloudIndexBuilder};
use tiledrape::tile::TileId;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the index command.
#[derive(Debug, Default)]
pub struct IndexArgs {
    /// Tiles to list files for
    pub tiles: Vec<String>,
}

pub fn run(runner: &CliRunner, args: IndexArgs) -> Result<(), CliError> {
    runner.log_startup("index");
    let pointcloud = &runner.config().pointcloud;
    let entries = source_entries(&pointcloud.directories, &pointcloud.patterns)?;

    println!("Point cloud sources (lower priority wins):");
    for entry in &entries {
        println!(
            "  {} {} ({})",
            entry.priority,
            entry.directory.display(),
            entry.pattern
        );
    }

    let index = PointCloudIndexBuilder::new().add_entries(entries).build()?;
    println!();
    println!("{} tiles, {} files", index.len(), index.file_count());

    for tile in args.tiles.iter().map(TileId::new) {
        println!();
        match index.files_for(&tile) {
            Some(files) => {
                println!("{}:", tile);
                for file in files {
                    println!("  {}", file.display());
                }
            }
            None => println!("{}: no files", tile),
        }
    }
    Ok(())
}
