//! Point-cloud file index.
//!
//! Maps tile ids to the elevation files that cover them, across several
//! source directories with a priority each. Directories listed together in a
//! group share a priority and their files are all used; otherwise the
//! higher priority (lower number) directory wins for a tile.
//!
//! ```text
//!   directories = /ahn3, [/ahn2/a, /ahn2/b], /fallback
//!   priority:      0      1        1         2
//! ```
//!
//! Each directory is scanned independently on the rayon pool, producing a
//! [`PartialIndex`]; partials are then merged from the lowest priority up.
//!
//! ```no_run
//! use tiledrape::pointcloud::{NamePattern, PointCloudIndexBuilder, SourceEntry};
//!
//! let index = PointCloudIndexBuilder::new()
//!     .add_entry(SourceEntry::new("/data/ahn3", NamePattern::parse("C_{tile}.LAZ")?, 0))
//!     .add_entry(SourceEntry::new("/data/ahn2", NamePattern::parse("u{tile}.laz")?, 1))
//!     .build()?;
//! # Ok::<(), tiledrape::pointcloud::IndexError>(())
//! ```

mod builder;
mod error;
mod index;
mod parallel;
mod source;

pub use builder::PointCloudIndexBuilder;
pub use error::IndexError;
pub use index::PointCloudIndex;
pub use parallel::{merge_partial_indexes, scan_entry, scan_sources_parallel, PartialIndex};
pub use source::{parse_dataset_list, source_entries, DatasetItem, NamePattern, SourceEntry};
