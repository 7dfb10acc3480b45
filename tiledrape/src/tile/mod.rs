//! Tile identifiers, tile selection and tile bounds.
//!
//! A tile is the unit of work of every scheduler pass: one external draping
//! run per tile. Tile ids correlate the footprint index, the elevation index,
//! the point-cloud file index and the imported height rows, so they are
//! normalised to lower case on construction.

mod bounds;
mod id;
mod selection;

pub use bounds::TileBounds;
pub use id::TileId;
pub use selection::TileSelection;
