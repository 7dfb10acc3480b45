//! Value types shared by the store implementations.

use std::fmt;

use chrono::NaiveDate;

use super::sql::quote_ident;
use crate::tile::TileId;

/// Elevation acquisition a tile or height row comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoverageVersion(pub i16);

impl fmt::Display for CoverageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coverage version and source file date of an elevation tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageInfo {
    pub version: CoverageVersion,
    pub file_date: Option<NaiveDate>,
}

/// An elevation index row matched to a footprint tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevationTile {
    pub id: TileId,
    pub version: CoverageVersion,
}

/// How footprint tiles map to elevation tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileMatch {
    /// Both tilings share ids.
    Identical,
    /// Elevation tiles whose geometry intersects the footprint tile.
    #[default]
    Intersecting,
}

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Same schema, name with `suffix` appended.
    pub fn with_suffix(&self, suffix: &str) -> TableRef {
        TableRef::new(self.schema.clone(), format!("{}{}", self.name, suffix))
    }

    /// Same schema, different name.
    pub fn sibling(&self, name: impl Into<String>) -> TableRef {
        TableRef::new(self.schema.clone(), name)
    }

    /// Quoted `"schema"."name"` for SQL text.
    pub fn qualified(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    /// Quoted name for an index on this table, e.g. `"buildings_tile_id_idx"`.
    pub fn index_name(&self, column: &str) -> String {
        quote_ident(&format!("{}_{}_idx", self.name, column))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}
