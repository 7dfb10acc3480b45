//! Which footprint tiles a pipeline run covers.

use super::{TileBounds, TileId};
use std::fmt;

/// Tile selection for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum TileSelection {
    /// Every tile of the footprint tile index.
    All,
    /// An explicit list of tile ids.
    List(Vec<TileId>),
    /// Footprint tiles intersecting a polygon, given as WKT.
    Extent(String),
}

impl TileSelection {
    /// Parse the `[tiles] list` value: `all` or a comma separated id list.
    ///
    /// Returns `None` for an empty value so callers can fall back to an
    /// extent.
    pub fn parse_list(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        if value.eq_ignore_ascii_case("all") {
            return Some(TileSelection::All);
        }
        let mut tiles: Vec<TileId> = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(TileId::new)
            .collect();
        tiles.dedup();
        Some(TileSelection::List(tiles))
    }

    /// Bounding box of an extent selection.
    pub fn extent_bounds(&self) -> Option<TileBounds> {
        match self {
            TileSelection::Extent(wkt) => TileBounds::from_wkt(wkt),
            _ => None,
        }
    }
}

impl fmt::Display for TileSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileSelection::All => f.write_str("all"),
            TileSelection::List(tiles) => {
                let ids: Vec<&str> = tiles.iter().map(TileId::as_str).collect();
                f.write_str(&ids.join(","))
            }
            TileSelection::Extent(wkt) => write!(f, "extent {}", wkt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all() {
        assert_eq!(TileSelection::parse_list(" ALL "), Some(TileSelection::All));
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        let selection = TileSelection::parse_list("25GN1, ,37hn2,").unwrap();
        assert_eq!(
            selection,
            TileSelection::List(vec![TileId::new("25gn1"), TileId::new("37hn2")])
        );
        assert_eq!(selection.to_string(), "25gn1,37hn2");
    }

    #[test]
    fn test_parse_empty_is_none() {
        assert_eq!(TileSelection::parse_list("   "), None);
    }

    #[test]
    fn test_extent_bounds() {
        let selection = TileSelection::Extent("POLYGON((0 0, 10 0, 10 5, 0 5, 0 0))".into());
        let bounds = selection.extent_bounds().unwrap();
        assert_eq!(bounds, TileBounds::new(0.0, 0.0, 10.0, 5.0));
        assert!(TileSelection::All.extent_bounds().is_none());
    }
}
