//! Case-insensitive tile identifier.

use std::fmt;
use std::str::FromStr;

/// Case-insensitive tile key.
///
/// ```
/// use tiledrape::tile::TileId;
///
/// assert_eq!(TileId::new("37HN1"), TileId::new("37hn1"));
/// assert_eq!(TileId::new("t_37hn1").strip_prefix("t_"), TileId::new("37hn1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(String);

impl TileId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remove `prefix` once from the front of the id.
    ///
    /// Footprint tile views may carry a naming prefix that the elevation
    /// index does not; the comparison is case-insensitive.
    pub fn strip_prefix(&self, prefix: &str) -> TileId {
        let prefix = prefix.to_lowercase();
        match self.0.strip_prefix(prefix.as_str()) {
            Some(rest) if !prefix.is_empty() => TileId(rest.to_string()),
            _ => self.clone(),
        }
    }

    /// File stem of the tool output for this tile.
    ///
    /// The clip prefix marks clipped footprint views and is not part of the
    /// output name.
    pub fn output_stem(&self, clip_prefix: Option<&str>) -> String {
        match clip_prefix {
            Some(prefix) => self.strip_prefix(prefix).0,
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TileId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TileId::new(s))
    }
}

impl From<&str> for TileId {
    fn from(s: &str) -> Self {
        TileId::new(s)
    }
}

impl AsRef<str> for TileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_normalises_case_and_whitespace() {
        assert_eq!(TileId::new("  25GN1 ").as_str(), "25gn1");
    }

    #[test]
    fn test_hash_is_case_insensitive() {
        let set: HashSet<TileId> = ["37HN1", "37hn1", "37Hn1"].iter().map(TileId::new).collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_strip_prefix_only_once() {
        let id = TileId::new("t_t_25gn1");
        assert_eq!(id.strip_prefix("T_").as_str(), "t_25gn1");
    }

    #[test]
    fn test_strip_prefix_absent_is_identity() {
        let id = TileId::new("25gn1");
        assert_eq!(id.strip_prefix("t_"), id);
        assert_eq!(id.strip_prefix(""), id);
    }

    #[test]
    fn test_output_stem() {
        let id = TileId::new("c_25gn1");
        assert_eq!(id.output_stem(Some("c_")), "25gn1");
        assert_eq!(id.output_stem(None), "c_25gn1");
    }
}
