//! Source directory entries and their file name patterns.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};

use super::error::IndexError;
use crate::tile::TileId;

/// One element of a configured dataset list: a single value or a group of
/// values that share a priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetItem {
    Path(String),
    Group(Vec<DatasetItem>),
}

impl fmt::Display for DatasetItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetItem::Path(p) => f.write_str(p),
            DatasetItem::Group(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Parse a comma separated dataset list where `[...]` marks an
/// equal-priority group.
///
/// Nesting is kept as written; [`source_entries`] rejects groups inside
/// groups.
///
/// ```
/// use tiledrape::pointcloud::{parse_dataset_list, DatasetItem};
///
/// let items = parse_dataset_list("/ahn3, [/ahn2/a, /ahn2/b]").unwrap();
/// assert_eq!(items[0], DatasetItem::Path("/ahn3".into()));
/// assert!(matches!(&items[1], DatasetItem::Group(g) if g.len() == 2));
/// ```
pub fn parse_dataset_list(value: &str) -> Result<Vec<DatasetItem>, IndexError> {
    let invalid = |reason: &str| IndexError::InvalidList {
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let mut stack: Vec<Vec<DatasetItem>> = vec![Vec::new()];
    let mut current = String::new();

    for c in value.chars() {
        match c {
            '[' => {
                if !current.trim().is_empty() {
                    return Err(invalid("'[' directly after a value"));
                }
                current.clear();
                stack.push(Vec::new());
            }
            ']' => {
                flush_value(&mut current, &mut stack);
                if stack.len() < 2 {
                    return Err(invalid("unbalanced ']'"));
                }
                let group = stack.pop().unwrap_or_default();
                if group.is_empty() {
                    return Err(invalid("empty group"));
                }
                if let Some(parent) = stack.last_mut() {
                    parent.push(DatasetItem::Group(group));
                }
            }
            ',' => flush_value(&mut current, &mut stack),
            _ => current.push(c),
        }
    }
    flush_value(&mut current, &mut stack);

    if stack.len() != 1 {
        return Err(invalid("unbalanced '['"));
    }
    Ok(stack.pop().unwrap_or_default())
}

fn flush_value(current: &mut String, stack: &mut [Vec<DatasetItem>]) {
    let value = current.trim();
    if !value.is_empty() {
        if let Some(top) = stack.last_mut() {
            top.push(DatasetItem::Path(value.to_string()));
        }
    }
    current.clear();
}

/// File name pattern with a single `{...}` placeholder for the tile id.
///
/// Matching is case-insensitive and unanchored: the tile id is whatever lies
/// between the literal prefix and suffix.
///
/// ```
/// use tiledrape::pointcloud::NamePattern;
///
/// let pattern = NamePattern::parse("C_{tile}.LAZ").unwrap();
/// assert_eq!(pattern.tile_of("c_37HN1.laz").unwrap().as_str(), "37hn1");
/// assert!(pattern.tile_of("readme.txt").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct NamePattern {
    raw: String,
    matcher: Regex,
}

impl NamePattern {
    pub fn parse(raw: &str) -> Result<Self, IndexError> {
        let open = raw.find('{').ok_or_else(|| IndexError::MissingPlaceholder {
            pattern: raw.to_string(),
        })?;
        let close = raw[open..]
            .find('}')
            .map(|offset| open + offset)
            .ok_or_else(|| IndexError::MissingPlaceholder {
                pattern: raw.to_string(),
            })?;

        let prefix = &raw[..open];
        let suffix = &raw[close + 1..];
        if prefix.contains('}') || suffix.contains('{') || suffix.contains('}') {
            return Err(IndexError::MultiplePlaceholders {
                pattern: raw.to_string(),
            });
        }

        let expr = format!("{}(.*){}", regex::escape(prefix), regex::escape(suffix));
        let matcher = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .build()
            .map_err(|e| IndexError::InvalidPattern {
                pattern: raw.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            raw: raw.to_string(),
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Tile id encoded in `file_name`, if the name matches.
    pub fn tile_of(&self, file_name: &str) -> Option<TileId> {
        let captured = self.matcher.captures(file_name)?.get(1)?.as_str();
        if captured.is_empty() {
            return None;
        }
        Some(TileId::new(captured))
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A scanned source directory: path, name pattern and priority.
///
/// Lower priority numbers win.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEntry {
    pub directory: PathBuf,
    pub pattern: NamePattern,
    pub priority: usize,
}

impl SourceEntry {
    pub fn new(directory: impl Into<PathBuf>, pattern: NamePattern, priority: usize) -> Self {
        Self {
            directory: directory.into(),
            pattern,
            priority,
        }
    }

    /// Same entry with a different priority.
    pub fn with_priority(mut self, priority: usize) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_directory(&self, dir: &Path) -> bool {
        self.directory == dir
    }
}

/// Pair configured directories with their patterns.
///
/// The position in the top-level list is the priority. A group of
/// directories may share one pattern or list one pattern per directory.
///
/// # Errors
///
/// [`IndexError::NestingTooDeep`] for a group inside a group,
/// [`IndexError::MismatchedLists`] when the two lists differ in shape, and
/// pattern errors from [`NamePattern::parse`].
pub fn source_entries(
    directories: &[DatasetItem],
    patterns: &[DatasetItem],
) -> Result<Vec<SourceEntry>, IndexError> {
    if directories.len() != patterns.len() {
        return Err(IndexError::MismatchedLists {
            reason: format!(
                "{} directory entries but {} pattern entries",
                directories.len(),
                patterns.len()
            ),
        });
    }

    let mut entries = Vec::new();
    for (priority, (dir, pattern)) in directories.iter().zip(patterns).enumerate() {
        match (dir, pattern) {
            (DatasetItem::Path(d), DatasetItem::Path(p)) => {
                entries.push(SourceEntry::new(d, NamePattern::parse(p)?, priority));
            }
            (DatasetItem::Group(dirs), DatasetItem::Path(p)) => {
                let shared = NamePattern::parse(p)?;
                for d in dirs {
                    let d = leaf(d)?;
                    entries.push(SourceEntry::new(d, shared.clone(), priority));
                }
            }
            (DatasetItem::Group(dirs), DatasetItem::Group(pats)) => {
                if dirs.len() != pats.len() {
                    return Err(IndexError::MismatchedLists {
                        reason: format!("group {} has {} patterns", dir, pats.len()),
                    });
                }
                for (d, p) in dirs.iter().zip(pats) {
                    let d = leaf(d)?;
                    let p = leaf(p)?;
                    entries.push(SourceEntry::new(d, NamePattern::parse(p)?, priority));
                }
            }
            (DatasetItem::Path(d), DatasetItem::Group(_)) => {
                return Err(IndexError::MismatchedLists {
                    reason: format!("single directory '{}' paired with a pattern group", d),
                });
            }
        }
    }
    Ok(entries)
}

fn leaf(item: &DatasetItem) -> Result<&str, IndexError> {
    match item {
        DatasetItem::Path(p) => Ok(p),
        DatasetItem::Group(_) => Err(IndexError::NestingTooDeep {
            entry: item.to_string(),
        }),
    }
}
