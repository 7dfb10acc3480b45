//! Errors raised while configuring or building the point-cloud index.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// Name pattern without a `{...}` placeholder.
    #[error("file name pattern '{pattern}' has no {{tile}} placeholder")]
    MissingPlaceholder { pattern: String },

    /// Name pattern with more than one placeholder.
    #[error("file name pattern '{pattern}' has more than one placeholder")]
    MultiplePlaceholders { pattern: String },

    /// Placeholder found but the pattern cannot be compiled.
    #[error("invalid file name pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A directory group nested inside another group.
    #[error("dataset lists deeper than 2 levels are not supported (at '{entry}')")]
    NestingTooDeep { entry: String },

    /// Directory and pattern lists have different shapes.
    #[error("dataset directories and name patterns do not line up: {reason}")]
    MismatchedLists { reason: String },

    /// Malformed dataset list syntax.
    #[error("invalid dataset list '{value}': {reason}")]
    InvalidList { value: String, reason: String },

    /// Unreadable source directory.
    #[error("cannot read point cloud directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
