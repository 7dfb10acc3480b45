//! Pipeline configuration loaded from `~/.tiledrape/config.ini`.
//!
//! One settings struct per INI section, parsed and validated once. Stage
//! specific types (point cloud sources, tool settings, run configurations)
//! are derived from these by the pipeline.

mod defaults;
mod file;
mod parser;
mod settings;
mod writer;

pub use defaults::*;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::*;
