//! Tile task execution: one footprint tile in, one tool output file out.

mod executor;
mod outcome;

pub use executor::{DrapeTaskExecutor, OutputFormat, TaskSpec, TileExecutor};
pub use outcome::{SkipReason, TaskOutcome, TaskResult};
