//! Bounded worker pool and retry controller.
//!
//! ```text
//!   RetryController ── attempt 1..=max ──► Scheduler::run(tiles)
//!                                           │
//!                     WorkQueue (preloaded, closed)
//!                       │      │      │
//!                    worker  worker  worker ──► TileExecutor::execute
//!                                           │
//!                      skipped tiles ◄──────┘ (re-queued next attempt)
//! ```
//!
//! Tiles are independent; nothing is ordered between them and results are
//! collected as maps keyed by tile.

mod pool;
mod queue;
mod retry;

pub use pool::{Scheduler, SchedulerPass};
pub use queue::WorkQueue;
pub use retry::{RetryController, RetryPolicy, RunSummary};

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the pool itself. Tile failures are skip outcomes instead.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("scheduler needs at least one worker thread")]
    NoThreads,

    #[error("no worker thread could be started")]
    NoWorkers,

    #[error("cannot create work directory {}: {source}", .path.display())]
    WorkDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
