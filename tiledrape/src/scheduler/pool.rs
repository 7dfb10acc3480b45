//! Fixed-size worker pool over a shared tile queue.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{SchedulerError, WorkQueue};
use crate::log::Logger;
use crate::task::{SkipReason, TaskOutcome, TaskResult, TileExecutor};
use crate::tile::TileId;
use crate::{log_debug, log_warn};

/// Outcome of one scheduler pass, keyed by tile.
///
/// Tiles complete in any order; both maps are order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerPass {
    pub produced: BTreeMap<TileId, PathBuf>,
    pub skipped: BTreeMap<TileId, SkipReason>,
}

impl SchedulerPass {
    fn record(&mut self, result: TaskResult) {
        match result.outcome {
            TaskOutcome::Produced(path) => {
                self.produced.insert(result.tile, path);
            }
            TaskOutcome::Skipped(reason) => {
                self.skipped.insert(result.tile, reason);
            }
        }
    }

    pub fn skipped_tiles(&self) -> BTreeSet<TileId> {
        self.skipped.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.produced.len() + self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs a [`TileExecutor`] over a tile set with `threads` workers.
///
/// All tiles are queued before the first worker starts. Each worker takes a
/// tile, executes it without holding the queue lock and records the result.
/// A panicking execution is recorded as [`SkipReason::Panicked`] and the
/// worker carries on. Cancelling the token stops workers from taking new
/// tiles; tiles left in the queue are reported as [`SkipReason::Cancelled`].
pub struct Scheduler {
    threads: usize,
    work_dir: Option<PathBuf>,
    logger: Arc<dyn Logger>,
}

impl Scheduler {
    pub fn new(threads: usize, logger: Arc<dyn Logger>) -> Self {
        Self {
            threads,
            work_dir: None,
            logger,
        }
    }

    /// Directory created before each pass and removed after it.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Execute every tile once.
    ///
    /// # Errors
    ///
    /// Fails before any tile runs when the thread count is zero or the work
    /// directory cannot be created, and after the pass when no worker thread
    /// could be started.
    pub fn run(
        &self,
        tiles: &[TileId],
        executor: &dyn TileExecutor,
        cancel: &CancellationToken,
    ) -> Result<SchedulerPass, SchedulerError> {
        if self.threads == 0 {
            return Err(SchedulerError::NoThreads);
        }
        if let Some(dir) = &self.work_dir {
            fs::create_dir_all(dir).map_err(|source| SchedulerError::WorkDir {
                path: dir.clone(),
                source,
            })?;
        }

        let queue = WorkQueue::preloaded(tiles.iter().cloned());
        let results = Mutex::new(Vec::with_capacity(tiles.len()));
        let token = cancel.child_token();
        let workers = self.threads.min(tiles.len().max(1));

        debug!(tiles = tiles.len(), workers, "scheduler pass starting");

        let started = thread::scope(|scope| {
            let mut started = 0;
            for i in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("drape-worker-{}", i))
                    .spawn_scoped(scope, || self.work(&queue, &results, executor, &token));
                match spawned {
                    Ok(_) => started += 1,
                    Err(e) => log_warn!(self.logger, "cannot start worker {}: {}", i, e),
                }
            }
            started
        });

        let mut pass = SchedulerPass::default();
        for result in results.into_inner() {
            pass.record(result);
        }
        for tile in queue.drain() {
            pass.record(TaskResult::skipped(tile, SkipReason::Cancelled));
        }

        self.remove_work_dir();

        if started == 0 {
            return Err(SchedulerError::NoWorkers);
        }
        debug!(
            produced = pass.produced.len(),
            skipped = pass.skipped.len(),
            "scheduler pass finished"
        );
        Ok(pass)
    }

    fn work(
        &self,
        queue: &WorkQueue<TileId>,
        results: &Mutex<Vec<TaskResult>>,
        executor: &dyn TileExecutor,
        cancel: &CancellationToken,
    ) {
        while !cancel.is_cancelled() {
            let Some(tile) = queue.pop() else {
                break;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&tile, cancel)))
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    log_warn!(self.logger, "tile {}: task panicked: {}", tile, message);
                    TaskOutcome::Skipped(SkipReason::Panicked(message))
                });
            if let TaskOutcome::Skipped(reason) = &outcome {
                log_debug!(self.logger, "tile {} skipped: {}", tile, reason);
            }
            results.lock().push(TaskResult::new(tile, outcome));
        }
    }

    fn remove_work_dir(&self) {
        let Some(dir) = &self.work_dir else {
            return;
        };
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(dir) {
                log_warn!(
                    self.logger,
                    "cannot remove work directory {}: {}",
                    dir.display(),
                    e
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Produces `<tile>.csv` unless the tile id starts with `x`.
    struct Deterministic {
        calls: AtomicUsize,
    }

    impl Deterministic {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TileExecutor for Deterministic {
        fn execute(&self, tile: &TileId, _cancel: &CancellationToken) -> TaskOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if tile.as_str().starts_with('x') {
                TaskOutcome::Skipped(SkipReason::NoElevationData)
            } else {
                TaskOutcome::Produced(PathBuf::from(format!("{}.csv", tile)))
            }
        }
    }

    struct Panicking;

    impl TileExecutor for Panicking {
        fn execute(&self, tile: &TileId, _cancel: &CancellationToken) -> TaskOutcome {
            if tile.as_str() == "boom" {
                panic!("draping exploded");
            }
            TaskOutcome::Produced(PathBuf::from(tile.as_str()))
        }
    }

    fn tiles(ids: &[&str]) -> Vec<TileId> {
        ids.iter().map(TileId::new).collect()
    }

    fn scheduler(threads: usize) -> Scheduler {
        Scheduler::new(threads, Arc::new(NoOpLogger))
    }

    #[test]
    fn test_every_tile_executed_once() {
        let executor = Deterministic::new();
        let input = tiles(&["a", "b", "x1", "c", "x2", "d", "e"]);

        let pass = scheduler(3)
            .run(&input, &executor, &CancellationToken::new())
            .unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), input.len());
        assert_eq!(pass.len(), input.len());
        assert_eq!(pass.produced.len(), 5);
        assert_eq!(pass.skipped_tiles(), tiles(&["x1", "x2"]).into_iter().collect());
    }

    #[test]
    fn test_same_skipped_set_across_runs() {
        let input: Vec<TileId> = (0..40)
            .map(|i| TileId::new(if i % 7 == 0 { format!("x{}", i) } else { format!("t{}", i) }))
            .collect();

        let first = scheduler(4)
            .run(&input, &Deterministic::new(), &CancellationToken::new())
            .unwrap();
        let second = scheduler(4)
            .run(&input, &Deterministic::new(), &CancellationToken::new())
            .unwrap();

        assert_eq!(first.skipped_tiles(), second.skipped_tiles());
        assert_eq!(first, second);
    }

    #[test]
    fn test_panic_is_recorded_as_skip() {
        let input = tiles(&["a", "boom", "b"]);

        let pass = scheduler(2)
            .run(&input, &Panicking, &CancellationToken::new())
            .unwrap();

        assert_eq!(pass.produced.len(), 2);
        assert_eq!(
            pass.skipped.get(&TileId::new("boom")),
            Some(&SkipReason::Panicked("draping exploded".to_string()))
        );
    }

    #[test]
    fn test_cancelled_pass_skips_everything() {
        let executor = Deterministic::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let pass = scheduler(2).run(&tiles(&["a", "b", "c"]), &executor, &cancel).unwrap();

        assert_eq!(executor.calls.load(Ordering::SeqCst), 0);
        assert!(pass.produced.is_empty());
        assert!(pass.skipped.values().all(|r| *r == SkipReason::Cancelled));
        assert_eq!(pass.skipped.len(), 3);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = scheduler(0).run(&tiles(&["a"]), &Deterministic::new(), &CancellationToken::new());
        assert!(matches!(result, Err(SchedulerError::NoThreads)));
    }

    #[test]
    fn test_empty_tile_list() {
        let pass = scheduler(4)
            .run(&[], &Deterministic::new(), &CancellationToken::new())
            .unwrap();
        assert!(pass.is_empty());
    }

    #[test]
    fn test_work_dir_removed_after_pass() {
        let temp = TempDir::new().unwrap();
        let work = temp.path().join("work");

        struct Writes(PathBuf);
        impl TileExecutor for Writes {
            fn execute(&self, tile: &TileId, _cancel: &CancellationToken) -> TaskOutcome {
                let path = self.0.join(format!("{}.yml", tile));
                fs::write(&path, "doc").unwrap();
                TaskOutcome::Produced(path)
            }
        }

        let pass = scheduler(2)
            .with_work_dir(&work)
            .run(&tiles(&["a", "b"]), &Writes(work.clone()), &CancellationToken::new())
            .unwrap();

        assert_eq!(pass.produced.len(), 2);
        assert!(!work.exists());
    }
}
