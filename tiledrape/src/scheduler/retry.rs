//! Re-running skipped tiles up to an attempt bound.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Scheduler, SchedulerError};
use crate::config::{SchedulerSettings, DEFAULT_MAX_ATTEMPTS};
use crate::log::Logger;
use crate::task::{SkipReason, TileExecutor};
use crate::tile::TileId;
use crate::{log_info, log_warn};

/// How many scheduler passes a tile set gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        Self::new(settings.max_attempts)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Aggregate of all attempts for one tile set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requested: usize,
    /// Scheduler passes made.
    pub attempts: u32,
    pub produced: BTreeMap<TileId, PathBuf>,
    /// Tiles still skipped after the last attempt, with the last reason.
    pub skipped: BTreeMap<TileId, SkipReason>,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn produced_paths(&self) -> Vec<PathBuf> {
        self.produced.values().cloned().collect()
    }

    pub fn skipped_tiles(&self) -> Vec<TileId> {
        self.skipped.keys().cloned().collect()
    }
}

/// Drives a [`Scheduler`] until no tile is skipped or the policy's
/// attempt bound is reached. Only skipped tiles are re-run.
pub struct RetryController {
    scheduler: Scheduler,
    policy: RetryPolicy,
    logger: Arc<dyn Logger>,
}

impl RetryController {
    pub fn new(scheduler: Scheduler, policy: RetryPolicy, logger: Arc<dyn Logger>) -> Self {
        Self {
            scheduler,
            policy,
            logger,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `tiles` with retries.
    ///
    /// Tiles still skipped after the last attempt are reported in the
    /// summary, not as an error. A cancelled token ends retrying early.
    pub fn run_with_retry(
        &self,
        tiles: &[TileId],
        executor: &dyn TileExecutor,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, SchedulerError> {
        let mut summary = RunSummary {
            requested: tiles.len(),
            ..RunSummary::default()
        };
        let mut pending: Vec<TileId> = tiles.to_vec();

        while summary.attempts < self.policy.max_attempts {
            summary.attempts += 1;
            let pass = self.scheduler.run(&pending, executor, cancel)?;

            info!(
                attempt = summary.attempts,
                tiles = pending.len(),
                produced = pass.produced.len(),
                skipped = pass.skipped.len(),
                "scheduler attempt finished"
            );

            summary.produced.extend(pass.produced);
            pending = pass.skipped.keys().cloned().collect();
            summary.skipped = pass.skipped;

            if pending.is_empty() || cancel.is_cancelled() {
                break;
            }
            if summary.attempts < self.policy.max_attempts {
                log_info!(
                    self.logger,
                    "retrying {} skipped tiles (attempt {} of {})",
                    pending.len(),
                    summary.attempts + 1,
                    self.policy.max_attempts
                );
            }
        }

        self.report(&summary);
        Ok(summary)
    }

    fn report(&self, summary: &RunSummary) {
        log_info!(
            self.logger,
            "{} tiles processed, {} produced, {} skipped after {} attempts",
            summary.requested,
            summary.produced.len(),
            summary.skipped.len(),
            summary.attempts
        );
        if !summary.skipped.is_empty() {
            let ids: Vec<&str> = summary.skipped.keys().map(TileId::as_str).collect();
            log_warn!(self.logger, "permanently skipped tiles: {}", ids.join(", "));
        }
    }
}
