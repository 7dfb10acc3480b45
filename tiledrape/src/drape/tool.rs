//! Running the external draping tool.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ToolError;
use crate::log::{Logger, TracingLogger};
use crate::log_warn;

/// How one tool invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    /// Non-zero exit, or `None` when killed by a signal.
    Failed { code: Option<i32> },
    TimedOut,
    Cancelled,
}

/// Drapes one tile: reads `document`, writes `output`.
///
/// Implementations block until the tool has finished and are called from
/// several worker threads at once.
pub trait DrapeTool: Send + Sync {
    fn run(
        &self,
        document: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<ToolStatus, ToolError>;
}

/// Spawns the tool as `<executable> <document> <arguments...> <output>`.
///
/// Stdout is discarded. Stderr goes to `<output>.log`. The process is killed
/// after `timeout` or when the token is cancelled.
#[derive(Clone)]
pub struct ProcessDrapeTool {
    executable: PathBuf,
    arguments: Vec<String>,
    timeout: Duration,
    poll_interval: Duration,
    logger: Arc<dyn Logger>,
}

impl ProcessDrapeTool {
    pub fn new(executable: impl Into<PathBuf>, arguments: Vec<String>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            arguments,
            timeout,
            poll_interval: Duration::from_millis(100),
            logger: Arc::new(TracingLogger),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn stderr_log(output: &Path) -> PathBuf {
        let mut name = output.as_os_str().to_os_string();
        name.push(".log");
        PathBuf::from(name)
    }
}

impl DrapeTool for ProcessDrapeTool {
    fn run(
        &self,
        document: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<ToolStatus, ToolError> {
        let log_path = Self::stderr_log(output);
        let log = File::create(&log_path).map_err(|source| ToolError::Io {
            path: log_path.clone(),
            source,
        })?;

        debug!(
            executable = %self.executable.display(),
            document = %document.display(),
            output = %output.display(),
            "spawning draping tool"
        );

        let mut child = Command::new(&self.executable)
            .arg(document)
            .args(&self.arguments)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log))
            .spawn()
            .map_err(|source| ToolError::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait().map_err(ToolError::Wait)? {
                return Ok(status_of(status));
            }
            let stop = if cancel.is_cancelled() {
                Some(ToolStatus::Cancelled)
            } else if started.elapsed() >= self.timeout {
                Some(ToolStatus::TimedOut)
            } else {
                None
            };
            if let Some(outcome) = stop {
                log_warn!(
                    self.logger,
                    "killing draping tool (pid {}) for {}: {:?}",
                    child.id(),
                    output.display(),
                    outcome
                );
                terminate(&mut child, self.logger.as_ref());
                return Ok(outcome);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

/// Kill `child` and reap it. Failures are logged; the exit status is
/// returned when the process was reaped.
fn terminate(child: &mut Child, logger: &dyn Logger) -> Option<ExitStatus> {
    if let Err(e) = child.kill() {
        log_warn!(logger, "failed to kill draping tool (pid {}): {}", child.id(), e);
    }
    match child.wait() {
        Ok(status) => Some(status),
        Err(e) => {
            log_warn!(logger, "failed to reap draping tool (pid {}): {}", child.id(), e);
            None
        }
    }
}

fn status_of(status: ExitStatus) -> ToolStatus {
    if status.success() {
        ToolStatus::Success
    } else {
        ToolStatus::Failed {
            code: status.code(),
        }
    }
}
