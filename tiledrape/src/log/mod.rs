//! Logging seam for components that run on worker threads.
//!
//! The scheduler, task executor and border planner receive an
//! `Arc<dyn Logger>` instead of calling `tracing` directly, so tests can
//! silence or capture their output.
//!
//! - [`Logger`]: the interface, with `log_*!` macros for format strings
//! - [`TracingLogger`]: forwards to the `tracing` subscriber installed by
//!   [`crate::logging::init_logging`]
//! - [`NoOpLogger`]: discards everything
//! - [`CaptureLogger`]: keeps messages in memory for assertions
//!
//! ```
//! use std::sync::Arc;
//! use tiledrape::log::{Logger, NoOpLogger};
//! use tiledrape::log_info;
//!
//! let logger: Arc<dyn Logger> = Arc::new(NoOpLogger);
//! log_info!(logger, "processing {} tiles", 12);
//! ```

mod capture;
mod noop;
mod tracing_adapter;
mod r#trait;

pub use capture::{CaptureLogger, CapturedLine};
pub use noop::NoOpLogger;
pub use r#trait::{LogLevel, Logger};
pub use tracing_adapter::TracingLogger;
