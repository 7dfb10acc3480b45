//! tiledrape - tile-parallel building heights from elevation point clouds
//!
//! Building footprints are draped with point clouds tile by tile by an
//! external tool. This library schedules those per-tile jobs, retries the
//! ones that fail, plans the double processing of tiles on the border
//! between two elevation coverages and merges all results into one table
//! with one row per building.
//!
//! # High-Level API
//!
//! [`pipeline::Pipeline`] runs everything against an
//! [`store::ElevationIndex`], a [`store::HeightStore`] and a
//! [`drape::DrapeTool`]:
//!
//! ```ignore
//! use std::sync::Arc;
//! use tiledrape::pipeline::Pipeline;
//! use tiledrape::log::TracingLogger;
//!
//! let store = Arc::new(PostgisStore::connect(&config.database, layout, handle)?);
//! let pipeline = Pipeline::new(config, store.clone(), store, tool, Arc::new(TracingLogger));
//! let report = pipeline.run(&cancel)?;
//! ```

pub mod border;
pub mod config;
pub mod drape;
pub mod import;
pub mod log;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod pointcloud;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod tile;

/// Version of the tiledrape library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
