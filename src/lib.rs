//! Composable concurrent stream stages.
//!
//! Values flow through bounded, closable [`Stream`]s. A [`Stage`] turns one
//! stream into another, and operators combine stages:
//!
//! - [`Producer`] generates values, [`Consumer`] transforms them with a pool of workers
//! - [`Scale`] runs several replicas of a stage on a shared input
//! - [`Fork`] copies every value to every branch, blocking on the slowest
//! - [`Mirror`] copies to a primary branch and, best effort, to mirror branches
//! - [`LRFilter`] routes each value to one of two pipelines
//! - [`Pipeline`] chains stages
//!
//! Closing the input stream is the only shutdown signal. It propagates through
//! every stage until the final output closes, and every worker exits.
//!
//! User functions must not panic. A panic ends the worker running it; the
//! other workers carry on and the stage output still closes.
//!
//! # Example
//!
//! ```ignore
//! use stream_stages::{bounded, Consumer, Fork, Pipeline, Stage, StageExt};
//!
//! let pipeline = Pipeline::new(vec![
//!     Consumer::new(4, |v: i64| v + 1).slot(),
//!     Fork::new(vec![
//!         Consumer::new(1, |v: i64| v * 2).slot(),
//!         Consumer::new(1, |v: i64| v * 3).slot(),
//!     ])
//!     .slot(),
//! ])?;
//!
//! let (input, source) = bounded(32);
//! let output = pipeline.run(source);
//! input.send(1).unwrap();
//! input.close();
//! let results: Vec<i64> = output.into_iter().collect();
//! ```

mod branch;
pub mod config;
pub mod consumer;
pub mod error;
pub mod filter;
pub mod fork;
pub mod metrics;
pub mod multiplex;
pub mod pipeline;
pub mod producer;
pub mod scale;
pub mod stage;
pub mod stream;

// Re-exports for convenience
pub use config::{PipelineConfig, ProducerPlacement, DEFAULT_BUFFER_CAPACITY};
pub use consumer::{Consumer, Transform};
pub use error::{PipelineError, Result};
pub use filter::{LRFilter, Predicate};
pub use fork::{Fork, Mirror};
pub use metrics::{LatencyWindow, MetricsSnapshot, StageMetrics};
pub use multiplex::{drain, duplicate, duplicate_best_effort, duplicate_blocking, Delivery, Outlet};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use producer::{Generator, Producer};
pub use scale::Scale;
pub use stage::{stage_fn, Passthrough, Stage, StageExt, StageFn, StageKind, StageRef, StageSlot};
pub use stream::{bounded, OverflowPolicy, Stream, StreamWriter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
