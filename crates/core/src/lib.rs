//! Core types shared across the vitals telemetry pipeline.
//!
//! This crate defines the pieces that both the agent and the server link
//! against so neither side can drift from the other's idea of what a metric
//! is:
//! - [`metric`]: the `Metric` tagged union and id validation
//! - [`batch`]: the duplicate-collapse rule batches must apply before storage
//! - [`store`]: the `Store` trait implemented by the in-memory and SQL backends
//! - [`error`]: the unified error taxonomy
//! - [`config`]: agent/server configuration structs and the merge precedence
//! - [`constants`]: process-wide defaults, initialized once and never mutated
//! - [`shutdown`]: the root cancellation token and lifecycle stage events

#![warn(missing_docs)]

pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod metric;
pub mod shutdown;
pub mod store;

pub use error::{Error, Result};
pub use metric::{Metric, MetricKind};
pub use store::Store;
