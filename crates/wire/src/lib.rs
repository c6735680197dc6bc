//! Wire shapes shared by the agent and server (ambient to spec.md — the
//! spec treats the RPC stub generator as an external collaborator, but
//! the generated types themselves are load-bearing: both binaries convert
//! to/from `vitals_core::Metric` at this boundary instead of re-declaring
//! it).
//!
//! - [`json`]: the HTTP/JSON wire shapes
//! - [`grpc`]: the generated `Metrics` service and its `Metric` message

pub mod grpc;
pub mod json;
