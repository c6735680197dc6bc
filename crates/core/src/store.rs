//! The `Store` abstraction implemented by both the in-memory backend
//! (`vitals-store`) and the SQL backend (`vitals-sql`).
//!
//! Every method is async: the in-memory implementation never actually
//! awaits anything (its mutex is held for the duration of the call), but
//! giving both backends one trait lets the [`Collector`](../vitals_collector)
//! and the server ingress layer stay oblivious to which one is behind it.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// Unified storage contract for gauges and counters.
///
/// # Invariants
/// - Gauge writes are last-writer-wins.
/// - Counter writes are additive: absent keys start at zero.
/// - [`Store::get_all`] returns two maps that together form one consistent
///   snapshot — no torn reads mid-batch.
/// - [`Store::set_batch`] is atomic: either every metric in the batch
///   becomes visible, or none do.
#[async_trait]
pub trait Store: Send + Sync {
    /// Replace the gauge's absolute value.
    async fn set_gauge(&self, id: &str, value: f64) -> Result<()>;

    /// Add `delta` to the counter's absolute value (starting from zero if
    /// the id is not yet present).
    async fn set_counter(&self, id: &str, delta: i64) -> Result<()>;

    /// Apply a batch of metrics (already duplicate-folded by the caller)
    /// atomically: on any failure, none of the batch's ids change value.
    async fn set_batch(&self, gauges: &HashMap<String, f64>, counters: &HashMap<String, i64>) -> Result<()>;

    /// Current absolute value of a gauge.
    async fn get_gauge(&self, id: &str) -> Result<f64>;

    /// Current absolute value of a counter.
    async fn get_counter(&self, id: &str) -> Result<i64>;

    /// Snapshot both maps. Consistent with respect to concurrent writers:
    /// never observes a batch half-applied.
    async fn get_all(&self) -> Result<(HashMap<String, f64>, HashMap<String, i64>)>;

    /// Serialize the full store state as `{"gauges":{...},"counters":{...}}`.
    async fn dump(&self) -> Result<String>;

    /// Replace the full store state from a previously dumped snapshot.
    async fn restore(&self, json: &str) -> Result<()>;

    /// Liveness check. Never errors; returns `false` on any failure to
    /// reach the backing storage.
    async fn ping(&self) -> bool;
}
