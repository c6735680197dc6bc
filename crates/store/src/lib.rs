//! In-memory [`vitals_core::Store`] implementation: two `HashMap`s behind
//! one `parking_lot::Mutex`.
//!
//! This is the default backend (spec's C1) and the one the agent's
//! integration tests run against — no external database required. Every
//! operation takes the same lock, so [`Store::set_batch`] is trivially
//! atomic: the whole batch is applied while the lock is held.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use vitals_core::error::{Error, Result};
use vitals_core::Store;

#[derive(Debug, Default)]
struct State {
    gauges: HashMap<String, f64>,
    counters: HashMap<String, i64>,
}

/// A `Store` backed entirely by process memory. Cheap to construct, cheap
/// to clone via `Arc`, and gone the moment the process exits — pair it
/// with `vitals-snapshot` for durability across restarts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn set_gauge(&self, id: &str, value: f64) -> Result<()> {
        self.state.lock().gauges.insert(id.to_string(), value);
        Ok(())
    }

    async fn set_counter(&self, id: &str, delta: i64) -> Result<()> {
        let mut state = self.state.lock();
        *state.counters.entry(id.to_string()).or_insert(0) += delta;
        Ok(())
    }

    async fn set_batch(&self, gauges: &HashMap<String, f64>, counters: &HashMap<String, i64>) -> Result<()> {
        let mut state = self.state.lock();
        for (id, value) in gauges {
            state.gauges.insert(id.clone(), *value);
        }
        for (id, delta) in counters {
            *state.counters.entry(id.clone()).or_insert(0) += delta;
        }
        Ok(())
    }

    async fn get_gauge(&self, id: &str) -> Result<f64> {
        self.state
            .lock()
            .gauges
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownMetric { id: id.to_string() })
    }

    async fn get_counter(&self, id: &str) -> Result<i64> {
        self.state
            .lock()
            .counters
            .get(id)
            .copied()
            .ok_or_else(|| Error::UnknownMetric { id: id.to_string() })
    }

    async fn get_all(&self) -> Result<(HashMap<String, f64>, HashMap<String, i64>)> {
        let state = self.state.lock();
        Ok((state.gauges.clone(), state.counters.clone()))
    }

    async fn dump(&self) -> Result<String> {
        let state = self.state.lock();
        let snapshot = serde_json::json!({
            "gauges": state.gauges,
            "counters": state.counters,
        });
        serde_json::to_string(&snapshot).map_err(Error::from)
    }

    async fn restore(&self, json: &str) -> Result<()> {
        if json.trim().is_empty() {
            *self.state.lock() = State::default();
            return Ok(());
        }
        let snapshot: serde_json::Value = serde_json::from_str(json)?;
        let gauges: HashMap<String, f64> = snapshot
            .get("gauges")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        let counters: HashMap<String, i64> = snapshot
            .get("counters")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();
        *self.state.lock() = State { gauges, counters };
        Ok(())
    }

    async fn ping(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn gauge_is_last_writer_wins() {
        let store = MemoryStore::new();
        store.set_gauge("Alloc", 1.0).await.unwrap();
        store.set_gauge("Alloc", 2.0).await.unwrap();
        assert_eq!(store.get_gauge("Alloc").await.unwrap(), 2.0);
    }

    #[tokio::test]
    async fn counter_is_additive() {
        let store = MemoryStore::new();
        store.set_counter("PollCount", 3).await.unwrap();
        store.set_counter("PollCount", 4).await.unwrap();
        assert_eq!(store.get_counter("PollCount").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn unknown_metric_errors() {
        let store = MemoryStore::new();
        assert!(store.get_gauge("missing").await.is_err());
        assert!(store.get_counter("missing").await.is_err());
    }

    #[tokio::test]
    async fn set_batch_applies_all_entries_together() {
        let store = MemoryStore::new();
        let mut gauges = HashMap::new();
        gauges.insert("g".to_string(), 1.5);
        let mut counters = HashMap::new();
        counters.insert("c".to_string(), 10);
        store.set_batch(&gauges, &counters).await.unwrap();
        assert_eq!(store.get_gauge("g").await.unwrap(), 1.5);
        assert_eq!(store.get_counter("c").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn dump_and_restore_roundtrip() {
        let store = MemoryStore::new();
        store.set_gauge("g", 9.5).await.unwrap();
        store.set_counter("c", 42).await.unwrap();
        let dumped = store.dump().await.unwrap();

        let restored = MemoryStore::new();
        restored.restore(&dumped).await.unwrap();
        assert_eq!(restored.get_gauge("g").await.unwrap(), 9.5);
        assert_eq!(restored.get_counter("c").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn restore_from_empty_string_clears_state() {
        let store = MemoryStore::new();
        store.set_gauge("g", 1.0).await.unwrap();
        store.restore("").await.unwrap();
        assert!(store.get_gauge("g").await.is_err());
    }

    #[tokio::test]
    async fn ping_is_always_true() {
        let store = MemoryStore::new();
        assert!(store.ping().await);
    }
}
