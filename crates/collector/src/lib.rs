//! The `Collector` (spec's C4): the one thing both the HTTP and gRPC
//! ingress paths, and the agent's direct-write tests, actually hold a
//! reference to. It wraps a `Store`, applies the duplicate-fold rule to
//! every batch before it reaches the store, drives the snapshot cadence,
//! and restores from a snapshot file at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vitals_core::batch::fold_duplicates;
use vitals_core::config::SnapshotCadence;
use vitals_core::error::Result;
use vitals_core::metric::Metric;
use vitals_core::Store;
use vitals_snapshot::SnapshotFile;

/// Wraps a `Store`, adding the duplicate-fold boundary, snapshot cadence,
/// and startup restore that the spec places above the raw storage
/// contract.
pub struct Collector {
    store: Arc<dyn Store>,
    snapshot: Option<SnapshotFile>,
    cadence: SnapshotCadence,
}

impl Collector {
    /// Build a collector over `store`. If `snapshot` is `Some` and
    /// `restore` is true, the store is populated from the snapshot file's
    /// current contents before this call returns.
    pub async fn new(
        store: Arc<dyn Store>,
        snapshot: Option<SnapshotFile>,
        cadence: SnapshotCadence,
        restore: bool,
    ) -> Result<Self> {
        if let (true, Some(snapshot)) = (restore, snapshot.as_ref()) {
            let json = snapshot.read()?;
            if !json.trim().is_empty() {
                store.restore(&json).await?;
                info!(path = %snapshot.path().display(), "restored metrics from snapshot");
            }
        }
        Ok(Collector {
            store,
            snapshot,
            cadence,
        })
    }

    /// Set a single gauge, then snapshot if the cadence is [`SnapshotCadence::Sync`].
    pub async fn set_gauge(&self, id: &str, value: f64) -> Result<()> {
        self.store.set_gauge(id, value).await?;
        self.maybe_sync_snapshot().await;
        Ok(())
    }

    /// Add to a single counter, then snapshot if the cadence is [`SnapshotCadence::Sync`].
    pub async fn set_counter(&self, id: &str, delta: i64) -> Result<()> {
        self.store.set_counter(id, delta).await?;
        self.maybe_sync_snapshot().await;
        Ok(())
    }

    /// Fold a raw batch of metrics (deduplicating per the spec's rule) and
    /// apply it atomically, then snapshot if the cadence is
    /// [`SnapshotCadence::Sync`].
    pub async fn set_batch(&self, metrics: &[Metric]) -> Result<()> {
        let folded = fold_duplicates(metrics);
        self.store.set_batch(&folded.gauges, &folded.counters).await?;
        self.maybe_sync_snapshot().await;
        Ok(())
    }

    /// Current value of a gauge.
    pub async fn get_gauge(&self, id: &str) -> Result<f64> {
        self.store.get_gauge(id).await
    }

    /// Current value of a counter.
    pub async fn get_counter(&self, id: &str) -> Result<i64> {
        self.store.get_counter(id).await
    }

    /// All gauges and counters currently stored.
    pub async fn get_all(&self) -> Result<(HashMap<String, f64>, HashMap<String, i64>)> {
        self.store.get_all().await
    }

    /// Liveness check forwarded to the underlying store.
    pub async fn ping(&self) -> bool {
        self.store.ping().await
    }

    async fn maybe_sync_snapshot(&self) {
        if self.cadence != SnapshotCadence::Sync {
            return;
        }
        if let Err(err) = self.snapshot_now().await {
            error!(error = %err, "sync snapshot write failed");
        }
    }

    async fn snapshot_now(&self) -> Result<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };
        let json = self.store.dump().await?;
        snapshot.write(&json)?;
        debug!(path = %snapshot.path().display(), "wrote snapshot");
        Ok(())
    }

    /// Spawn the periodic snapshot task if the cadence is
    /// [`SnapshotCadence::Period`]. The task exits when `shutdown` is
    /// cancelled, writing one final snapshot before it does.
    pub fn spawn_periodic_snapshot(self: &Arc<Self>, shutdown: CancellationToken) {
        let SnapshotCadence::Period(period) = self.cadence else {
            return;
        };
        let collector = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(err) = collector.snapshot_now().await {
                            error!(error = %err, "periodic snapshot write failed");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        if let Err(err) = collector.snapshot_now().await {
                            error!(error = %err, "final snapshot write failed");
                        }
                        break;
                    }
                }
            }
        });
    }
}
