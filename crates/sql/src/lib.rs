//! Relational [`vitals_core::Store`] implementation (spec's C2) over
//! `sqlx`'s `Any` driver, so the same code path serves both the sqlite DSN
//! used in tests and the postgres DSN used in production.
//!
//! Batches are applied inside one transaction per [`SqlStore::set_batch`]
//! call, rolled back on any row's failure, and the whole connect-and-query
//! path retries transient connectivity errors on the fixed delay ladder
//! shared with the agent's dispatcher (`vitals_core::constants::RETRY_DELAYS`).

use std::collections::HashMap;
use std::sync::Once;

use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};
use tracing::warn;
use vitals_core::constants::RETRY_DELAYS;
use vitals_core::error::{Error, Result};
use vitals_core::Store;

static INSTALL_DRIVERS: Once = Once::new();

fn ensure_drivers_installed() {
    INSTALL_DRIVERS.call_once(|| {
        sqlx::any::install_default_drivers();
    });
}

/// A `Store` backed by a relational database reachable over `dsn`.
pub struct SqlStore {
    pool: AnyPool,
}

impl SqlStore {
    /// Connect to `dsn`, create the `gauges`/`counters` tables if absent,
    /// and return a ready-to-use store. Retries transient connection
    /// failures on [`RETRY_DELAYS`].
    pub async fn connect(dsn: &str) -> Result<Self> {
        ensure_drivers_installed();
        // An in-memory sqlite DSN gives each connection its own isolated
        // database, so the pool must be pinned to one connection or writes
        // on one connection would be invisible to reads on another.
        let max_connections = if dsn.contains(":memory:") { 1 } else { 5 };
        let pool = with_retries(|| async {
            AnyPoolOptions::new()
                .max_connections(max_connections)
                .connect(dsn)
                .await
                .map_err(sql_error)
        })
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gauges (
                id TEXT PRIMARY KEY,
                val DOUBLE PRECISION NOT NULL,
                updated_at TIMESTAMP
             )",
        )
        .execute(&pool)
        .await
        .map_err(sql_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS counters (
                id TEXT PRIMARY KEY,
                val BIGINT NOT NULL,
                updated_at TIMESTAMP
             )",
        )
        .execute(&pool)
        .await
        .map_err(sql_error)?;

        Ok(SqlStore { pool })
    }
}

/// Run `attempt` once, then again on each of [`RETRY_DELAYS`] if it
/// returns a retryable [`Error`]. The final attempt's error (retryable or
/// not) is returned as-is.
async fn with_retries<T, F, Fut>(mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delays = RETRY_DELAYS.iter();
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => match delays.next() {
                Some(delay) => {
                    warn!(?delay, error = %err, "transient storage error, retrying");
                    tokio::time::sleep(*delay).await;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

fn sql_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            Error::TransientStorage(err.to_string())
        }
        _ => Error::FatalStorage(err.to_string()),
    }
}

fn row_to_gauge(row: AnyRow) -> Result<(String, f64)> {
    let id: String = row.try_get("id").map_err(sql_error)?;
    let val: f64 = row.try_get("val").map_err(sql_error)?;
    Ok((id, val))
}

fn row_to_counter(row: AnyRow) -> Result<(String, i64)> {
    let id: String = row.try_get("id").map_err(sql_error)?;
    let val: i64 = row.try_get("val").map_err(sql_error)?;
    Ok((id, val))
}

#[async_trait]
impl Store for SqlStore {
    async fn set_gauge(&self, id: &str, value: f64) -> Result<()> {
        with_retries(|| async {
            sqlx::query(
                "INSERT INTO gauges (id, val, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                 ON CONFLICT(id) DO UPDATE SET val = excluded.val, updated_at = excluded.updated_at",
            )
            .bind(id)
            .bind(value)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(sql_error)
        })
        .await
    }

    async fn set_counter(&self, id: &str, delta: i64) -> Result<()> {
        with_retries(|| async {
            sqlx::query(
                "INSERT INTO counters (id, val, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                 ON CONFLICT(id) DO UPDATE SET val = counters.val + excluded.val, updated_at = excluded.updated_at",
            )
            .bind(id)
            .bind(delta)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(sql_error)
        })
        .await
    }

    async fn set_batch(&self, gauges: &HashMap<String, f64>, counters: &HashMap<String, i64>) -> Result<()> {
        with_retries(|| async {
            let mut tx = self.pool.begin().await.map_err(sql_error)?;
            for (id, value) in gauges {
                sqlx::query(
                    "INSERT INTO gauges (id, val, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                     ON CONFLICT(id) DO UPDATE SET val = excluded.val, updated_at = excluded.updated_at",
                )
                .bind(id)
                .bind(*value)
                .execute(&mut *tx)
                .await
                .map_err(sql_error)?;
            }
            for (id, delta) in counters {
                sqlx::query(
                    "INSERT INTO counters (id, val, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
                     ON CONFLICT(id) DO UPDATE SET val = counters.val + excluded.val, updated_at = excluded.updated_at",
                )
                .bind(id)
                .bind(*delta)
                .execute(&mut *tx)
                .await
                .map_err(sql_error)?;
            }
            tx.commit().await.map_err(sql_error)?;
            Ok(())
        })
        .await
    }

    async fn get_gauge(&self, id: &str) -> Result<f64> {
        let row = sqlx::query("SELECT id, val FROM gauges WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_error)?;
        match row {
            Some(row) => Ok(row_to_gauge(row)?.1),
            None => Err(Error::UnknownMetric { id: id.to_string() }),
        }
    }

    async fn get_counter(&self, id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT id, val FROM counters WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_error)?;
        match row {
            Some(row) => Ok(row_to_counter(row)?.1),
            None => Err(Error::UnknownMetric { id: id.to_string() }),
        }
    }

    async fn get_all(&self) -> Result<(HashMap<String, f64>, HashMap<String, i64>)> {
        let mut tx = self.pool.begin().await.map_err(sql_error)?;
        let gauge_rows = sqlx::query("SELECT id, val FROM gauges")
            .fetch_all(&mut *tx)
            .await
            .map_err(sql_error)?;
        let counter_rows = sqlx::query("SELECT id, val FROM counters")
            .fetch_all(&mut *tx)
            .await
            .map_err(sql_error)?;
        tx.commit().await.map_err(sql_error)?;

        let gauges = gauge_rows
            .into_iter()
            .map(row_to_gauge)
            .collect::<Result<HashMap<_, _>>>()?;
        let counters = counter_rows
            .into_iter()
            .map(row_to_counter)
            .collect::<Result<HashMap<_, _>>>()?;
        Ok((gauges, counters))
    }

    async fn dump(&self) -> Result<String> {
        let (gauges, counters) = self.get_all().await?;
        let snapshot = serde_json::json!({ "gauges": gauges, "counters": counters });
        serde_json::to_string(&snapshot).map_err(Error::from)
    }

    async fn restore(&self, json: &str) -> Result<()> {
        if json.trim().is_empty() {
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
        self.set_batch(&gauges, &counters).await
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqlStore {
        SqlStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn gauge_roundtrips_and_overwrites() {
        let store = memory_store().await;
        store.set_gauge("Alloc", 1.0).await.unwrap();
        store.set_gauge("Alloc", 2.5).await.unwrap();
        assert_eq!(store.get_gauge("Alloc").await.unwrap(), 2.5);
    }

    #[tokio::test]
    async fn counter_accumulates() {
        let store = memory_store().await;
        store.set_counter("PollCount", 3).await.unwrap();
        store.set_counter("PollCount", 4).await.unwrap();
        assert_eq!(store.get_counter("PollCount").await.unwrap(), 7);
    }

    #[tokio::test]
    async fn set_batch_is_transactional() {
        let store = memory_store().await;
        let mut gauges = HashMap::new();
        gauges.insert("g".to_string(), 9.0);
        let mut counters = HashMap::new();
        counters.insert("c".to_string(), 5);
        store.set_batch(&gauges, &counters).await.unwrap();
        assert_eq!(store.get_gauge("g").await.unwrap(), 9.0);
        assert_eq!(store.get_counter("c").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn unknown_metric_errors() {
        let store = memory_store().await;
        assert!(store.get_gauge("missing").await.is_err());
    }

    #[tokio::test]
    async fn dump_and_restore_roundtrip() {
        let store = memory_store().await;
        store.set_gauge("g", 3.25).await.unwrap();
        store.set_counter("c", 11).await.unwrap();
        let dumped = store.dump().await.unwrap();

        let restored = memory_store().await;
        restored.restore(&dumped).await.unwrap();
        assert_eq!(restored.get_gauge("g").await.unwrap(), 3.25);
        assert_eq!(restored.get_counter("c").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn ping_succeeds_against_live_pool() {
        let store = memory_store().await;
        assert!(store.ping().await);
    }
}
