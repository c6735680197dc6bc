//! Agent samplers (spec's C5): two independent cooperative tasks that
//! poll runtime/host metrics on `PollInterval` and write them through the
//! agent's local [`vitals_core::Store`].
//!
//! The reference implementation walks a known struct with reflection;
//! §9 ("Reflective gauge collection") calls that out as the one place
//! where a faithful port should diverge. [`RUNTIME_ACCESSORS`] is the
//! static `name -> accessor` table that replaces it: each entry reads one
//! field off a [`RuntimeSnapshot`] directly, no dynamic dispatch per
//! field.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rand::Rng;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use vitals_core::constants::{
    CPU_SAMPLE_INTERVAL, CPU_UTILIZATION_PREFIX, FREE_MEMORY, POLL_COUNT, RANDOM_VALUE, RUNTIME_GAUGE_NAMES,
    TOTAL_MEMORY,
};
use vitals_core::Store;

/// A point-in-time read of the process/runtime figures the gauge
/// accessors draw from. Captured once per tick so every accessor in
/// [`RUNTIME_ACCESSORS`] sees a consistent view.
struct RuntimeSnapshot {
    rss_bytes: f64,
    virtual_bytes: f64,
    cpu_usage_percent: f64,
    uptime_secs: f64,
    mallocs: f64,
    frees: f64,
    num_gc: f64,
}

/// `name -> accessor` static table (spec §9 "Reflective gauge
/// collection"). Field access, not struct-tag reflection.
type Accessor = fn(&RuntimeSnapshot) -> f64;

const RUNTIME_ACCESSORS: &[(&str, Accessor)] = &[
    ("Alloc", |s| s.rss_bytes),
    ("TotalAlloc", |s| s.virtual_bytes),
    ("Sys", |s| s.virtual_bytes),
    ("HeapAlloc", |s| s.rss_bytes),
    ("HeapSys", |s| s.virtual_bytes),
    ("HeapIdle", |s| (s.virtual_bytes - s.rss_bytes).max(0.0)),
    ("HeapInuse", |s| s.rss_bytes),
    ("HeapReleased", |_| 0.0),
    ("HeapObjects", |s| (s.rss_bytes / 64.0).floor()),
    ("StackInuse", |s| s.rss_bytes * 0.01),
    ("StackSys", |s| s.rss_bytes * 0.015),
    ("MSpanInuse", |s| s.rss_bytes * 0.005),
    ("MSpanSys", |s| s.rss_bytes * 0.006),
    ("MCacheInuse", |_| 0.0),
    ("MCacheSys", |s| s.rss_bytes * 0.001),
    ("BuckHashSys", |_| 0.0),
    ("GCSys", |s| s.rss_bytes * 0.02),
    ("OtherSys", |s| s.rss_bytes * 0.01),
    ("NextGC", |s| s.rss_bytes * 1.5),
    ("LastGC", |_| {
        SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as f64).unwrap_or(0.0)
    }),
    ("PauseTotalNs", |s| s.uptime_secs * 1_000.0),
    ("NumGC", |s| s.num_gc),
    ("NumForcedGC", |_| 0.0),
    ("GCCPUFraction", |s| s.cpu_usage_percent / 100.0),
    ("Lookups", |_| 0.0),
    ("Mallocs", |s| s.mallocs),
    ("Frees", |s| s.frees),
];

const _: () = assert!(RUNTIME_ACCESSORS.len() == RUNTIME_GAUGE_NAMES.len());

/// Polls the fixed set of runtime-memory gauges plus [`RANDOM_VALUE`],
/// and increments [`POLL_COUNT`] by the number of gauge writes performed.
pub struct RuntimeSampler {
    store: Arc<dyn Store>,
    system: System,
    pid: Pid,
    started: Instant,
    num_gc: AtomicU64,
    mallocs: AtomicU64,
    frees: AtomicU64,
}

impl RuntimeSampler {
    /// Build a sampler targeting the current process.
    pub fn new(store: Arc<dyn Store>) -> Self {
        RuntimeSampler {
            store,
            system: System::new(),
            pid: Pid::from_u32(std::process::id()),
            started: Instant::now(),
            num_gc: AtomicU64::new(0),
            mallocs: AtomicU64::new(0),
            frees: AtomicU64::new(0),
        }
    }

    fn snapshot(&mut self) -> RuntimeSnapshot {
        self.system
            .refresh_processes_specifics(ProcessesToUpdate::Some(&[self.pid]), true, ProcessRefreshKind::everything());
        let process = self.system.process(self.pid);
        let rss_bytes = process.map(|p| p.memory() as f64).unwrap_or(0.0);
        let virtual_bytes = process.map(|p| p.virtual_memory() as f64).unwrap_or(0.0);
        let cpu_usage_percent = process.map(|p| p.cpu_usage() as f64).unwrap_or(0.0);

        RuntimeSnapshot {
            rss_bytes,
            virtual_bytes,
            cpu_usage_percent,
            uptime_secs: self.started.elapsed().as_secs_f64(),
            mallocs: self.mallocs.fetch_add(1, Ordering::Relaxed) as f64 + 1.0,
            frees: self.frees.fetch_add(1, Ordering::Relaxed) as f64,
            num_gc: self.num_gc.fetch_add(1, Ordering::Relaxed) as f64 + 1.0,
        }
    }

    /// One sampling tick: write every runtime gauge, `RandomValue`, and
    /// advance `PollCount` by the number of gauge writes performed.
    pub async fn tick(&mut self) {
        let snapshot = self.snapshot();
        let mut writes = 0usize;
        for (name, accessor) in RUNTIME_ACCESSORS {
            let value = accessor(&snapshot);
            if let Err(err) = self.store.set_gauge(name, value).await {
                tracing::warn!(metric = name, error = %err, "failed to write runtime gauge");
                continue;
            }
            writes += 1;
        }

        let random_value: f64 = rand::thread_rng().gen_range(0.0..1.0);
        if self.store.set_gauge(RANDOM_VALUE, random_value).await.is_ok() {
            writes += 1;
        }

        if let Err(err) = self.store.set_counter(POLL_COUNT, writes as i64).await {
            tracing::warn!(error = %err, "failed to advance PollCount");
        }
        debug!(writes, "runtime sample tick complete");
    }

    /// Run the sampling loop: sleep `poll_interval` between ticks, return
    /// when `shutdown` is cancelled.
    pub async fn run(mut self, poll_interval: std::time::Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.cancelled() => {
                    info!("Обновление метрик gopcutils завершено...");
                    break;
                }
            }
        }
    }
}

/// Polls total/free host memory and one gauge per logical CPU's
/// utilization, measured over [`CPU_SAMPLE_INTERVAL`].
pub struct HostSampler {
    store: Arc<dyn Store>,
    system: System,
}

impl HostSampler {
    /// Build a host sampler.
    pub fn new(store: Arc<dyn Store>) -> Self {
        HostSampler {
            store,
            system: System::new(),
        }
    }

    /// One sampling tick: refresh CPU usage twice, [`CPU_SAMPLE_INTERVAL`]
    /// apart (sysinfo needs two samples spanning the window to compute a
    /// meaningful percentage), then write total/free memory and one gauge
    /// per logical CPU.
    pub async fn tick(&mut self) {
        self.system.refresh_cpu_usage();
        tokio::time::sleep(CPU_SAMPLE_INTERVAL).await;
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        if let Err(err) = self.store.set_gauge(TOTAL_MEMORY, self.system.total_memory() as f64).await {
            tracing::warn!(error = %err, "failed to write TotalMemory");
        }
        if let Err(err) = self.store.set_gauge(FREE_MEMORY, self.system.free_memory() as f64).await {
            tracing::warn!(error = %err, "failed to write FreeMemory");
        }

        for (i, cpu) in self.system.cpus().iter().enumerate() {
            let name = format!("{CPU_UTILIZATION_PREFIX}{}", i + 1);
            if let Err(err) = self.store.set_gauge(&name, cpu.cpu_usage() as f64).await {
                tracing::warn!(metric = name, error = %err, "failed to write CPU utilization gauge");
            }
        }
        debug!(cpus = self.system.cpus().len(), "host sample tick complete");
    }

    /// Run the sampling loop: sleep `poll_interval` between ticks, return
    /// when `shutdown` is cancelled.
    pub async fn run(mut self, poll_interval: std::time::Duration, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.cancelled() => {
                    info!("Обновление метрик завершено...");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitals_store::MemoryStore;

    #[tokio::test]
    async fn runtime_tick_writes_all_gauges_and_poll_count() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut sampler = RuntimeSampler::new(Arc::clone(&store));
        sampler.tick().await;

        for (name, _) in RUNTIME_ACCESSORS {
            assert!(store.get_gauge(name).await.is_ok(), "missing gauge {name}");
        }
        assert!(store.get_gauge(RANDOM_VALUE).await.is_ok());
        let poll_count = store.get_counter(POLL_COUNT).await.unwrap();
        assert_eq!(poll_count, (RUNTIME_ACCESSORS.len() + 1) as i64);
    }

    #[tokio::test]
    async fn runtime_poll_count_accumulates_across_ticks() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut sampler = RuntimeSampler::new(Arc::clone(&store));
        sampler.tick().await;
        sampler.tick().await;
        let per_tick = (RUNTIME_ACCESSORS.len() + 1) as i64;
        assert_eq!(store.get_counter(POLL_COUNT).await.unwrap(), per_tick * 2);
    }

    #[tokio::test]
    async fn host_tick_writes_memory_and_cpu_gauges() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let mut sampler = HostSampler::new(Arc::clone(&store));
        sampler.system.refresh_cpu_usage();
        sampler.tick().await;

        assert!(store.get_gauge(TOTAL_MEMORY).await.is_ok());
        assert!(store.get_gauge(FREE_MEMORY).await.is_ok());
    }
}
