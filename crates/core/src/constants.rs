//! Process-wide defaults. Initialized once as `const`/`static` values and
//! never mutated — the only globals in the pipeline besides the logger
//! (spec §9 "Process-wide state").

use std::time::Duration;

/// Default agent poll interval (sampling cadence).
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default agent report interval (dispatch cadence).
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);
/// Default server snapshot period when `Period(n)` cadence is configured.
pub const STORE_INTERVAL: Duration = Duration::from_secs(300);
/// Per-request database context timeout.
pub const DB_CONTEXT_TIMEOUT: Duration = Duration::from_secs(5);
/// Per-request HTTP/gRPC context timeout.
pub const HTTP_CONTEXT_TIMEOUT: Duration = Duration::from_secs(10);
/// Host-sampler CPU utilization measurement window.
pub const CPU_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Fixed retry delays shared by the SQL store's connectivity retries and
/// the agent dispatcher's send retries.
pub const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(5),
];

/// Default number of concurrent outgoing worker tasks (dispatcher
/// semaphore size).
pub const RATE_LIMIT: usize = 3;
/// Default number of metrics per mini-batch.
pub const BATCH_ITEM_COUNT: usize = 5;
/// Default bounded-channel capacity between producer and drainer.
pub const CHANNEL_CAP: usize = 5;

/// Default listen address for the HTTP server.
pub const SERVER_DEFAULT_ADDR: &str = "127.0.0.1:8080";
/// Default listen address for the gRPC server.
pub const GRPC_DEFAULT_ADDR: &str = "127.0.0.1:8081";
/// Default agent-side pprof listen address.
pub const AGENT_PPROF_ADDR: &str = "127.0.0.1:8082";
/// Default snapshot file path.
pub const FILE_STORAGE_PATH: &str = "/tmp/vitals-metrics-db.json";
/// Whether the server restores a saved snapshot on startup by default.
pub const RESTORE_SAVED: bool = true;

/// Canonical name of the agent's poll counter.
pub const POLL_COUNT: &str = "PollCount";
/// Canonical name of the agent's uniform-random gauge.
pub const RANDOM_VALUE: &str = "RandomValue";

/// Header carrying the hex-encoded HMAC of the request body.
pub const HASH_HEADER_NAME: &str = "HashSHA256";
/// Header carrying the caller's real IP for the trusted-subnet guard.
pub const REAL_IP_HEADER_NAME: &str = "X-Real-IP";
/// Header marking a body as RSA-OAEP encrypted.
pub const CONTENT_ENCODING_HEADER_NAME: &str = "X-Content-Encoding";
/// Value of [`CONTENT_ENCODING_HEADER_NAME`] for an encrypted body.
pub const CONTENT_ENCODING_CRYPTO: &str = "crypto";

/// The 27 runtime-memory gauge names sampled every poll, plus
/// [`RANDOM_VALUE`] which the sampler adds separately. Static field
/// accessors read this set directly (spec §9 "Reflective gauge
/// collection") — no reflection, no dynamic dispatch per field.
pub const RUNTIME_GAUGE_NAMES: [&str; 27] = [
    "Alloc",
    "BuckHashSys",
    "Frees",
    "GCCPUFraction",
    "GCSys",
    "HeapAlloc",
    "HeapIdle",
    "HeapInuse",
    "HeapObjects",
    "HeapReleased",
    "HeapSys",
    "LastGC",
    "Lookups",
    "MCacheInuse",
    "MCacheSys",
    "MSpanInuse",
    "MSpanSys",
    "Mallocs",
    "NextGC",
    "NumForcedGC",
    "NumGC",
    "OtherSys",
    "PauseTotalNs",
    "StackInuse",
    "StackSys",
    "Sys",
    "TotalAlloc",
];

/// Host-sampler gauge names (memory; per-CPU gauges are synthesized as
/// `"CPUutilization{n}"`).
pub const TOTAL_MEMORY: &str = "TotalMemory";
/// Host-sampler free-memory gauge name.
pub const FREE_MEMORY: &str = "FreeMemory";
/// Prefix for per-logical-CPU utilization gauges (`CPUutilization1`, ...).
pub const CPU_UTILIZATION_PREFIX: &str = "CPUutilization";
