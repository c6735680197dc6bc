//! Agent/server configuration: CLI flags, environment variables, a JSON
//! config file, and the merge precedence that combines them
//! (`environment > flag > JSON file > constant`).
//!
//! This is ambient stack, not a deferred feature: a complete binary needs
//! *some* way to get `ReportInterval`/`DatabaseDsn`/etc. into a running
//! `AgentConfig`/`ServerConfig`, even though the spec treats the precise
//! flag-parsing mechanics as an external collaborator. We use `clap` for
//! flags (mirroring the reference implementation's `flag` package) and
//! plain `std::env::var` for environment variables, kept deliberately
//! separate from clap's own `env` attribute so the two can be merged with
//! the spec's (unusual) "env beats flag" precedence instead of clap's
//! default "flag beats env".

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{Error, Result};

/// Server-side snapshot cadence (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotCadence {
    /// Snapshot after every successful write.
    Sync,
    /// Snapshot on a background timer every `Duration`.
    Period(Duration),
    /// Snapshotting disabled (no file path configured).
    Off,
}

/// JSON config file schema (spec §6). Every field is optional; a field
/// absent from the file simply does not participate in that layer of the
/// merge.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileConfig {
    /// HTTP listen address (`address`).
    pub address: Option<String>,
    /// gRPC listen address (`grpc_address`).
    pub grpc_address: Option<String>,
    /// Agent report interval, duration string (`"10s"`).
    #[serde(default, with = "humantime_serde::option")]
    pub report_interval: Option<Duration>,
    /// Agent poll interval, duration string.
    #[serde(default, with = "humantime_serde::option")]
    pub poll_interval: Option<Duration>,
    /// RSA key material: agent's public key path / server's certificate
    /// path, depending on which binary reads the file.
    pub crypto_key: Option<String>,
    /// Server's RSA certificate path (paired with `crypto_key` as the
    /// private key when both are present).
    pub crypto_cert: Option<String>,
    /// Server snapshot period, duration string (`"0s"` means sync).
    #[serde(default, with = "humantime_serde::option")]
    pub store_interval: Option<Duration>,
    /// Snapshot file path.
    pub store_file: Option<String>,
    /// Whether to restore the snapshot file on startup.
    pub restore: Option<bool>,
    /// Relational store DSN.
    pub database_dsn: Option<String>,
    /// CIDR allow-list for the trusted-subnet guard.
    pub trusted_subnet: Option<String>,
    /// Which API the agent should speak: `"http"` or `"grpc"`.
    pub server_api: Option<String>,
}

impl FileConfig {
    /// Load a [`FileConfig`] from a JSON file. A missing path is not an
    /// error at this layer — callers treat "no `--config` given" as an
    /// empty [`FileConfig`].
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(Error::from)
    }
}

/// Resolve one field across the four layers, in the spec's precedence
/// order: `environment > flag > JSON file > constant`.
fn resolve<T>(env: Option<T>, flag: Option<T>, file: Option<T>, default: T) -> T {
    env.or(flag).or(file).unwrap_or(default)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_duration(name: &str) -> Option<Duration> {
    env_var(name).and_then(|v| humantime::parse_duration(&v).ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env_var(name).and_then(|v| v.parse().ok())
}

/// CLI flags accepted by the agent binary.
#[derive(Debug, Parser, Default)]
#[command(name = "vitals-agent", about = "Samples runtime/host metrics and reports them to a vitals server")]
pub struct AgentCliArgs {
    /// Server address and port (HTTP transport).
    #[arg(short = 'a', long)]
    pub address: Option<String>,
    /// Server gRPC address (gRPC transport).
    #[arg(long)]
    pub grpc_address: Option<String>,
    /// Report interval, duration string (e.g. "10s").
    #[arg(short = 'r', long, value_parser = humantime::parse_duration)]
    pub report_interval: Option<Duration>,
    /// Poll interval, duration string.
    #[arg(short = 'p', long, value_parser = humantime::parse_duration)]
    pub poll_interval: Option<Duration>,
    /// Shared HMAC key; empty disables signing.
    #[arg(short = 'k', long)]
    pub key: Option<String>,
    /// Number of concurrent outgoing worker tasks.
    #[arg(short = 'l', long)]
    pub rate_limit: Option<usize>,
    /// Path to the server's RSA public key (PEM/cert) for envelope
    /// encryption.
    #[arg(long)]
    pub crypto_public_key: Option<PathBuf>,
    /// Which transport to speak: "http" or "grpc".
    #[arg(long)]
    pub server_api: Option<String>,
    /// Dedicated pprof-style debug listen address.
    #[arg(long)]
    pub pprof_address: Option<String>,
    /// Path to a JSON config file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

/// CLI flags accepted by the server binary.
#[derive(Debug, Parser, Default)]
#[command(name = "vitals-server", about = "Aggregates and exposes metrics reported by vitals agents")]
pub struct ServerCliArgs {
    /// HTTP listen address.
    #[arg(short = 'a', long)]
    pub address: Option<String>,
    /// gRPC listen address.
    #[arg(long)]
    pub grpc_address: Option<String>,
    /// Snapshot period in seconds; 0 means synchronous, negative means off.
    #[arg(short = 'i', long)]
    pub store_interval: Option<i64>,
    /// Snapshot file path; empty disables file snapshots.
    #[arg(short = 'f', long)]
    pub store_file: Option<String>,
    /// Restore the snapshot file at startup.
    #[arg(short = 'r', long)]
    pub restore: Option<bool>,
    /// Relational store DSN; when set, the SQL backend is used instead of
    /// the in-memory one.
    #[arg(short = 'd', long)]
    pub database_dsn: Option<String>,
    /// Shared HMAC key; empty disables verification.
    #[arg(short = 'k', long)]
    pub key: Option<String>,
    /// Path to the server's RSA certificate (public half).
    #[arg(long)]
    pub crypto_cert: Option<PathBuf>,
    /// Path to the server's RSA private key.
    #[arg(long)]
    pub crypto_private_key: Option<PathBuf>,
    /// CIDR allow-list, e.g. "127.0.0.0/24".
    #[arg(long)]
    pub trusted_subnet: Option<String>,
    /// Path to a JSON config file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

/// Fully resolved agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// HTTP server address.
    pub address: String,
    /// gRPC server address.
    pub grpc_address: String,
    /// Which transport to use.
    pub server_api: ServerApi,
    /// Sampling cadence.
    pub poll_interval: Duration,
    /// Dispatch cadence.
    pub report_interval: Duration,
    /// Shared HMAC key; `None` disables signing.
    pub hmac_key: Option<String>,
    /// Server RSA public key path; `None` disables envelope encryption.
    pub crypto_public_key: Option<PathBuf>,
    /// Dispatcher worker-pool size.
    pub rate_limit: usize,
    /// Mini-batch fragmentation size.
    pub batch_item_count: usize,
    /// Bounded channel capacity between producer and drainer.
    pub channel_cap: usize,
    /// Per-job send timeout.
    pub http_context_timeout: Duration,
    /// Dedicated pprof-style debug listen address.
    pub pprof_address: String,
}

/// Which transport the agent dispatches over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerApi {
    /// HTTP/JSON transport.
    Http,
    /// gRPC transport.
    Grpc,
}

impl ServerApi {
    fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "grpc" => ServerApi::Grpc,
            _ => ServerApi::Http,
        }
    }
}

impl AgentConfig {
    /// Resolve an [`AgentConfig`] from parsed CLI flags, the process
    /// environment, and (if `--config` was given) a JSON file, applying
    /// the spec's `environment > flag > JSON file > constant` precedence
    /// field by field.
    pub fn resolve(flags: AgentCliArgs) -> Result<Self> {
        let config_path = env_var("CONFIG").map(PathBuf::from).or(flags.config.clone());
        let file = match &config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let server_api = resolve(
            env_var("SERVER_API"),
            flags.server_api.clone(),
            file.server_api.clone(),
            "http".to_string(),
        );

        Ok(AgentConfig {
            address: resolve(
                env_var("ADDRESS"),
                flags.address,
                file.address,
                constants::SERVER_DEFAULT_ADDR.to_string(),
            ),
            grpc_address: resolve(
                env_var("GRPC_ADDRESS"),
                flags.grpc_address,
                file.grpc_address,
                constants::GRPC_DEFAULT_ADDR.to_string(),
            ),
            server_api: ServerApi::parse(&server_api),
            poll_interval: resolve(
                env_duration("POLL_INTERVAL"),
                flags.poll_interval,
                file.poll_interval,
                constants::POLL_INTERVAL,
            ),
            report_interval: resolve(
                env_duration("REPORT_INTERVAL"),
                flags.report_interval,
                file.report_interval,
                constants::REPORT_INTERVAL,
            ),
            hmac_key: {
                let key = resolve(env_var("KEY"), flags.key, file.crypto_key.clone(), String::new());
                (!key.is_empty()).then_some(key)
            },
            crypto_public_key: flags.crypto_public_key,
            rate_limit: resolve(
                env_var("RATE_LIMIT").and_then(|v| v.parse().ok()),
                flags.rate_limit,
                None,
                constants::RATE_LIMIT,
            ),
            batch_item_count: constants::BATCH_ITEM_COUNT,
            channel_cap: constants::CHANNEL_CAP,
            http_context_timeout: constants::HTTP_CONTEXT_TIMEOUT,
            pprof_address: flags.pprof_address.unwrap_or_else(|| constants::AGENT_PPROF_ADDR.to_string()),
        })
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen address.
    pub address: String,
    /// gRPC listen address.
    pub grpc_address: String,
    /// Snapshot cadence.
    pub snapshot_cadence: SnapshotCadence,
    /// Snapshot file path; `None` disables file snapshots entirely.
    pub store_file: Option<PathBuf>,
    /// Restore the snapshot on startup.
    pub restore_saved: bool,
    /// Relational store DSN; when present, the SQL backend is used.
    pub database_dsn: Option<String>,
    /// Shared HMAC key; `None` disables verification.
    pub hmac_key: Option<String>,
    /// Server RSA certificate path.
    pub crypto_cert: Option<PathBuf>,
    /// Server RSA private key path.
    pub crypto_private_key: Option<PathBuf>,
    /// CIDR allow-list for the trusted-subnet guard.
    pub trusted_subnet: Option<ipnet::IpNet>,
    /// Per-request DB context timeout.
    pub db_context_timeout: Duration,
    /// Per-request HTTP/gRPC context timeout.
    pub http_context_timeout: Duration,
}

impl ServerConfig {
    /// Resolve a [`ServerConfig`] the same way [`AgentConfig::resolve`]
    /// does.
    pub fn resolve(flags: ServerCliArgs) -> Result<Self> {
        let config_path = env_var("CONFIG").map(PathBuf::from).or(flags.config.clone());
        let file = match &config_path {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let store_interval_secs = resolve(
            env_var("STORE_INTERVAL").and_then(|v| v.parse::<i64>().ok()),
            flags.store_interval,
            file.store_interval.map(|d| d.as_secs() as i64),
            constants::STORE_INTERVAL.as_secs() as i64,
        );
        let store_file = resolve(
            env_var("FILE_STORAGE_PATH"),
            flags.store_file,
            file.store_file.clone(),
            constants::FILE_STORAGE_PATH.to_string(),
        );
        let snapshot_cadence = if store_file.is_empty() {
            SnapshotCadence::Off
        } else if store_interval_secs == 0 {
            SnapshotCadence::Sync
        } else if store_interval_secs < 0 {
            SnapshotCadence::Off
        } else {
            SnapshotCadence::Period(Duration::from_secs(store_interval_secs as u64))
        };

        let hmac_key = resolve(env_var("KEY"), flags.key, file.crypto_key.clone(), String::new());
        let trusted_subnet = resolve(
            env_var("TRUSTED_SUBNET"),
            flags.trusted_subnet,
            file.trusted_subnet.clone(),
            String::new(),
        );

        Ok(ServerConfig {
            address: resolve(
                env_var("ADDRESS"),
                flags.address,
                file.address,
                constants::SERVER_DEFAULT_ADDR.to_string(),
            ),
            grpc_address: resolve(
                env_var("GRPC_ADDRESS"),
                flags.grpc_address,
                file.grpc_address,
                constants::GRPC_DEFAULT_ADDR.to_string(),
            ),
            snapshot_cadence,
            store_file: (!store_file.is_empty()).then(|| PathBuf::from(store_file)),
            restore_saved: resolve(
                env_bool("RESTORE"),
                flags.restore,
                file.restore,
                constants::RESTORE_SAVED,
            ),
            database_dsn: {
                let dsn = resolve(
                    env_var("DATABASE_DSN"),
                    flags.database_dsn,
                    file.database_dsn.clone(),
                    String::new(),
                );
                (!dsn.is_empty()).then_some(dsn)
            },
            hmac_key: (!hmac_key.is_empty()).then_some(hmac_key),
            crypto_cert: flags.crypto_cert.or_else(|| file.crypto_cert.clone().map(PathBuf::from)),
            crypto_private_key: flags.crypto_private_key,
            trusted_subnet: (!trusted_subnet.is_empty())
                .then(|| trusted_subnet.parse().ok())
                .flatten(),
            db_context_timeout: constants::DB_CONTEXT_TIMEOUT,
            http_context_timeout: constants::HTTP_CONTEXT_TIMEOUT,
        })
    }
}
