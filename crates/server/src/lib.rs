//! The vitals server: one [`vitals_collector::Collector`] shared by an
//! HTTP router and a gRPC service (both C7), under one
//! [`vitals_core::shutdown::Lifecycle`] (C8).
//!
//! [`run`] wires storage selection (in-memory vs. SQL, per
//! `ServerConfig::database_dsn`), snapshot restore/cadence, and both
//! listeners together — the shape both the binary and the integration
//! tests drive.

pub mod debug;
pub mod grpc;
pub mod http;
pub mod middleware;
pub mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use vitals_collector::Collector;
use vitals_core::config::ServerConfig;
use vitals_core::error::Result;
use vitals_core::shutdown::Lifecycle;
use vitals_core::Store;
use vitals_snapshot::SnapshotFile;
use vitals_store::MemoryStore;

use grpc::{GrpcService, MetricsServer};
use state::AppState;

async fn build_store(config: &ServerConfig) -> Result<Arc<dyn Store>> {
    match &config.database_dsn {
        Some(dsn) => {
            let store = vitals_sql::SqlStore::connect(dsn).await?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

fn load_private_key(config: &ServerConfig) -> Result<Option<rsa::RsaPrivateKey>> {
    let Some(path) = &config.crypto_private_key else {
        return Ok(None);
    };
    let pem = std::fs::read_to_string(path)?;
    Ok(Some(vitals_crypto::rsa_envelope::load_private_key(&pem)?))
}

/// Run the server's full task set (HTTP listener, gRPC listener, periodic
/// snapshot) until `lifecycle` trips. Returns once every task has observed
/// shutdown and drained.
pub async fn run(config: ServerConfig, lifecycle: Lifecycle) -> Result<()> {
    let store = build_store(&config).await?;
    let snapshot = config.store_file.clone().map(SnapshotFile::new);
    let collector = Arc::new(Collector::new(store, snapshot, config.snapshot_cadence, config.restore_saved).await?);
    collector.spawn_periodic_snapshot(lifecycle.child_token());

    let private_key = load_private_key(&config)?.map(Arc::new);
    let state = AppState {
        collector: Arc::clone(&collector),
        hmac_key: config.hmac_key.clone().map(Arc::from),
        private_key,
        trusted_subnet: config.trusted_subnet,
    };

    let http_task = tokio::spawn(serve_http(config.address.clone(), state.clone(), lifecycle.child_token()));
    let grpc_task = tokio::spawn(serve_grpc(config.grpc_address.clone(), state, lifecycle.child_token()));

    let _ = tokio::join!(http_task, grpc_task);
    info!("Сервер остановлен");
    Ok(())
}

async fn serve_http(address: String, state: AppState, shutdown: CancellationToken) {
    let router = http::router(state);
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            warn!(%address, error = %err, "failed to bind HTTP listener");
            return;
        }
    };
    info!(%address, "HTTP listener ready");
    let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown.cancelled().await;
    });
    if let Err(err) = serve.await {
        warn!(error = %err, "HTTP listener exited with error");
    }
}

async fn serve_grpc(address: String, state: AppState, shutdown: CancellationToken) {
    let addr = match address.parse() {
        Ok(addr) => addr,
        Err(err) => {
            warn!(%address, error = %err, "invalid gRPC listen address");
            return;
        }
    };
    let service = GrpcService::new(state);
    info!(%address, "gRPC listener ready");
    let serve = tonic::transport::Server::builder()
        .add_service(MetricsServer::new(service))
        .serve_with_shutdown(addr, async move {
            shutdown.cancelled().await;
        });
    if let Err(err) = serve.await {
        warn!(error = %err, "gRPC listener exited with error");
    }
}
