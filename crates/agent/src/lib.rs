//! The vitals agent: runtime/host samplers (C5) writing through a local
//! `Store`, and a dispatcher (C6) that reports the accumulated state to a
//! server on `ReportInterval`.
//!
//! [`run`] wires the two samplers and the dispatcher together under one
//! [`vitals_core::shutdown::Lifecycle`] — the shape both binaries and the
//! integration tests drive.

pub mod debug;
pub mod dispatch;
pub mod sampler;
pub mod transport;

use std::sync::Arc;

use tracing::info;
use vitals_core::config::{AgentConfig, ServerApi};
use vitals_core::error::Result;
use vitals_core::shutdown::Lifecycle;
use vitals_core::Store;
use vitals_store::MemoryStore;

use dispatch::{Dispatcher, DispatcherConfig};
use sampler::{HostSampler, RuntimeSampler};
use transport::grpc::GrpcTransport;
use transport::http::HttpTransport;
use transport::MetricsTransport;

/// Build the transport the dispatcher sends through, per
/// `config.server_api`.
fn build_transport(config: &AgentConfig) -> Arc<dyn MetricsTransport> {
    match config.server_api {
        ServerApi::Http => Arc::new(HttpTransport::new(&config.address)),
        ServerApi::Grpc => Arc::new(GrpcTransport::new(&config.grpc_address)),
    }
}

fn load_public_key(config: &AgentConfig) -> Result<Option<rsa::RsaPublicKey>> {
    let Some(path) = &config.crypto_public_key else {
        return Ok(None);
    };
    let pem = std::fs::read_to_string(path)?;
    Ok(Some(vitals_crypto::rsa_envelope::load_public_key(&pem)?))
}

/// Run the agent's full task set (two samplers, one dispatcher) until
/// `lifecycle` trips. Returns once every task has observed shutdown and
/// drained.
pub async fn run(config: AgentConfig, lifecycle: Lifecycle) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let transport = build_transport(&config);
    let public_key = load_public_key(&config)?;

    let dispatcher_config = DispatcherConfig {
        batch_item_count: config.batch_item_count,
        channel_cap: config.channel_cap,
        rate_limit: config.rate_limit,
        http_context_timeout: config.http_context_timeout,
        hmac_key: config.hmac_key.clone(),
        public_key,
        gzip: true,
        client_ip: local_ip_guess(),
    };
    let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&store), transport, dispatcher_config));

    debug::spawn(config.pprof_address.clone(), lifecycle.child_token());

    let runtime_sampler = RuntimeSampler::new(Arc::clone(&store));
    let host_sampler = HostSampler::new(Arc::clone(&store));

    let runtime_task = tokio::spawn(runtime_sampler.run(config.poll_interval, lifecycle.child_token()));
    let host_task = tokio::spawn(host_sampler.run(config.poll_interval, lifecycle.child_token()));
    let dispatch_task = tokio::spawn(dispatcher.run(config.report_interval, lifecycle.child_token()));

    let _ = tokio::join!(runtime_task, host_task, dispatch_task);
    info!("Программа завершена!");
    Ok(())
}

fn local_ip_guess() -> String {
    "127.0.0.1".to_string()
}
