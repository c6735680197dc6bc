//! Transport abstraction the dispatcher sends through (spec §9 "Transport
//! selection"): one trait, two implementations, chosen by
//! `AgentConfig::server_api` at startup so the dispatcher itself stays
//! oblivious to which wire format is underneath.

pub mod grpc;
pub mod http;

use async_trait::async_trait;
use vitals_core::error::Result;

/// A ready-to-send mini-batch plus the pipeline metadata the transport
/// needs to attach (spec §4.4's send pipeline, steps 3-4).
pub struct OutgoingJob {
    /// Final on-wire body: after encryption and gzip have already been
    /// applied by the dispatcher. This is what the HTTP transport sends
    /// close to verbatim.
    pub body: Vec<u8>,
    /// The mini-batch's JSON metric array *before* envelope
    /// encryption/gzip were applied. The gRPC transport deserializes
    /// this back into typed messages rather than the compressed/encrypted
    /// `body` (see DESIGN.md's "job bytes vs. typed gRPC" decision) —
    /// gzip/encryption are HTTP-only, so this is always plain JSON.
    pub metrics_json: Vec<u8>,
    /// Hex-encoded HMAC of `body`, if a key is configured.
    pub signature: Option<String>,
    /// Whether `body` is gzip-compressed.
    pub gzip: bool,
    /// Whether `body` is RSA-OAEP encrypted.
    pub encrypted: bool,
    /// Caller's IP, attached as `X-Real-IP`.
    pub client_ip: String,
}

/// One outgoing mini-batch send, independent of wire format.
#[async_trait]
pub trait MetricsTransport: Send + Sync {
    /// Deliver `job` to the server, honoring `timeout` for the whole
    /// attempt (connect + send + response).
    async fn send(&self, job: &OutgoingJob, timeout: std::time::Duration) -> Result<()>;
}
