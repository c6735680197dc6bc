//! State shared by the HTTP router and the gRPC service: one `Collector`
//! plus the middleware chain's configuration (HMAC key, RSA private key,
//! trusted subnet).

use std::sync::Arc;

use ipnet::IpNet;
use rsa::RsaPrivateKey;
use vitals_collector::Collector;

/// Everything a request handler needs, cloned cheaply per request.
#[derive(Clone)]
pub struct AppState {
    /// The one store both transports write through.
    pub collector: Arc<Collector>,
    /// Shared HMAC key; `None` disables signature verification.
    pub hmac_key: Option<Arc<str>>,
    /// Server's RSA private key; `None` disables envelope decryption.
    pub private_key: Option<Arc<RsaPrivateKey>>,
    /// CIDR allow-list for the trusted-subnet guard; `None` disables it.
    pub trusted_subnet: Option<IpNet>,
}
