//! HTTP/JSON transport: `POST /updates` with the pipeline's headers
//! attached exactly as spec §6 names them.

use async_trait::async_trait;
use reqwest::Client;
use vitals_core::constants::{CONTENT_ENCODING_CRYPTO, CONTENT_ENCODING_HEADER_NAME, HASH_HEADER_NAME, REAL_IP_HEADER_NAME};
use vitals_core::error::{Error, Result};

use super::{MetricsTransport, OutgoingJob};

/// Sends mini-batches to `POST {base_url}/updates`.
pub struct HttpTransport {
    client: Client,
    updates_url: String,
}

impl HttpTransport {
    /// Build a transport targeting `address` (host:port, no scheme).
    pub fn new(address: &str) -> Self {
        HttpTransport {
            client: Client::new(),
            updates_url: format!("http://{address}/updates"),
        }
    }
}

#[async_trait]
impl MetricsTransport for HttpTransport {
    async fn send(&self, job: &OutgoingJob, timeout: std::time::Duration) -> Result<()> {
        let mut request = self
            .client
            .post(&self.updates_url)
            .timeout(timeout)
            .header(REAL_IP_HEADER_NAME, &job.client_ip)
            .header(reqwest::header::CONTENT_TYPE, "application/json");

        if job.gzip {
            request = request.header(reqwest::header::CONTENT_ENCODING, "gzip");
        }
        if job.encrypted {
            request = request.header(CONTENT_ENCODING_HEADER_NAME, CONTENT_ENCODING_CRYPTO);
        }
        if let Some(signature) = &job.signature {
            request = request.header(HASH_HEADER_NAME, signature);
        }

        let response = request
            .body(job.body.clone())
            .send()
            .await
            .map_err(|err| Error::TransientTransport(err.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status().is_client_error() {
            Err(Error::MalformedInput(format!("server rejected batch: {}", response.status())))
        } else {
            Err(Error::TransientTransport(format!("server error: {}", response.status())))
        }
    }
}
