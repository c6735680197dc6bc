//! Agent dispatcher (spec's C6): producer fragments a `GetAll` snapshot
//! into mini-batches and enqueues them on a bounded channel; a drainer
//! consumes the channel in FIFO order and spawns one transient worker per
//! job, gated by a semaphore sized `RateLimit`. Workers share no state and
//! apply the send pipeline (encrypt -> gzip -> hmac -> `X-Real-IP`) before
//! handing the job to the transport, retrying transient transport errors
//! on the fixed {1s, 2s, 5s} ladder.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vitals_core::constants::{POLL_COUNT, RETRY_DELAYS};
use vitals_core::error::{Error, Result};
use vitals_core::metric::Metric;
use vitals_core::Store;

use crate::transport::{MetricsTransport, OutgoingJob};

/// Everything the dispatcher needs to turn a `GetAll` snapshot into signed,
/// possibly-encrypted, possibly-compressed on-wire jobs.
pub struct DispatcherConfig {
    /// Number of metrics per mini-batch.
    pub batch_item_count: usize,
    /// Bounded channel capacity between producer and drainer.
    pub channel_cap: usize,
    /// Number of concurrent outgoing worker tasks.
    pub rate_limit: usize,
    /// Per-job send timeout.
    pub http_context_timeout: Duration,
    /// Shared HMAC key; `None` disables signing.
    pub hmac_key: Option<String>,
    /// Server RSA public key; `None` disables envelope encryption.
    pub public_key: Option<rsa::RsaPublicKey>,
    /// Always gzip-compress the body (the reference agent always does).
    pub gzip: bool,
    /// Address attached as `X-Real-IP`.
    pub client_ip: String,
}

/// Drives one `ReportInterval` dispatch cycle against `store`, through
/// `transport`, governed by `config`.
pub struct Dispatcher {
    store: Arc<dyn Store>,
    transport: Arc<dyn MetricsTransport>,
    config: Arc<DispatcherConfig>,
}

impl Dispatcher {
    /// Build a dispatcher over `store`, sending through `transport`.
    pub fn new(store: Arc<dyn Store>, transport: Arc<dyn MetricsTransport>, config: DispatcherConfig) -> Self {
        Dispatcher {
            store,
            transport,
            config: Arc::new(config),
        }
    }

    /// One dispatch cycle: snapshot the store, append `PollCount`,
    /// fragment into mini-batches, and enqueue each on `tx`. Blocks on a
    /// full channel — that block *is* the backpressure path.
    async fn produce_cycle(&self, tx: &mpsc::Sender<Vec<u8>>) -> Result<()> {
        let (gauges, counters) = self.store.get_all().await?;
        let mut metrics: Vec<Metric> = Vec::with_capacity(gauges.len() + counters.len() + 1);
        metrics.extend(gauges.into_iter().map(|(id, value)| Metric {
            id,
            kind: vitals_core::metric::MetricKind::Gauge { value },
        }));
        metrics.extend(counters.into_iter().map(|(id, delta)| Metric {
            id,
            kind: vitals_core::metric::MetricKind::Counter { delta },
        }));
        let poll_count = self.store.get_counter(POLL_COUNT).await.unwrap_or(0);
        metrics.push(Metric {
            id: POLL_COUNT.to_string(),
            kind: vitals_core::metric::MetricKind::Counter { delta: poll_count },
        });

        for chunk in metrics.chunks(self.config.batch_item_count.max(1)) {
            let body = serde_json::to_vec(chunk).map_err(Error::from)?;
            if tx.send(body).await.is_err() {
                // Drainer has shut down; nothing left to enqueue this cycle.
                break;
            }
        }
        Ok(())
    }

    /// Apply the send pipeline (encrypt -> gzip -> hmac) and build the
    /// [`OutgoingJob`] the transport sends.
    fn prepare_job(&self, raw_body: Vec<u8>) -> Result<OutgoingJob> {
        let metrics_json = raw_body.clone();
        let mut body = raw_body;

        let mut encrypted = false;
        if let Some(public_key) = &self.config.public_key {
            body = vitals_crypto::rsa_envelope::encrypt(public_key, &body)?;
            encrypted = true;
        }

        let mut gzip = false;
        if self.config.gzip {
            body = vitals_crypto::gzip::compress(&body)?;
            gzip = true;
        }

        let signature = self.config.hmac_key.as_ref().map(|key| vitals_crypto::hmac_sign::sign(key, &body));

        Ok(OutgoingJob {
            body,
            metrics_json,
            signature,
            gzip,
            encrypted,
            client_ip: self.config.client_ip.clone(),
        })
    }

    /// Send one mini-batch, retrying transient transport errors on the
    /// fixed {1s, 2s, 5s} ladder. The final attempt's error (retryable or
    /// not) is surfaced.
    async fn send_with_retry(&self, raw_body: Vec<u8>) -> Result<()> {
        let job = self.prepare_job(raw_body)?;
        let mut delays = RETRY_DELAYS.iter();
        loop {
            match self.transport.send(&job, self.config.http_context_timeout).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() => match delays.next() {
                    Some(delay) => {
                        warn!(?delay, error = %err, "transient transport error, retrying");
                        tokio::time::sleep(*delay).await;
                    }
                    None => return Err(err),
                },
                Err(err) => return Err(err),
            }
        }
    }

    /// Run the full producer/drainer/worker-pool pipeline on
    /// `report_interval`, returning once `shutdown` has cancelled and the
    /// queue has fully drained.
    pub async fn run(self: Arc<Self>, report_interval: Duration, shutdown: CancellationToken) {
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(self.config.channel_cap);
        let semaphore = Arc::new(Semaphore::new(self.config.rate_limit));

        let producer = {
            let dispatcher = Arc::clone(&self);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(report_interval);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Err(err) = dispatcher.produce_cycle(&tx).await {
                                warn!(error = %err, "failed to produce dispatch cycle");
                            }
                        }
                        _ = shutdown.cancelled() => {
                            info!("Подготовка пакетов на отправку завершена...");
                            break;
                        }
                    }
                }
                // Dropping tx closes the channel; the drainer finishes
                // in-flight jobs and then observes the close.
            })
        };

        let mut workers = JoinSet::new();
        while let Some(body) = rx.recv().await {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break, // semaphore closed
            };
            let dispatcher = Arc::clone(&self);
            workers.spawn(async move {
                let _permit = permit;
                if let Err(err) = dispatcher.send_with_retry(body).await {
                    warn!(error = %err, "mini-batch send failed after retries");
                }
            });
        }

        // Drain outstanding workers before closing the semaphore, per §9
        // ("RateLimitChan close-after-drain, not before") to avoid a
        // send-on-closed-channel style panic.
        while workers.join_next().await.is_some() {}
        semaphore.close();

        let _ = producer.await;
        info!("Отправка метрик завершена...");
        debug!("dispatcher fully drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::OutgoingJob;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vitals_store::MemoryStore;

    struct CountingTransport {
        sends: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MetricsTransport for CountingTransport {
        async fn send(&self, _job: &OutgoingJob, _timeout: Duration) -> Result<()> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config() -> DispatcherConfig {
        DispatcherConfig {
            batch_item_count: 5,
            channel_cap: 5,
            rate_limit: 3,
            http_context_timeout: Duration::from_secs(10),
            hmac_key: None,
            public_key: None,
            gzip: false,
            client_ip: "127.0.0.1".to_string(),
        }
    }

    #[tokio::test]
    async fn dispatch_cycle_sends_all_mini_batches() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..12 {
            store.set_gauge(&format!("g{i}"), i as f64).await.unwrap();
        }
        let sends = Arc::new(AtomicUsize::new(0));
        let transport = Arc::new(CountingTransport { sends: Arc::clone(&sends) });
        let dispatcher = Arc::new(Dispatcher::new(store, transport, test_config()));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn({
            let dispatcher = Arc::clone(&dispatcher);
            let shutdown = shutdown.clone();
            async move { dispatcher.run(Duration::from_millis(10), shutdown).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert!(sends.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn prepare_job_signs_the_final_on_wire_body() {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(CountingTransport { sends: Arc::new(AtomicUsize::new(0)) });
        let mut config = test_config();
        config.hmac_key = Some("testkey".to_string());
        config.gzip = true;
        let dispatcher = Dispatcher::new(store, transport, config);

        let body = br#"[{"id":"g","type":"gauge","value":1.0}]"#.to_vec();
        let job = dispatcher.prepare_job(body.clone()).unwrap();
        assert!(job.gzip);
        let signature = job.signature.clone().unwrap();
        vitals_crypto::hmac_sign::verify("testkey", &job.body, &signature).unwrap();
        assert_ne!(job.body, body, "on-wire body should be gzip-compressed");
        assert_eq!(job.metrics_json, body, "metrics_json must stay the pre-pipeline plain JSON");
    }
}
