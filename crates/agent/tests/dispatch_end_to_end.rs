//! Drives the real dispatcher (producer + drainer + worker pool) against a
//! minimal HTTP sink over an actual `TcpListener`, instead of a mock
//! `MetricsTransport` — this is the level at which the send pipeline's
//! header wiring (gzip/HMAC/`X-Real-IP`) actually gets exercised end to
//! end, since a mock transport never sees an `OutgoingJob`'s bytes land on
//! a real socket.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use vitals_agent::dispatch::{Dispatcher, DispatcherConfig};
use vitals_agent::transport::http::HttpTransport;
use vitals_core::Store;
use vitals_store::MemoryStore;

#[derive(Clone, Default)]
struct Sink {
    received: Arc<Mutex<Vec<(HeaderMap, Vec<u8>)>>>,
}

async fn collect(State(sink): State<Sink>, headers: HeaderMap, body: axum::body::Bytes) -> &'static str {
    sink.received.lock().unwrap().push((headers, body.to_vec()));
    "ok"
}

async fn spawn_sink() -> (SocketAddr, Sink) {
    let sink = Sink::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route("/updates", post(collect)).with_state(sink.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    (addr, sink)
}

#[tokio::test]
async fn dispatcher_delivers_signed_gzipped_batches_to_a_real_listener() {
    let (addr, sink) = spawn_sink().await;

    let store = Arc::new(MemoryStore::new());
    for i in 0..7 {
        store.set_gauge(&format!("g{i}"), i as f64).await.unwrap();
    }
    store.set_counter("PollCount", 3).await.unwrap();

    let transport = Arc::new(HttpTransport::new(&addr.to_string()));
    let config = DispatcherConfig {
        batch_item_count: 5,
        channel_cap: 5,
        rate_limit: 3,
        http_context_timeout: Duration::from_secs(10),
        hmac_key: Some("testkey".to_string()),
        public_key: None,
        gzip: true,
        client_ip: "10.1.2.3".to_string(),
    };
    let dispatcher = Arc::new(Dispatcher::new(store, transport, config));

    let shutdown = CancellationToken::new();
    let handle = {
        let dispatcher = Arc::clone(&dispatcher);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { dispatcher.run(Duration::from_millis(10), shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    shutdown.cancel();
    handle.await.unwrap();

    let received = sink.received.lock().unwrap();
    assert!(!received.is_empty(), "dispatcher never reached the sink");

    let (headers, body) = &received[0];
    assert_eq!(headers.get("x-real-ip").unwrap(), "10.1.2.3");
    assert_eq!(headers.get("content-encoding").unwrap(), "gzip");
    let signature = headers.get(vitals_core::constants::HASH_HEADER_NAME).unwrap().to_str().unwrap();

    vitals_crypto::hmac_sign::verify("testkey", body, signature).unwrap();
    let decompressed = vitals_crypto::gzip::decompress(body).unwrap();
    let metrics: Vec<vitals_core::metric::Metric> = serde_json::from_slice(&decompressed).unwrap();
    assert!(metrics.len() <= 5, "mini-batches should be fragmented to BatchItemCount");
}
