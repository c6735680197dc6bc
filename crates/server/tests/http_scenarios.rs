//! End-to-end HTTP scenarios (spec §8), driven over a real `TcpListener`
//! rather than an in-process `oneshot` call — this is the level at which
//! the trusted-subnet guard actually matters, since that check reads a
//! header a real client sets, not one a test harness fabricates.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use vitals_collector::Collector;
use vitals_core::config::SnapshotCadence;
use vitals_server::state::AppState;
use vitals_store::MemoryStore;

async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = vitals_server::http::router(state);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    // Give the listener a moment to start accepting before the first request.
    tokio::time::sleep(Duration::from_millis(20)).await;
    addr
}

async fn plain_state() -> AppState {
    let collector = Collector::new(Arc::new(MemoryStore::new()), None, SnapshotCadence::Off, false)
        .await
        .unwrap();
    AppState {
        collector: Arc::new(collector),
        hmac_key: None,
        private_key: None,
        trusted_subnet: None,
    }
}

#[tokio::test]
async fn scenario_1_single_gauge_round_trip() {
    let addr = spawn_server(plain_state().await).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/update/gauge/Alloc/123.456"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let response = client.get(format!("http://{addr}/value/gauge/Alloc")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "123.456");
}

#[tokio::test]
async fn scenario_2_counter_addition() {
    let addr = spawn_server(plain_state().await).await;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let response = client
            .post(format!("http://{addr}/update/counter/PollCount/10"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let response = client.get(format!("http://{addr}/value/counter/PollCount")).send().await.unwrap();
    assert_eq!(response.text().await.unwrap(), "20");
}

#[tokio::test]
async fn scenario_3_batch_with_duplicate_counters() {
    let addr = spawn_server(plain_state().await).await;
    let client = reqwest::Client::new();

    let payload = serde_json::json!([
        {"id": "c", "type": "counter", "delta": 35_154_714},
        {"id": "g", "type": "gauge", "value": 18032.25},
        {"id": "c", "type": "counter", "delta": 1_872_525_169},
        {"id": "g", "type": "gauge", "value": 37453.22},
    ]);
    let response = client.post(format!("http://{addr}/updates")).json(&payload).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let gauge = client.get(format!("http://{addr}/value/gauge/g")).send().await.unwrap().text().await.unwrap();
    assert_eq!(gauge, "37453.22");
    let counter = client.get(format!("http://{addr}/value/counter/c")).send().await.unwrap().text().await.unwrap();
    assert_eq!(counter, "1907679883");
}

#[tokio::test]
async fn scenario_7_subnet_guard_allows_and_rejects_by_cidr() {
    let collector = Collector::new(Arc::new(MemoryStore::new()), None, SnapshotCadence::Off, false)
        .await
        .unwrap();
    let state = AppState {
        collector: Arc::new(collector),
        hmac_key: None,
        private_key: None,
        trusted_subnet: Some("127.0.0.0/24".parse().unwrap()),
    };
    let addr = spawn_server(state).await;
    let client = reqwest::Client::new();

    let allowed = client
        .post(format!("http://{addr}/update/gauge/Alloc/1.0"))
        .header("X-Real-IP", "127.0.0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(allowed.status(), 200);

    let denied = client
        .post(format!("http://{addr}/update/gauge/Alloc/1.0"))
        .header("X-Real-IP", "127.0.1.1")
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 403);
}

#[tokio::test]
async fn ping_reflects_store_liveness() {
    let addr = spawn_server(plain_state().await).await;
    let client = reqwest::Client::new();
    let response = client.get(format!("http://{addr}/ping")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}
