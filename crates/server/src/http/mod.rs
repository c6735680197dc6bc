//! HTTP ingress (spec §4.5/§6): the plain-text and JSON routes, wired
//! through the shared middleware chain onto one `Collector`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Deserialize;
use vitals_collector::Collector;
use vitals_core::error::Error;
use vitals_core::metric::{Metric, MetricKind};
use vitals_wire::json::MetricBatch;

use crate::state::AppState;

const GAUGE: &str = "gauge";
const COUNTER: &str = "counter";

/// Build the HTTP router, with the shared middleware chain applied to
/// every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/update/:kind/:name/:value", post(update_plain))
        .route("/update", post(update_json))
        .route("/updates", post(update_batch))
        .route("/value/:kind/:name", get(get_plain).post(get_plain))
        .route("/value", post(get_json))
        .route("/", get(list_text))
        .route("/ping", get(ping))
        .merge(crate::debug::route())
        .layer(middleware::from_fn_with_state(state.clone(), crate::middleware::pipeline))
        .with_state(state)
}

fn error_status(err: &Error) -> StatusCode {
    match err {
        Error::MalformedInput(_) => StatusCode::BAD_REQUEST,
        Error::UnknownMetric { .. } => StatusCode::NOT_FOUND,
        Error::IntegrityViolation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn apply(collector: &Collector, metric: &Metric) -> vitals_core::error::Result<()> {
    match metric.kind {
        MetricKind::Gauge { value } => collector.set_gauge(&metric.id, value).await,
        MetricKind::Counter { delta } => collector.set_counter(&metric.id, delta).await,
    }
}

async fn update_plain(State(state): State<AppState>, Path((kind, name, value)): Path<(String, String, String)>) -> Response {
    let metric = match kind.as_str() {
        GAUGE => value.parse::<f64>().ok().and_then(|v| Metric::gauge(&name, v).ok()),
        COUNTER => value.parse::<i64>().ok().and_then(|v| Metric::counter(&name, v).ok()),
        _ => None,
    };
    let Some(metric) = metric else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match apply(&state.collector, &metric).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_status(&err).into_response(),
    }
}

async fn update_json(State(state): State<AppState>, Json(metric): Json<Metric>) -> Response {
    if let Err(err) = apply(&state.collector, &metric).await {
        return error_status(&err).into_response();
    }
    let echoed = match metric.kind {
        MetricKind::Gauge { .. } => state.collector.get_gauge(&metric.id).await.and_then(|v| Metric::gauge(&metric.id, v)),
        MetricKind::Counter { .. } => state
            .collector
            .get_counter(&metric.id)
            .await
            .and_then(|v| Metric::counter(&metric.id, v)),
    };
    match echoed {
        Ok(metric) => Json(metric).into_response(),
        Err(err) => error_status(&err).into_response(),
    }
}

async fn update_batch(State(state): State<AppState>, Json(metrics): Json<MetricBatch>) -> Response {
    match state.collector.set_batch(&metrics).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_status(&err).into_response(),
    }
}

async fn get_plain(State(state): State<AppState>, Path((kind, name)): Path<(String, String)>) -> Response {
    let result = match kind.as_str() {
        GAUGE => state.collector.get_gauge(&name).await.map(|v| v.to_string()),
        COUNTER => state.collector.get_counter(&name).await.map(|v| v.to_string()),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };
    match result {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(err) => error_status(&err).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ValueQuery {
    id: String,
    #[serde(rename = "type")]
    kind: String,
}

async fn get_json(State(state): State<AppState>, Json(query): Json<ValueQuery>) -> Response {
    let metric = match query.kind.as_str() {
        GAUGE => state.collector.get_gauge(&query.id).await.and_then(|v| Metric::gauge(&query.id, v)),
        COUNTER => state
            .collector
            .get_counter(&query.id)
            .await
            .and_then(|v| Metric::counter(&query.id, v)),
        _ => return StatusCode::BAD_REQUEST.into_response(),
    };
    match metric {
        Ok(metric) => Json(metric).into_response(),
        Err(err) => error_status(&err).into_response(),
    }
}

async fn list_text(State(state): State<AppState>) -> Response {
    match state.collector.get_all().await {
        Ok((gauges, counters)) => {
            let mut lines: Vec<String> = gauges.iter().map(|(k, v)| format!("{k}: {v}")).collect();
            lines.extend(counters.iter().map(|(k, v)| format!("{k}: {v}")));
            lines.sort();
            (StatusCode::OK, lines.join("\n")).into_response()
        }
        Err(err) => error_status(&err).into_response(),
    }
}

async fn ping(State(state): State<AppState>) -> Response {
    if state.collector.ping().await {
        StatusCode::OK.into_response()
    } else {
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use vitals_core::config::SnapshotCadence;
    use vitals_store::MemoryStore;

    use super::*;

    async fn test_state() -> AppState {
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
    async fn plain_gauge_update_then_read_round_trips() {
        let state = test_state().await;
        let app = router(state);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update/gauge/Alloc/37453.22")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/value/gauge/Alloc").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"37453.22");
    }

    #[tokio::test]
    async fn counter_update_twice_accumulates() {
        let state = test_state().await;
        let app = router(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/update/counter/PollCount/10")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(Request::builder().uri("/value/counter/PollCount").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"20");
    }

    #[tokio::test]
    async fn batch_with_duplicate_counters_folds_before_storage() {
        let state = test_state().await;
        let app = router(state);

        let payload = serde_json::json!([
            {"id": "c", "type": "counter", "delta": 35_154_714},
            {"id": "g", "type": "gauge", "value": 18032.25},
            {"id": "c", "type": "counter", "delta": 1_872_525_169},
            {"id": "g", "type": "gauge", "value": 37453.22},
        ]);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/updates")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ping_on_broken_store_returns_internal_error() {
        struct BrokenStore;

        #[async_trait::async_trait]
        impl vitals_core::Store for BrokenStore {
            async fn set_gauge(&self, _id: &str, _value: f64) -> vitals_core::error::Result<()> {
                unimplemented!()
            }
            async fn set_counter(&self, _id: &str, _delta: i64) -> vitals_core::error::Result<()> {
                unimplemented!()
            }
            async fn set_batch(
                &self,
                _gauges: &std::collections::HashMap<String, f64>,
                _counters: &std::collections::HashMap<String, i64>,
            ) -> vitals_core::error::Result<()> {
                unimplemented!()
            }
            async fn get_gauge(&self, _id: &str) -> vitals_core::error::Result<f64> {
                unimplemented!()
            }
            async fn get_counter(&self, _id: &str) -> vitals_core::error::Result<i64> {
                unimplemented!()
            }
            async fn get_all(&self) -> vitals_core::error::Result<(std::collections::HashMap<String, f64>, std::collections::HashMap<String, i64>)> {
                unimplemented!()
            }
            async fn dump(&self) -> vitals_core::error::Result<String> {
                unimplemented!()
            }
            async fn restore(&self, _json: &str) -> vitals_core::error::Result<()> {
                unimplemented!()
            }
            async fn ping(&self) -> bool {
                false
            }
        }

        let collector = Collector::new(Arc::new(BrokenStore), None, SnapshotCadence::Off, false)
            .await
            .unwrap();
        let state = AppState {
            collector: Arc::new(collector),
            hmac_key: None,
            private_key: None,
            trusted_subnet: None,
        };
        let app = router(state);

        let response = app.oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn mismatched_hmac_signature_rejects_with_bad_request() {
        let collector = Collector::new(Arc::new(MemoryStore::new()), None, SnapshotCadence::Off, false)
            .await
            .unwrap();
        let state = AppState {
            collector: Arc::new(collector),
            hmac_key: Some(Arc::from("testkey")),
            private_key: None,
            trusted_subnet: None,
        };
        let app = router(state);

        let body = serde_json::json!({"id": "Alloc", "type": "gauge", "value": 1.0}).to_string();
        let bad_signature = vitals_crypto::hmac_sign::sign("badkey", body.as_bytes());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/update")
                    .header("content-type", "application/json")
                    .header(vitals_core::constants::HASH_HEADER_NAME, bad_signature)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
