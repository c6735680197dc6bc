//! The agent's own `/debug/pprof/profile` mount point (spec §6, "Debug
//! surface"). The reference agent exposes this on a dedicated port,
//! independent of whichever transport it reports metrics over.

use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use pprof::ProfilerGuardBuilder;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct ProfileQuery {
    #[serde(default = "default_seconds")]
    seconds: u64,
}

fn default_seconds() -> u64 {
    5
}

async fn profile_handler(Query(query): Query<ProfileQuery>) -> impl IntoResponse {
    let guard = match ProfilerGuardBuilder::default().frequency(100).build() {
        Ok(guard) => guard,
        Err(err) => return (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to start profiler: {err}")).into_response(),
    };

    tokio::time::sleep(Duration::from_secs(query.seconds.clamp(1, 60))).await;

    match guard.report().build() {
        Ok(report) => {
            let mut flamegraph = Vec::new();
            if let Err(err) = report.flamegraph(&mut flamegraph) {
                return (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to render flamegraph: {err}")).into_response();
            }
            ([("content-type", "image/svg+xml")], flamegraph).into_response()
        }
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to build profile report: {err}")).into_response(),
    }
}

/// Spawn the agent's debug listener on `address`, until `shutdown`
/// cancels.
pub fn spawn(address: String, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let router = Router::new().route("/debug/pprof/profile", get(profile_handler));
        let listener = match tokio::net::TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(%address, error = %err, "failed to bind agent debug listener");
                return;
            }
        };
        info!(%address, "agent debug surface listening");
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        });
        if let Err(err) = serve.await {
            warn!(error = %err, "agent debug listener exited with error");
        }
    });
}
