//! The server's `/debug/pprof/profile` mount (spec §4.5, "Debug surface"),
//! merged straight into the main HTTP router rather than a separate
//! listener — the server already has one HTTP surface to hang it off of,
//! unlike the agent which runs its own dedicated debug port.

use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use pprof::ProfilerGuardBuilder;
use serde::Deserialize;

use crate::state::AppState;

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

/// The debug route, merged into `http::router` before the middleware
/// chain is applied.
pub fn route() -> Router<AppState> {
    Router::new().route("/debug/pprof/profile", get(profile_handler))
}
