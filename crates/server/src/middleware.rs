//! The HTTP ingress middleware chain (spec §4.5), applied as one
//! `axum::middleware::from_fn_with_state` wrapping the whole router.
//!
//! Steps run in this exact order: trusted-subnet guard, HMAC verifier,
//! gzip decoder, asymmetric decrypt, access log. The order is load-bearing
//! — verification happens on the raw wire body, before anything is
//! unwrapped — so it is kept as one straight-line function rather than a
//! stack of independently reorderable `tower::Layer`s.

use std::net::IpAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};
use vitals_core::constants::{CONTENT_ENCODING_CRYPTO, CONTENT_ENCODING_HEADER_NAME, HASH_HEADER_NAME, REAL_IP_HEADER_NAME};

use crate::state::AppState;

/// Bodies larger than this are rejected outright rather than buffered.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub async fn pipeline(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let (parts, body) = req.into_parts();

    if let Some(subnet) = state.trusted_subnet {
        if let Some(header_value) = parts.headers.get(REAL_IP_HEADER_NAME) {
            let allowed = header_value
                .to_str()
                .ok()
                .and_then(|s| s.parse::<IpAddr>().ok())
                .is_some_and(|ip| subnet.contains(&ip));
            if !allowed {
                return (StatusCode::FORBIDDEN, "untrusted subnet").into_response();
            }
        }
    }

    let raw_body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(err) => return (StatusCode::BAD_REQUEST, format!("failed to read body: {err}")).into_response(),
    };

    if let Some(key) = &state.hmac_key {
        if let Some(signature) = parts.headers.get(HASH_HEADER_NAME).and_then(|v| v.to_str().ok()) {
            if let Err(err) = vitals_crypto::hmac_sign::verify(key, &raw_body, signature) {
                warn!(error = %err, "request HMAC verification failed");
                return (StatusCode::BAD_REQUEST, "HMAC signature mismatch").into_response();
            }
        }
    }

    let mut processed = raw_body.to_vec();

    let is_gzip = parts
        .headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        == Some("gzip");
    if is_gzip {
        processed = match vitals_crypto::gzip::decompress(&processed) {
            Ok(decompressed) => decompressed,
            Err(err) => return (StatusCode::BAD_REQUEST, format!("gzip decode failed: {err}")).into_response(),
        };
    }

    let is_encrypted = parts
        .headers
        .get(CONTENT_ENCODING_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        == Some(CONTENT_ENCODING_CRYPTO);
    if is_encrypted {
        if let Some(private_key) = &state.private_key {
            processed = match vitals_crypto::rsa_envelope::decrypt(private_key, &processed) {
                Ok(decrypted) => decrypted,
                Err(err) => return (StatusCode::BAD_REQUEST, format!("decryption failed: {err}")).into_response(),
            };
        }
    }

    let request_bytes = processed.len();
    let req = Request::from_parts(parts, Body::from(processed));
    let response = next.run(req).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        request_bytes,
        "request handled"
    );

    response
}
