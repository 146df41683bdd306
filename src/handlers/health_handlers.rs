//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the storage configuration

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe; always returns 200 OK with a plain JSON body.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Ready when at least one preservation bucket is configured and at least
/// one of them can be streamed directly (is not cold-tier).
/// HTTP 200 when all checks pass, HTTP 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let buckets_check = if state.buckets.is_empty() {
        (false, Some("no preservation buckets configured".to_string()))
    } else {
        (true, None)
    };

    let readable = state.buckets.iter().any(|b| !b.is_cold_tier());
    let readable_check = if readable {
        (true, None)
    } else {
        (false, Some("no directly readable bucket".to_string()))
    };

    let overall_ok = buckets_check.0 && readable_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "buckets",
        CheckStatus {
            ok: buckets_check.0,
            error: buckets_check.1,
        },
    );
    checks.insert(
        "readable_bucket",
        CheckStatus {
            ok: readable_check.0,
            error: readable_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
