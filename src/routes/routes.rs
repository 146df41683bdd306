//! Defines routes for the fixity worker.
//!
//! ## Structure
//! - **Probes**
//!   - `GET  /healthz` - liveness
//!   - `GET  /readyz`  - readiness
//!
//! - **Verification**
//!   - `POST /fixity/{file_id}` - run the production checker for one file
//!   - `POST /audit/{file_id}`  - run the auditor (`?full=true` for full fixity fallback)

use crate::{
    handlers::{
        fixity_handlers::{run_audit, run_fixity_check},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build and return the router for the worker.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // verification endpoints
        .route("/fixity/{file_id}", post(run_fixity_check))
        .route("/audit/{file_id}", post(run_audit))
}
