//! HTTP handlers that run the checker and auditor for a single file.
//! The queue runtime (or an operator) posts a file ID; the response carries
//! the outcome so the caller can route retries and alerts.

use crate::{
    errors::AppError,
    models::audit_record::AuditRecord,
    services::checker::CheckReport,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Fall back to hashing the full object when the quick match is inconclusive.
    pub full: Option<bool>,
}

fn ensure_file_id(file_id: i64) -> Result<(), AppError> {
    if file_id <= 0 {
        return Err(AppError::bad_request(format!(
            "invalid generic file id {}",
            file_id
        )));
    }
    Ok(())
}

/// `POST /fixity/{file_id}`: run the production checker.
///
/// 200 when the run produced no fatal errors (including skips of recently
/// checked files), 422 otherwise.
pub async fn run_fixity_check(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
) -> Result<Response, AppError> {
    ensure_file_id(file_id)?;
    let report: CheckReport = state.checker.check(file_id).await;
    tracing::info!(
        "GenericFile {}: outcome {:?}, count {}, errors {}",
        file_id,
        report.outcome,
        report.count,
        report.errors.len()
    );

    let status = if report.has_fatal_errors() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)).into_response())
}

/// `POST /audit/{file_id}?full=true`: run the auditor and return its record.
pub async fn run_audit(
    State(state): State<AppState>,
    Path(file_id): Path<i64>,
    Query(q): Query<AuditQuery>,
) -> Result<Json<AuditRecord>, AppError> {
    ensure_file_id(file_id)?;
    let record = state.auditor.run(file_id, q.full.unwrap_or(false)).await;
    Ok(Json(record))
}
