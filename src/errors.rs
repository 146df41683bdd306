use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::services::{catalog::CatalogError, object_store::ObjectStoreError};

/// Everything that can stop a fixity check before it reaches a verdict.
#[derive(Debug, Error)]
pub enum FixityError {
    /// The catalog has no usable storage location for the file.
    #[error("Could not find restoration source for {identifier}: {reason}")]
    NoStorageLocation { identifier: String, reason: String },

    #[error("Cannot find object store client for provider {0}")]
    MissingClient(String),

    /// No SHA-256 digest recorded; there is nothing to verify against.
    #[error("Registry returned no sha256 checksum for file {0}")]
    MissingBaseline(String),

    /// Catalog lookups and writes, including not-found and gateway errors.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Stat, fetch, or read failures against an object store.
    #[error(transparent)]
    Storage(#[from] ObjectStoreError),

    #[error("Fixity mismatch for {identifier} in {url}. Expected {expected}, got {actual}.")]
    Integrity {
        identifier: String,
        url: String,
        expected: String,
        actual: String,
    },
}

/// A lightweight wrapper for HTTP-facing errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}
