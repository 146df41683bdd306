//! Shared state handed to every HTTP handler.

use std::sync::Arc;

use crate::{
    models::storage::PreservationBucket,
    services::{auditor::Auditor, checker::Checker},
};

#[derive(Clone)]
pub struct AppState {
    pub checker: Arc<Checker>,
    pub auditor: Arc<Auditor>,
    pub buckets: Arc<Vec<PreservationBucket>>,
}
