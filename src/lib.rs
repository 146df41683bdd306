//! Fixity verification and audit for preserved files.
//!
//! Two entry points share one set of comparison primitives:
//! [`services::auditor::Auditor`] for batch and ad-hoc audits that produce an
//! [`models::audit_record::AuditRecord`] per file, and
//! [`services::checker::Checker`] for the production per-file worker that
//! writes a PREMIS event back to the catalog.

pub mod batch;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
