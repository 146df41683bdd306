//! Core data models for fixity verification.
//!
//! `GenericFile` and `PremisEvent` mirror the catalog's JSON documents;
//! `AuditRecord` and `ProcessingError` are what verification hands back to
//! its callers.

pub mod audit_record;
pub mod generic_file;
pub mod premis_event;
pub mod processing_error;
pub mod storage;
