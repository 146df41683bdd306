//! Verification services and the collaborators they depend on.

pub mod auditor;
pub mod catalog;
pub mod checker;
pub mod fixity;
pub mod object_store;
pub mod storage_resolver;
