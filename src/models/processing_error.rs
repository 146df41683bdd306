//! Structured errors handed back to the queue runtime.

use serde::Serialize;
use std::{fmt, panic::Location};

/// An error raised while processing one file.
///
/// Fatal errors will fail again on retry (a missing baseline digest, a
/// digest mismatch). Non-fatal errors are expected to clear on their own.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ProcessingError {
    /// File identifier, or the numeric file ID when the file could not be fetched.
    pub identifier: String,
    pub message: String,
    pub is_fatal: bool,
    /// Fixity checks have no work item; always 0.
    pub work_item_id: i64,
    /// `file:line` where the error was raised.
    pub source: String,
}

impl ProcessingError {
    #[track_caller]
    pub fn new(identifier: impl Into<String>, message: impl Into<String>, is_fatal: bool) -> Self {
        let caller = Location::caller();
        Self {
            identifier: identifier.into(),
            message: message.into(),
            is_fatal,
            work_item_id: 0,
            source: format!("{}:{}", caller.file(), caller.line()),
        }
    }

    #[track_caller]
    pub fn fatal(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(identifier, message, true)
    }
}

impl fmt::Display for ProcessingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.is_fatal { "fatal" } else { "non-fatal" };
        write!(
            f,
            "(workitem {}) (message: {}) (severity: {}) (identifier: {}) (source: {})",
            self.work_item_id, self.message, severity, self.identifier, self.source
        )
    }
}

impl std::error::Error for ProcessingError {}
