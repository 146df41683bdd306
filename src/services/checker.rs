//! Checker: the production, one-file-per-invocation fixity worker.
//!
//! ```text
//! fetched ─┬─ SkippedColdTier
//!          ├─ SkippedRecent
//!          ├─ MissingBaseline
//!          └─ hashing ─┬─ StorageFailed
//!                      └─ compared ─┬─ EventRecordFailed
//!                                   └─ event recorded ─┬─ Matched
//!                                                      └─ Mismatched
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};

use crate::{
    errors::FixityError,
    models::{
        generic_file::{ALG_SHA256, GenericFile},
        premis_event::{EventOutcome, PremisEvent},
        processing_error::ProcessingError,
    },
    services::{
        catalog::{Catalog, CatalogError},
        fixity::calculate_sha256,
        storage_resolver::LocationResolver,
    },
};

pub const DEFAULT_MAX_DAYS_SINCE_FIXITY_CHECK: i64 = 90;
const EVENT_SAVE_ATTEMPTS: u32 = 3;
const EVENT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct CheckerSettings {
    /// Files checked more recently than this are skipped.
    pub max_days_since_fixity_check: i64,
    /// End-to-end test runs re-check files regardless of when they were last checked.
    pub is_e2e_test: bool,
    pub event_save_attempts: u32,
    pub event_retry_delay: Duration,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            max_days_since_fixity_check: DEFAULT_MAX_DAYS_SINCE_FIXITY_CHECK,
            is_e2e_test: false,
            event_save_attempts: EVENT_SAVE_ATTEMPTS,
            event_retry_delay: EVENT_RETRY_DELAY,
        }
    }
}

/// Terminal state of one checker invocation.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckOutcome {
    FetchFailed,
    SkippedColdTier,
    SkippedRecent,
    MissingBaseline,
    StorageFailed,
    EventRecordFailed,
    Matched,
    Mismatched,
}

/// What one invocation did: how many files it verified (0 or 1) and any
/// errors the queue runtime should act on.
#[derive(Serialize, Clone, Debug)]
pub struct CheckReport {
    pub file_id: i64,
    pub outcome: CheckOutcome,
    pub count: u32,
    pub errors: Vec<ProcessingError>,
}

impl CheckReport {
    fn new(file_id: i64, outcome: CheckOutcome, count: u32) -> Self {
        Self {
            file_id,
            outcome,
            count,
            errors: Vec::new(),
        }
    }

    #[track_caller]
    fn fatal(file_id: i64, outcome: CheckOutcome, identifier: &str, err: FixityError) -> Self {
        let mut report = Self::new(file_id, outcome, 0);
        report.errors.push(ProcessingError::fatal(identifier, err.to_string()));
        report
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(|e| e.is_fatal)
    }
}

#[derive(Clone)]
pub struct Checker {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<dyn LocationResolver>,
    settings: CheckerSettings,
}

impl Checker {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        resolver: Arc<dyn LocationResolver>,
        settings: CheckerSettings,
    ) -> Self {
        Self {
            catalog,
            resolver,
            settings,
        }
    }

    /// Verify one file: `(count, errors)` for the queue runtime.
    pub async fn run(&self, file_id: i64) -> (u32, Vec<ProcessingError>) {
        let report = self.check(file_id).await;
        (report.count, report.errors)
    }

    /// Verify one file and report which terminal state it reached.
    pub async fn check(&self, file_id: i64) -> CheckReport {
        let gf = match self.catalog.get_file(file_id).await {
            Ok(gf) => gf,
            Err(err) => {
                return CheckReport::fatal(
                    file_id,
                    CheckOutcome::FetchFailed,
                    &file_id.to_string(),
                    err.into(),
                );
            }
        };

        if gf.is_cold_tier_only() {
            info!("Skipping file {} because it is cold-tier only", gf.identifier);
            let mut report = CheckReport::new(file_id, CheckOutcome::SkippedColdTier, 0);
            report.errors.push(ProcessingError::fatal(
                &gf.identifier,
                format!(
                    "Skipping {}: storage option {} cannot be read directly; \
                     it must be checked through the cold-tier retrieval workflow",
                    gf.identifier, gf.storage_option
                ),
            ));
            return report;
        }

        if self.recently_checked(&gf, Utc::now()) {
            info!(
                "Skipping file {}: last fixity check {:?} is within {} days",
                gf.identifier, gf.last_fixity_check, self.settings.max_days_since_fixity_check
            );
            return CheckReport::new(file_id, CheckOutcome::SkippedRecent, 0);
        }

        let Some(expected) = gf.latest_checksum(ALG_SHA256).map(|cs| cs.digest.clone()) else {
            return CheckReport::fatal(
                file_id,
                CheckOutcome::MissingBaseline,
                &gf.identifier,
                FixityError::MissingBaseline(gf.identifier.clone()),
            );
        };

        let (actual, url) = match self.calculate_fixity(&gf).await {
            Ok(result) => result,
            Err(err) => {
                return CheckReport::fatal(
                    file_id,
                    CheckOutcome::StorageFailed,
                    &gf.identifier,
                    err,
                );
            }
        };

        let event = PremisEvent::fixity_check(&gf, &url, &expected, &actual);
        if let Err(err) = self.record_fixity_event(&event).await {
            return CheckReport::fatal(
                file_id,
                CheckOutcome::EventRecordFailed,
                &gf.identifier,
                err.into(),
            );
        }

        if event.outcome == EventOutcome::Success {
            info!("File {}: fixity matched at {}", gf.identifier, url);
            return CheckReport::new(file_id, CheckOutcome::Matched, 1);
        }

        error!("GenericFile {}: {}", gf.identifier, event.outcome_information);
        let mismatch = FixityError::Integrity {
            identifier: gf.identifier.clone(),
            url,
            expected,
            actual,
        };
        let mut report = CheckReport::new(file_id, CheckOutcome::Mismatched, 1);
        report
            .errors
            .push(ProcessingError::fatal(&gf.identifier, mismatch.to_string()));
        report
    }

    /// True when the file was checked within the minimum interval and this
    /// is not an end-to-end test run.
    pub fn recently_checked(&self, gf: &GenericFile, now: DateTime<Utc>) -> bool {
        if self.settings.is_e2e_test {
            return false;
        }
        // An unrepresentable window never marks a file as recent.
        let Some(expected_last_check) =
            ChronoDuration::try_days(self.settings.max_days_since_fixity_check)
                .and_then(|window| now.checked_sub_signed(window))
        else {
            return false;
        };
        gf.last_fixity_check
            .is_some_and(|last| last > expected_last_check)
    }

    /// Stream the best copy of `gf` through SHA-256; returns `(digest, url)`.
    async fn calculate_fixity(&self, gf: &GenericFile) -> Result<(String, String), FixityError> {
        let resolved = self.resolver.resolve_best_location(gf)?;
        let digest = calculate_sha256(&resolved).await?;
        Ok((digest, resolved.location.url))
    }

    /// Save `event`, retrying only when the catalog answers 502.
    pub async fn record_fixity_event(&self, event: &PremisEvent) -> Result<(), CatalogError> {
        let mut attempt = 1;
        loop {
            match self.catalog.save_event(event).await {
                Err(err) if err.is_bad_gateway() && attempt < self.settings.event_save_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.settings.event_save_attempts,
                        "Saving fixity event for {} got bad gateway, retrying in {:?}",
                        event.generic_file_identifier,
                        self.settings.event_retry_delay
                    );
                    tokio::time::sleep(self.settings.event_retry_delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
