mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use fixity_audit::{
    models::{
        generic_file::GenericFile,
        premis_event::{EVENT_FIXITY_CHECK, EventOutcome, PremisEvent},
    },
    services::{
        catalog::CatalogError,
        checker::{CheckOutcome, Checker, CheckerSettings},
    },
};
use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

struct Harness {
    checker: Checker,
    catalog: Arc<StubCatalog>,
    store: Arc<StubStore>,
    resolver: Arc<StubResolver>,
}

fn harness_with(gf: GenericFile, body: &[u8], settings: CheckerSettings) -> Harness {
    let catalog = Arc::new(StubCatalog::with_file(gf));
    let store = Arc::new(StubStore::new(healthy_stat(), body));
    let resolver = Arc::new(StubResolver::new(store.clone()));
    let checker = Checker::new(catalog.clone(), resolver.clone(), settings);
    Harness {
        checker,
        catalog,
        store,
        resolver,
    }
}

fn harness(gf: GenericFile, body: &[u8]) -> Harness {
    harness_with(gf, body, CheckerSettings::default())
}

fn event_for(gf: &GenericFile) -> PremisEvent {
    PremisEvent::fixity_check(gf, &storage_url(), &sha256_hex(BODY), &sha256_hex(BODY))
}

#[tokio::test]
async fn matching_digest_records_success_event() {
    let h = harness(generic_file(7), BODY);

    let report = h.checker.check(7).await;

    assert_eq!(report.outcome, CheckOutcome::Matched);
    assert_eq!(report.count, 1);
    assert!(report.errors.is_empty());

    let events = h.catalog.saved_events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.event_type, EVENT_FIXITY_CHECK);
    assert_eq!(event.outcome, EventOutcome::Success);
    assert_eq!(event.outcome_detail, format!("sha256:{}", sha256_hex(BODY)));
    assert_eq!(event.generic_file_id, 7);
    assert_eq!(event.generic_file_identifier, IDENTIFIER);
    assert_eq!(event.intellectual_object_identifier, "test.edu/bag-one");
}

#[tokio::test]
async fn recently_checked_file_is_skipped_without_resolving() {
    let mut gf = generic_file(7);
    gf.last_fixity_check = Some(Utc::now() - ChronoDuration::days(10));
    let h = harness(gf, BODY);

    let (count, errors) = h.checker.run(7).await;

    assert_eq!(count, 0);
    assert!(errors.is_empty());
    assert_eq!(h.resolver.call_count(), 0);
    assert_eq!(h.catalog.save_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_check_is_rechecked() {
    let mut gf = generic_file(7);
    gf.last_fixity_check = Some(Utc::now() - ChronoDuration::days(91));
    let h = harness(gf, BODY);

    let (count, errors) = h.checker.run(7).await;

    assert_eq!(count, 1);
    assert!(errors.is_empty());
    assert_eq!(h.resolver.call_count(), 1);
}

#[tokio::test]
async fn oversized_recheck_window_does_not_overflow() {
    let mut gf = generic_file(7);
    gf.last_fixity_check = Some(Utc::now());
    let settings = CheckerSettings {
        max_days_since_fixity_check: 200_000_000,
        ..CheckerSettings::default()
    };
    let h = harness_with(gf.clone(), BODY, settings);

    assert!(!h.checker.recently_checked(&gf, Utc::now()));
    let (count, errors) = h.checker.run(7).await;

    assert_eq!(count, 1);
    assert!(errors.is_empty());
}

#[tokio::test]
async fn stream_failure_is_fatal_and_records_no_event() {
    let catalog = Arc::new(StubCatalog::with_file(generic_file(7)));
    let store = Arc::new(StubStore::new(healthy_stat(), BODY).failing_mid_stream());
    let resolver = Arc::new(StubResolver::new(store.clone()));
    let checker = Checker::new(catalog.clone(), resolver, CheckerSettings::default());

    let report = checker.check(7).await;

    assert_eq!(report.outcome, CheckOutcome::StorageFailed);
    assert_eq!(report.count, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].is_fatal);
    assert!(
        report.errors[0].message.starts_with("Error streaming"),
        "{}",
        report.errors[0].message
    );
    assert_eq!(store.get_count(), 1);
    assert_eq!(catalog.save_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn end_to_end_runs_ignore_recent_checks() {
    let mut gf = generic_file(7);
    gf.last_fixity_check = Some(Utc::now() - ChronoDuration::hours(1));
    let settings = CheckerSettings {
        is_e2e_test: true,
        ..CheckerSettings::default()
    };
    let h = harness_with(gf, BODY, settings);

    let report = h.checker.check(7).await;

    assert_eq!(report.outcome, CheckOutcome::Matched);
    assert_eq!(h.store.get_count(), 1);
}

#[tokio::test]
async fn cold_tier_file_is_rejected_with_fatal_error() {
    let mut gf = generic_file(7);
    gf.storage_option = "Glacier-VA".into();
    let h = harness(gf, BODY);

    let report = h.checker.check(7).await;

    assert_eq!(report.outcome, CheckOutcome::SkippedColdTier);
    assert_eq!(report.count, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].is_fatal);
    assert!(report.errors[0].message.contains("Glacier-VA"));
    assert_eq!(h.resolver.call_count(), 0);
}

#[tokio::test]
async fn missing_sha256_is_fatal() {
    let mut gf = generic_file(7);
    gf.checksums.retain(|cs| cs.algorithm != "sha256");
    let h = harness(gf, BODY);

    let report = h.checker.check(7).await;

    assert_eq!(report.outcome, CheckOutcome::MissingBaseline);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].is_fatal);
    assert!(report.errors[0].message.contains("no sha256 checksum"));
    assert_eq!(h.store.get_count(), 0);
}

#[tokio::test]
async fn unknown_file_is_fatal() {
    let h = harness(generic_file(7), BODY);

    let report = h.checker.check(8).await;

    assert_eq!(report.outcome, CheckOutcome::FetchFailed);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].is_fatal);
    assert_eq!(report.errors[0].identifier, "8");
}

#[tokio::test]
async fn mismatch_records_failed_event_and_one_fatal_error() {
    let h = harness(generic_file(7), b"bit rot happened here");

    let (count, errors) = h.checker.run(7).await;

    assert_eq!(count, 1);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].is_fatal);
    assert!(errors[0].message.starts_with("Fixity mismatch for"), "{}", errors[0].message);
    assert!(errors[0].message.contains(&sha256_hex(b"bit rot happened here")));

    let events = h.catalog.saved_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].outcome, EventOutcome::Failed);
    assert!(events[0].outcome_information.contains("did not match"));
}

#[tokio::test]
async fn no_storage_location_is_fatal() {
    let catalog = Arc::new(StubCatalog::with_file(generic_file(7)));
    let checker = Checker::new(catalog, Arc::new(StubResolver::empty()), CheckerSettings::default());

    let report = checker.check(7).await;

    assert_eq!(report.outcome, CheckOutcome::StorageFailed);
    assert!(report.has_fatal_errors());
}

#[tokio::test(start_paused = true)]
async fn event_save_retries_bad_gateway_until_success() {
    let gf = generic_file(7);
    let h = harness(gf.clone(), BODY);
    h.catalog.queue_save_result(Err(bad_gateway()));
    h.catalog.queue_save_result(Err(bad_gateway()));

    let started = tokio::time::Instant::now();
    h.checker.record_fixity_event(&event_for(&gf)).await.unwrap();

    assert_eq!(h.catalog.save_calls.load(Ordering::SeqCst), 3);
    assert_eq!(h.catalog.saved_events().len(), 1);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
}

#[tokio::test(start_paused = true)]
async fn event_save_gives_up_after_three_attempts() {
    let gf = generic_file(7);
    let h = harness(gf.clone(), BODY);
    for _ in 0..4 {
        h.catalog.queue_save_result(Err(bad_gateway()));
    }

    let err = h.checker.record_fixity_event(&event_for(&gf)).await.unwrap_err();

    assert!(err.is_bad_gateway());
    assert_eq!(h.catalog.save_calls.load(Ordering::SeqCst), 3);
    assert!(h.catalog.saved_events().is_empty());
}

#[tokio::test]
async fn other_catalog_errors_are_not_retried() {
    let h = harness(generic_file(7), BODY);
    h.catalog
        .queue_save_result(Err(CatalogError::NotFound("GenericFile 7".into())));

    let report = h.checker.check(7).await;

    assert_eq!(report.outcome, CheckOutcome::EventRecordFailed);
    assert_eq!(report.count, 0);
    assert!(report.has_fatal_errors());
    assert_eq!(h.catalog.save_calls.load(Ordering::SeqCst), 1);
}
