//! Auditor: ad-hoc and batch verification of individual files.
//!
//! Each audit ends in exactly one [`AuditOutcome`]. Metadata comparison runs
//! before the quick-match gate, so a file with mismatched metadata is never
//! quick-matched; if no full check was requested it ends as
//! `NeedsAttention` without any content being read.

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    errors::FixityError,
    models::{
        audit_record::{AuditOutcome, AuditRecord, CheckMethod},
        generic_file::{ALG_MD5, ALG_SHA256, GenericFile},
        storage::{MetaKey, escape_path},
    },
    services::{catalog::Catalog, fixity::calculate_sha256, storage_resolver::LocationResolver},
};

pub const REASON_METADATA_MISMATCH: &str = "metadata mismatch";
pub const REASON_SIZE_MISMATCH: &str = "size mismatch";
pub const REASON_ETAG_MISMATCH: &str = "etag mismatch";

#[derive(Clone)]
pub struct Auditor {
    catalog: Arc<dyn Catalog>,
    resolver: Arc<dyn LocationResolver>,
}

impl Auditor {
    pub fn new(catalog: Arc<dyn Catalog>, resolver: Arc<dyn LocationResolver>) -> Self {
        Self { catalog, resolver }
    }

    /// Audit one file. Never fails: fatal problems are recorded in
    /// `AuditRecord::error` so a batch can carry on past a bad file.
    pub async fn run(&self, file_id: i64, do_full_check_if_necessary: bool) -> AuditRecord {
        let mut record = AuditRecord::new(file_id);
        record.outcome = match self.audit(&mut record, do_full_check_if_necessary).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!("Audit of file {} stopped: {}", file_id, err);
                record.error = err.to_string();
                AuditOutcome::Errored
            }
        };
        record
    }

    async fn audit(
        &self,
        record: &mut AuditRecord,
        do_full_check_if_necessary: bool,
    ) -> Result<AuditOutcome, FixityError> {
        let gf = self.catalog.get_file(record.generic_file_id).await?;
        copy_registry_fields(record, &gf);

        let resolved = self.resolver.resolve_best_location(&gf)?;
        record.storage_url = resolved.location.url.clone();

        let stat = resolved
            .client
            .stat(&resolved.location.bucket, &resolved.key)
            .await?;
        record.store_size = stat.size;
        record.store_etag = stat.etag;
        record.store_meta_md5 = stat.metadata.get(MetaKey::Md5).to_string();
        record.store_meta_sha256 = stat.metadata.get(MetaKey::Sha256).to_string();
        record.store_meta_institution = stat.metadata.get(MetaKey::Institution).to_string();
        record.store_meta_bag_name = stat.metadata.get(MetaKey::Bag).to_string();
        record.store_meta_path_in_bag = stat.metadata.path_in_bag().to_string();

        flag_metadata_mismatches(record, &gf);

        if record.has_metadata_mismatch() {
            record.reason_for_check = REASON_METADATA_MISMATCH.into();
        } else if !record.needs_fixity_check() {
            record.check_passed = true;
            record.method = Some(CheckMethod::QuickMatch);
            record.check_completed_at = Some(Utc::now());
            return Ok(AuditOutcome::QuickMatch);
        } else if !record.size_matches() {
            record.reason_for_check = REASON_SIZE_MISMATCH.into();
        } else {
            record.reason_for_check = REASON_ETAG_MISMATCH.into();
        }

        if !do_full_check_if_necessary {
            record.check_passed = false;
            record.check_completed_at = Some(Utc::now());
            return Ok(AuditOutcome::NeedsAttention);
        }

        record.method = Some(CheckMethod::FullFixity);

        if record.is_cold_tier_only {
            info!(
                "{} is cold-tier only ({}); deferring full fixity check",
                gf.identifier, gf.storage_option
            );
            record.needs_cold_tier_fixity_check = true;
            return Ok(AuditOutcome::ColdTierDeferred);
        }

        let actual = calculate_sha256(&resolved).await?;
        record.check_passed = record.registry_sha256 == actual;
        record.stream_sha256 = actual;
        record.check_completed_at = Some(Utc::now());

        if record.check_passed {
            Ok(AuditOutcome::FullFixityPassed)
        } else {
            error!(
                "Fixity mismatch for {} at {}: registry {}, stream {}",
                gf.identifier, record.storage_url, record.registry_sha256, record.stream_sha256
            );
            Ok(AuditOutcome::FullFixityFailed)
        }
    }
}

fn copy_registry_fields(record: &mut AuditRecord, gf: &GenericFile) {
    record.generic_file_identifier = gf.identifier.clone();
    record.generic_file_created_at = Some(gf.created_at);
    record.generic_file_updated_at = Some(gf.updated_at);
    record.registry_size = gf.size;
    record.is_cold_tier_only = gf.is_cold_tier_only();
    if let Some(cs) = gf.latest_checksum(ALG_MD5) {
        record.registry_md5 = cs.digest.clone();
    }
    if let Some(cs) = gf.latest_checksum(ALG_SHA256) {
        record.registry_sha256 = cs.digest.clone();
    }
}

/// Compare stored object metadata with what the catalog says it should be.
/// A catalog identifier too short to contain a path counts as a path mismatch.
fn flag_metadata_mismatches(record: &mut AuditRecord, gf: &GenericFile) {
    let stored_path = record.store_meta_path_in_bag.as_str();
    record.mismatched_meta_path = match gf.path_in_bag() {
        Some(path) => stored_path != path && stored_path != escape_path(&path),
        None => true,
    };
    record.mismatched_meta_bag_name =
        record.store_meta_bag_name != gf.intellectual_object_identifier().unwrap_or_default();
    record.mismatched_meta_institution =
        record.store_meta_institution != gf.institution_identifier();
    record.mismatched_meta_md5 = record.store_meta_md5 != record.registry_md5;
    record.mismatched_meta_sha256 = record.store_meta_sha256 != record.registry_sha256;
}
