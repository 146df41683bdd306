//! The result of auditing one file, and its CSV representation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// ETags and MD5 digests shorter than this cannot be real hex MD5s.
const MIN_MD5_LEN: usize = 30;

/// How a verdict was reached.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckMethod {
    /// Size and ETag agreed; no content was read.
    #[serde(rename = "Quick Match")]
    QuickMatch,
    /// The object body was streamed through SHA-256.
    #[serde(rename = "Full Fixity")]
    FullFixity,
}

impl CheckMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckMethod::QuickMatch => "Quick Match",
            CheckMethod::FullFixity => "Full Fixity",
        }
    }
}

/// Terminal state an audit ended in.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// A fatal problem stopped the audit; see `AuditRecord::error`.
    Errored,
    QuickMatch,
    /// Something looked wrong but no full check was requested.
    NeedsAttention,
    /// A full check is needed but the only copies are in cold storage.
    ColdTierDeferred,
    FullFixityPassed,
    FullFixityFailed,
}

/// Everything learned while auditing a single file.
///
/// Built by the auditor and never modified after it is returned.
#[derive(Serialize, Clone, Debug)]
pub struct AuditRecord {
    pub outcome: AuditOutcome,

    pub generic_file_id: i64,
    pub generic_file_identifier: String,
    pub generic_file_created_at: Option<DateTime<Utc>>,
    pub generic_file_updated_at: Option<DateTime<Utc>>,

    pub check_started_at: DateTime<Utc>,
    pub check_completed_at: Option<DateTime<Utc>>,

    pub check_passed: bool,
    pub method: Option<CheckMethod>,
    pub reason_for_check: String,

    pub is_cold_tier_only: bool,
    pub needs_cold_tier_fixity_check: bool,

    pub registry_size: i64,
    pub registry_md5: String,
    pub registry_sha256: String,

    pub store_size: i64,
    pub store_etag: String,
    pub store_meta_md5: String,
    pub store_meta_sha256: String,
    pub store_meta_institution: String,
    pub store_meta_bag_name: String,
    pub store_meta_path_in_bag: String,

    pub stream_sha256: String,
    pub storage_url: String,

    pub mismatched_meta_institution: bool,
    pub mismatched_meta_bag_name: bool,
    pub mismatched_meta_path: bool,
    pub mismatched_meta_md5: bool,
    pub mismatched_meta_sha256: bool,

    pub error: String,
}

impl AuditRecord {
    pub fn new(generic_file_id: i64) -> Self {
        Self {
            outcome: AuditOutcome::Errored,
            generic_file_id,
            generic_file_identifier: String::new(),
            generic_file_created_at: None,
            generic_file_updated_at: None,
            check_started_at: Utc::now(),
            check_completed_at: None,
            check_passed: false,
            method: None,
            reason_for_check: String::new(),
            is_cold_tier_only: false,
            needs_cold_tier_fixity_check: false,
            registry_size: 0,
            registry_md5: String::new(),
            registry_sha256: String::new(),
            store_size: 0,
            store_etag: String::new(),
            store_meta_md5: String::new(),
            store_meta_sha256: String::new(),
            store_meta_institution: String::new(),
            store_meta_bag_name: String::new(),
            store_meta_path_in_bag: String::new(),
            stream_sha256: String::new(),
            storage_url: String::new(),
            mismatched_meta_institution: false,
            mismatched_meta_bag_name: false,
            mismatched_meta_path: false,
            mismatched_meta_md5: false,
            mismatched_meta_sha256: false,
            error: String::new(),
        }
    }

    pub fn size_matches(&self) -> bool {
        self.registry_size == self.store_size
    }

    /// An ETag is only a content MD5 for single-part uploads. Multipart
    /// ETags contain a `-` and must never be compared to a digest.
    pub fn can_compare_etag(&self) -> bool {
        self.store_etag.len() > MIN_MD5_LEN
            && self.registry_md5.len() > MIN_MD5_LEN
            && !self.store_etag.contains('-')
    }

    pub fn etag_matches(&self) -> bool {
        self.can_compare_etag() && self.store_etag == self.registry_md5
    }

    /// False when size and ETag are enough to call the file intact.
    pub fn needs_fixity_check(&self) -> bool {
        if !self.size_matches() {
            return true;
        }
        self.can_compare_etag() && !self.etag_matches()
    }

    pub fn has_metadata_mismatch(&self) -> bool {
        self.mismatched_meta_institution
            || self.mismatched_meta_bag_name
            || self.mismatched_meta_path
            || self.mismatched_meta_md5
            || self.mismatched_meta_sha256
    }

    /// Row values in `CSV_HEADERS` order.
    pub fn csv_values(&self) -> Vec<String> {
        vec![
            self.generic_file_id.to_string(),
            self.check_passed.to_string(),
            self.method.map(|m| m.as_str()).unwrap_or("").to_string(),
            self.reason_for_check.clone(),
            self.registry_size.to_string(),
            self.store_size.to_string(),
            self.is_cold_tier_only.to_string(),
            self.needs_cold_tier_fixity_check.to_string(),
            self.store_etag.clone(),
            self.registry_md5.clone(),
            self.store_meta_md5.clone(),
            self.registry_sha256.clone(),
            self.store_meta_sha256.clone(),
            self.stream_sha256.clone(),
            self.mismatched_meta_institution.to_string(),
            self.mismatched_meta_bag_name.to_string(),
            self.mismatched_meta_path.to_string(),
            self.mismatched_meta_md5.to_string(),
            self.mismatched_meta_sha256.to_string(),
            rfc3339(self.generic_file_created_at),
            rfc3339(self.generic_file_updated_at),
            self.store_meta_path_in_bag.clone(),
            self.store_meta_bag_name.clone(),
            self.store_meta_institution.clone(),
            self.storage_url.clone(),
            rfc3339(Some(self.check_started_at)),
            rfc3339(self.check_completed_at),
            self.generic_file_identifier.clone(),
            self.error.clone(),
        ]
    }

    /// One CSV line (without terminator).
    pub fn csv_row(&self) -> String {
        csv_line(&self.csv_values())
    }
}

pub const CSV_HEADERS: [&str; 29] = [
    "GenericFileID",
    "CheckPassed",
    "Method",
    "ReasonForCheck",
    "RegistrySize",
    "StoreSize",
    "IsColdTierOnly",
    "NeedsColdTierFixityCheck",
    "StoreEtag",
    "RegistryMd5",
    "StoreMetaMd5",
    "RegistrySha256",
    "StoreMetaSha256",
    "StreamSha256",
    "MismatchedMetaInstitution",
    "MismatchedMetaBagName",
    "MismatchedMetaPath",
    "MismatchedMetaMd5",
    "MismatchedMetaSha256",
    "GenericFileCreatedAt",
    "GenericFileUpdatedAt",
    "StoreMetaPathInBag",
    "StoreMetaBagName",
    "StoreMetaInstitution",
    "StorageUrl",
    "CheckStartedAt",
    "CheckCompletedAt",
    "GenericFileIdentifier",
    "Error",
];

/// Join fields into a CSV line, quoting where needed.
pub fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| csv_escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Quote a field if it contains a delimiter, quote, or line break.
fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn rfc3339(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}
