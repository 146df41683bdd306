//! Represents a preserved file as recorded in the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const ALG_MD5: &str = "md5";
pub const ALG_SHA256: &str = "sha256";

/// Storage options whose names start with this prefix cannot be read
/// directly; their content must be thawed by a separate retrieval workflow.
const COLD_TIER_PREFIX: &str = "Glacier";

/// True for storage options that cannot be streamed directly.
pub fn is_cold_tier_option(option: &str) -> bool {
    option.starts_with(COLD_TIER_PREFIX)
}

/// Where a recorded digest came from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumSource {
    /// Computed by the ingest pipeline when the bag was first processed.
    Ingest,
    /// Recorded in the catalog (the default for anything the catalog returns).
    #[default]
    Registry,
}

/// A digest recorded for a file at a point in time.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Checksum {
    pub algorithm: String,
    pub digest: String,
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub source: ChecksumSource,
}

/// URL of one physical copy of a file.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageRecord {
    pub url: String,
}

/// A preserved file as the catalog describes it.
///
/// The catalog owns this record; verification code only reads it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GenericFile {
    /// Numeric catalog ID.
    pub id: i64,

    /// Path-like unique identifier: `institution/bag/path/in/bag`.
    pub identifier: String,

    /// Object key under which the bytes are stored in every bucket.
    pub uuid: String,

    /// Size in bytes at ingest.
    pub size: i64,

    /// Storage class tag, e.g. `Standard`, `Glacier-OH`, `Glacier-Deep-VA`, `Wasabi-OR`.
    pub storage_option: String,

    #[serde(default)]
    pub checksums: Vec<Checksum>,

    #[serde(default)]
    pub storage_records: Vec<StorageRecord>,

    /// When fixity was last verified, if ever.
    #[serde(default)]
    pub last_fixity_check: Option<DateTime<Utc>>,

    pub institution_id: i64,
    pub intellectual_object_id: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GenericFile {
    /// The most recent digest recorded for `algorithm`, if any.
    pub fn latest_checksum(&self, algorithm: &str) -> Option<&Checksum> {
        self.checksums
            .iter()
            .filter(|cs| cs.algorithm == algorithm)
            .max_by_key(|cs| cs.datetime)
    }

    /// True when the only copies of this file live in a tier that cannot be
    /// streamed directly.
    pub fn is_cold_tier_only(&self) -> bool {
        is_cold_tier_option(&self.storage_option)
    }

    /// First segment of the identifier.
    pub fn institution_identifier(&self) -> &str {
        self.identifier
            .split_once('/')
            .map(|(inst, _)| inst)
            .unwrap_or(&self.identifier)
    }

    /// Identifier of the bag this file belongs to (first two segments).
    pub fn intellectual_object_identifier(&self) -> Option<String> {
        let parts: Vec<&str> = self.identifier.split('/').collect();
        (parts.len() > 1).then(|| parts[..2].join("/"))
    }

    /// Path of this file inside its bag, e.g. `data/file.txt` for
    /// `test.edu/bag/data/file.txt`.
    pub fn path_in_bag(&self) -> Option<String> {
        let parts: Vec<&str> = self.identifier.split('/').collect();
        (parts.len() > 2).then(|| parts[2..].join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn file(identifier: &str) -> GenericFile {
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        GenericFile {
            id: 1,
            identifier: identifier.into(),
            uuid: "b1a6d5c2-0000-4000-8000-000000000001".into(),
            size: 10,
            storage_option: "Standard".into(),
            checksums: vec![],
            storage_records: vec![],
            last_fixity_check: None,
            institution_id: 3,
            intellectual_object_id: 7,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn identifier_segments() {
        let gf = file("test.edu/bag-one/data/sub dir/file.txt");
        assert_eq!(gf.institution_identifier(), "test.edu");
        assert_eq!(
            gf.intellectual_object_identifier().as_deref(),
            Some("test.edu/bag-one")
        );
        assert_eq!(gf.path_in_bag().as_deref(), Some("data/sub dir/file.txt"));
    }

    #[test]
    fn short_identifier_has_no_path_in_bag() {
        let gf = file("test.edu/bag-one");
        assert_eq!(gf.path_in_bag(), None);
        assert_eq!(
            gf.intellectual_object_identifier().as_deref(),
            Some("test.edu/bag-one")
        );
        assert_eq!(file("test.edu").intellectual_object_identifier(), None);
    }

    #[test]
    fn latest_checksum_picks_newest_for_algorithm() {
        let mut gf = file("test.edu/bag/data/a.txt");
        let t = gf.created_at;
        gf.checksums = vec![
            Checksum {
                algorithm: ALG_SHA256.into(),
                digest: "old".into(),
                datetime: t,
                source: ChecksumSource::Ingest,
            },
            Checksum {
                algorithm: ALG_SHA256.into(),
                digest: "new".into(),
                datetime: t + Duration::days(30),
                source: ChecksumSource::Registry,
            },
            Checksum {
                algorithm: ALG_MD5.into(),
                digest: "md5".into(),
                datetime: t + Duration::days(60),
                source: ChecksumSource::Ingest,
            },
        ];
        assert_eq!(gf.latest_checksum(ALG_SHA256).unwrap().digest, "new");
        assert_eq!(gf.latest_checksum(ALG_MD5).unwrap().digest, "md5");
        assert!(gf.latest_checksum("sha512").is_none());
    }

    #[test]
    fn glacier_options_are_cold_tier() {
        let mut gf = file("test.edu/bag/data/a.txt");
        assert!(!gf.is_cold_tier_only());
        for opt in ["Glacier-OH", "Glacier-Deep-VA"] {
            gf.storage_option = opt.into();
            assert!(gf.is_cold_tier_only());
        }
        gf.storage_option = "Wasabi-OR".into();
        assert!(!gf.is_cold_tier_only());
    }
}
