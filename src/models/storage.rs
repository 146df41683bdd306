//! Storage-side models: preservation buckets, resolved locations, and the
//! live stat of an object including its user metadata.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::generic_file::is_cold_tier_option;

/// HTTP header prefix under which S3-compatible providers expose user metadata.
pub const USER_META_HEADER_PREFIX: &str = "x-amz-meta-";

/// Characters escaped when a path is encoded as a single URL path segment.
/// Unreserved characters and `$&+:=@` pass through unchanged.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b',')
    .add(b'/')
    .add(b';')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Escape `path` the way the ingest pipeline escapes `bagpath-encoded`.
pub fn escape_path(path: &str) -> String {
    utf8_percent_encode(path, PATH_SEGMENT).to_string()
}

/// A configured preservation bucket.
///
/// Lower `restore_priority` numbers are preferred when choosing where to read
/// a file from. Standard tiers are configured ahead of cold tiers.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PreservationBucket {
    pub bucket: String,
    pub provider: String,
    pub host: String,
    pub region: String,
    #[serde(default)]
    pub storage_class: String,
    #[serde(default)]
    pub option_name: String,
    #[serde(default)]
    pub description: String,
    pub restore_priority: u32,
}

impl PreservationBucket {
    /// Host name with the region embedded, e.g. `s3.us-east-1.amazonaws.com`.
    pub fn host_with_region(&self) -> String {
        let host = self.host.to_lowercase();
        if region_is_embedded(&host) {
            return host;
        }
        let bare = host.strip_prefix("s3.").unwrap_or(&host);
        format!("s3.{}.{}", self.region, bare)
    }

    pub fn is_cold_tier(&self) -> bool {
        is_cold_tier_option(&self.option_name)
    }

    /// True if `url` points into this bucket. Older URLs omit the region.
    pub fn hosts_url(&self, url: &str) -> bool {
        let with_region = format!("https://{}/{}/", self.host_with_region(), self.bucket);
        let without_region = format!("https://{}/{}/", self.host, self.bucket);
        url.starts_with(&with_region) || url.starts_with(&without_region)
    }
}

/// Matches hosts like `s3.us-west-1.wasabisys.com`.
fn region_is_embedded(host: &str) -> bool {
    let Some(rest) = host.strip_prefix("s3.") else {
        return false;
    };
    let Some((region, _)) = rest.split_once('.') else {
        return false;
    };
    let parts: Vec<&str> = region.split('-').collect();
    let is_word = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    matches!(
        parts.as_slice(),
        [area, zone, num]
            if area.len() == 2
                && is_word(area)
                && is_word(zone)
                && num.len() == 1
                && num.chars().all(|c| c.is_ascii_digit())
    )
}

/// One physical copy of a file chosen for reading.
#[derive(Serialize, Clone, Debug)]
pub struct StorageLocation {
    pub bucket: String,
    pub provider: String,
    pub url: String,
}

/// User metadata keys written by the ingest pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaKey {
    Md5,
    Sha256,
    Institution,
    Bag,
    BagPath,
    BagPathEncoded,
}

impl MetaKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetaKey::Md5 => "md5",
            MetaKey::Sha256 => "sha256",
            MetaKey::Institution => "institution",
            MetaKey::Bag => "bag",
            MetaKey::BagPath => "bagpath",
            MetaKey::BagPathEncoded => "bagpath-encoded",
        }
    }
}

/// Lookup order for the path-in-bag value. Some providers cannot carry
/// certain characters in metadata headers, so the ingest pipeline also
/// writes a percent-encoded copy.
const PATH_IN_BAG_KEYS: [MetaKey; 2] = [MetaKey::BagPath, MetaKey::BagPathEncoded];

/// User metadata attached to a stored object, keyed without the
/// `x-amz-meta-` prefix and lowercased.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ObjectMetadata(HashMap<String, String>);

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Accepts keys with or without the header prefix.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        let key = key.as_ref().to_ascii_lowercase();
        let key = key
            .strip_prefix(USER_META_HEADER_PREFIX)
            .map(str::to_string)
            .unwrap_or(key);
        self.0.insert(key, value.into());
    }

    pub fn with(mut self, key: MetaKey, value: impl Into<String>) -> Self {
        self.insert(key.as_str(), value);
        self
    }

    /// Value for `key`, or an empty string when absent.
    pub fn get(&self, key: MetaKey) -> &str {
        self.0.get(key.as_str()).map(String::as_str).unwrap_or("")
    }

    /// Path of the file inside its bag: the first non-empty value among
    /// `bagpath` then `bagpath-encoded`.
    pub fn path_in_bag(&self) -> &str {
        PATH_IN_BAG_KEYS
            .iter()
            .map(|key| self.get(*key))
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }
}

/// Result of a stat (HEAD) against an object.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ObjectStat {
    pub size: i64,
    /// ETag with surrounding quotes removed.
    pub etag: String,
    pub metadata: ObjectMetadata,
}
