//! In-memory catalog, resolver, and object store used by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use fixity_audit::{
    errors::FixityError,
    models::{
        generic_file::{ALG_MD5, ALG_SHA256, Checksum, ChecksumSource, GenericFile, StorageRecord},
        premis_event::PremisEvent,
        storage::{MetaKey, ObjectMetadata, ObjectStat, StorageLocation},
    },
    services::{
        catalog::{Catalog, CatalogError, CatalogResult},
        object_store::{ByteStream, ObjectStore, ObjectStoreResult},
        storage_resolver::{LocationResolver, ResolvedLocation},
    },
};
use futures::stream;
use sha2::{Digest, Sha256};
use std::{
    collections::{HashMap, VecDeque},
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

pub const BODY: &[u8] = b"The quick brown fox jumps over the lazy dog\n";
pub const BUCKET: &str = "preservation.va";
pub const IDENTIFIER: &str = "test.edu/bag-one/data/sub dir/file one.txt";
pub const UUID: &str = "6f1c4b0e-8e7a-4c55-9a51-3f4f0d7d2a10";

pub fn md5_hex(body: &[u8]) -> String {
    format!("{:x}", md5::compute(body))
}

pub fn sha256_hex(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 14, 9, 26, 53).unwrap()
}

pub fn storage_url() -> String {
    format!("https://s3.us-east-1.amazonaws.com/{}/{}", BUCKET, UUID)
}

/// A standard-tier file whose recorded digests match `BODY`.
pub fn generic_file(id: i64) -> GenericFile {
    GenericFile {
        id,
        identifier: IDENTIFIER.into(),
        uuid: UUID.into(),
        size: BODY.len() as i64,
        storage_option: "Standard".into(),
        checksums: vec![
            Checksum {
                algorithm: ALG_MD5.into(),
                digest: md5_hex(BODY),
                datetime: t0(),
                source: ChecksumSource::Ingest,
            },
            Checksum {
                algorithm: ALG_SHA256.into(),
                digest: sha256_hex(BODY),
                datetime: t0(),
                source: ChecksumSource::Ingest,
            },
        ],
        storage_records: vec![StorageRecord { url: storage_url() }],
        last_fixity_check: None,
        institution_id: 4,
        intellectual_object_id: 77,
        created_at: t0(),
        updated_at: t0() + Duration::days(1),
    }
}

/// Stat of a healthy single-part upload of `BODY` with complete metadata.
pub fn healthy_stat() -> ObjectStat {
    ObjectStat {
        size: BODY.len() as i64,
        etag: md5_hex(BODY),
        metadata: ObjectMetadata::new()
            .with(MetaKey::Md5, md5_hex(BODY))
            .with(MetaKey::Sha256, sha256_hex(BODY))
            .with(MetaKey::Institution, "test.edu")
            .with(MetaKey::Bag, "test.edu/bag-one")
            .with(MetaKey::BagPath, "data/sub dir/file one.txt"),
    }
}

// --- Catalog ---

#[derive(Default)]
pub struct StubCatalog {
    files: Mutex<HashMap<i64, GenericFile>>,
    /// Per-file latency for `get_file`, so concurrent lookups finish out of order.
    delays: Mutex<HashMap<i64, std::time::Duration>>,
    /// Results handed out by successive `save_event` calls; `Ok` once drained.
    save_results: Mutex<VecDeque<CatalogResult<()>>>,
    pub saved: Mutex<Vec<PremisEvent>>,
    pub save_calls: AtomicUsize,
}

impl StubCatalog {
    pub fn with_file(gf: GenericFile) -> Self {
        let catalog = Self::default();
        catalog.files.lock().unwrap().insert(gf.id, gf);
        catalog
    }

    pub fn add_file(&self, gf: GenericFile) {
        self.files.lock().unwrap().insert(gf.id, gf);
    }

    pub fn delay_file(&self, id: i64, delay: std::time::Duration) {
        self.delays.lock().unwrap().insert(id, delay);
    }

    pub fn queue_save_result(&self, result: CatalogResult<()>) {
        self.save_results.lock().unwrap().push_back(result);
    }

    pub fn saved_events(&self) -> Vec<PremisEvent> {
        self.saved.lock().unwrap().clone()
    }
}

pub fn bad_gateway() -> CatalogError {
    CatalogError::Status {
        endpoint: "/admin-api/v3/events/".into(),
        status: reqwest::StatusCode::BAD_GATEWAY,
        body: "<html>502 Bad Gateway</html>".into(),
    }
}

#[async_trait]
impl Catalog for StubCatalog {
    async fn get_file(&self, id: i64) -> CatalogResult<GenericFile> {
        let delay = self.delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.files
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(format!("GenericFile {}", id)))
    }

    async fn save_event(&self, event: &PremisEvent) -> CatalogResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.save_results.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.saved.lock().unwrap().push(event.clone());
        }
        result
    }
}

// --- Object store ---

pub struct StubStore {
    stat: ObjectStat,
    body: Bytes,
    /// Break the connection after the first chunk.
    fail_mid_stream: bool,
    pub stats: AtomicUsize,
    pub gets: AtomicUsize,
}

impl StubStore {
    pub fn new(stat: ObjectStat, body: &[u8]) -> Self {
        Self {
            stat,
            body: Bytes::copy_from_slice(body),
            fail_mid_stream: false,
            stats: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
        }
    }

    /// `get` succeeds but the body errors after its first chunk.
    pub fn failing_mid_stream(mut self) -> Self {
        self.fail_mid_stream = true;
        self
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for StubStore {
    async fn stat(&self, _bucket: &str, _key: &str) -> ObjectStoreResult<ObjectStat> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        Ok(self.stat.clone())
    }

    async fn get(&self, _bucket: &str, _key: &str) -> ObjectStoreResult<ByteStream> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        // Two chunks so hashing has to carry state across reads.
        let mid = self.body.len() / 2;
        let second = if self.fail_mid_stream {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"))
        } else {
            Ok(self.body.slice(mid..))
        };
        let chunks: Vec<io::Result<Bytes>> = vec![Ok(self.body.slice(..mid)), second];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

// --- Resolver ---

pub struct StubResolver {
    store: Option<Arc<StubStore>>,
    pub calls: AtomicUsize,
}

impl StubResolver {
    pub fn new(store: Arc<StubStore>) -> Self {
        Self {
            store: Some(store),
            calls: AtomicUsize::new(0),
        }
    }

    /// A resolver that finds no copy of any file.
    pub fn empty() -> Self {
        Self {
            store: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LocationResolver for StubResolver {
    fn resolve_best_location(&self, gf: &GenericFile) -> Result<ResolvedLocation, FixityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(store) = &self.store else {
            return Err(FixityError::NoStorageLocation {
                identifier: gf.identifier.clone(),
                reason: format!("{} storage records, 0 preservation buckets", gf.storage_records.len()),
            });
        };
        Ok(ResolvedLocation {
            location: StorageLocation {
                bucket: BUCKET.into(),
                provider: "aws".into(),
                url: storage_url(),
            },
            key: gf.uuid.clone(),
            client: store.clone(),
        })
    }
}
