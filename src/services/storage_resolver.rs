//! Picks the best readable copy of a file among the configured buckets.

use std::{collections::HashMap, sync::Arc};
use tracing::info;

use crate::{
    errors::FixityError,
    models::{
        generic_file::GenericFile,
        storage::{PreservationBucket, StorageLocation},
    },
    services::object_store::{HttpObjectStore, ObjectStore},
};

/// A chosen copy plus the client that can read it.
#[derive(Clone)]
pub struct ResolvedLocation {
    pub location: StorageLocation,
    /// Object key within `location.bucket`.
    pub key: String,
    pub client: Arc<dyn ObjectStore>,
}

pub trait LocationResolver: Send + Sync {
    fn resolve_best_location(&self, gf: &GenericFile) -> Result<ResolvedLocation, FixityError>;
}

/// Resolves against a fixed list of preservation buckets, one client per provider.
#[derive(Clone)]
pub struct BucketResolver {
    buckets: Vec<PreservationBucket>,
    clients: HashMap<String, Arc<dyn ObjectStore>>,
}

impl BucketResolver {
    pub fn new(
        buckets: Vec<PreservationBucket>,
        clients: HashMap<String, Arc<dyn ObjectStore>>,
    ) -> Self {
        Self { buckets, clients }
    }

    /// Build one HTTP client per provider, sharing `http`'s connection pool.
    pub fn with_http_clients(buckets: Vec<PreservationBucket>, http: reqwest::Client) -> Self {
        let mut stores: HashMap<String, HttpObjectStore> = HashMap::new();
        for b in &buckets {
            let endpoint = format!("https://{}", b.host_with_region());
            let store = stores
                .remove(&b.provider)
                .unwrap_or_else(|| HttpObjectStore::new(http.clone()))
                .with_bucket(b.bucket.clone(), endpoint);
            stores.insert(b.provider.clone(), store);
        }
        let clients = stores
            .into_iter()
            .map(|(provider, store)| (provider, Arc::new(store) as Arc<dyn ObjectStore>))
            .collect();
        Self::new(buckets, clients)
    }
}

impl LocationResolver for BucketResolver {
    fn resolve_best_location(&self, gf: &GenericFile) -> Result<ResolvedLocation, FixityError> {
        let best = gf
            .storage_records
            .iter()
            .flat_map(|sr| {
                self.buckets
                    .iter()
                    .filter(move |b| b.hosts_url(&sr.url))
                    .map(move |b| (b, sr))
            })
            .min_by_key(|(b, _)| b.restore_priority);

        let Some((bucket, record)) = best else {
            return Err(FixityError::NoStorageLocation {
                identifier: gf.identifier.clone(),
                reason: format!(
                    "{} storage records, {} preservation buckets",
                    gf.storage_records.len(),
                    self.buckets.len()
                ),
            });
        };
        info!("Most accessible source for {} is {}", gf.identifier, bucket.bucket);

        let client = self
            .clients
            .get(&bucket.provider)
            .cloned()
            .ok_or_else(|| FixityError::MissingClient(bucket.provider.clone()))?;

        Ok(ResolvedLocation {
            location: StorageLocation {
                bucket: bucket.bucket.clone(),
                provider: bucket.provider.clone(),
                url: record.url.clone(),
            },
            key: gf.uuid.clone(),
            client,
        })
    }
}
