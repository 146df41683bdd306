//! Object store access: stat an object and stream its body.
//!
//! `HttpObjectStore` talks to S3-compatible providers using path-style
//! addressing (`{endpoint}/{bucket}/{key}`). `HEAD` yields size, ETag, and
//! `x-amz-meta-*` user metadata; `GET` yields the body as a byte stream that
//! is never buffered whole.
//!
//! Requests are sent unsigned. Private buckets are expected to sit behind a
//! signing proxy configured as the bucket's host.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use reqwest::{StatusCode, header};
use std::{collections::HashMap, io};
use thiserror::Error;
use tracing::debug;

use crate::models::storage::{ObjectMetadata, ObjectStat, USER_META_HEADER_PREFIX};

/// Object body as an incremental stream of chunks.
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("bucket `{0}` is not served by this client")]
    UnknownBucket(String),
    #[error("Could not stat file at {bucket}/{key}: {reason}")]
    Stat {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("Error getting {key} from bucket {bucket}: {reason}")]
    Get {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("Error streaming file {bucket}/{key} through hash function: {source}")]
    Read {
        bucket: String,
        key: String,
        #[source]
        source: io::Error,
    },
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn stat(&self, bucket: &str, key: &str) -> ObjectStoreResult<ObjectStat>;
    async fn get(&self, bucket: &str, key: &str) -> ObjectStoreResult<ByteStream>;
}

/// Client for one storage provider.
///
/// A provider may host several buckets on different regional endpoints, so
/// the client keeps an endpoint per bucket and shares one connection pool.
#[derive(Clone)]
pub struct HttpObjectStore {
    http: reqwest::Client,
    endpoints: HashMap<String, String>,
}

impl HttpObjectStore {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            endpoints: HashMap::new(),
        }
    }

    /// Serve `bucket` from `endpoint` (e.g. `https://s3.us-east-1.amazonaws.com`).
    pub fn with_bucket(mut self, bucket: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.endpoints.insert(bucket.into(), endpoint.into());
        self
    }

    fn object_url(&self, bucket: &str, key: &str) -> ObjectStoreResult<String> {
        let endpoint = self
            .endpoints
            .get(bucket)
            .ok_or_else(|| ObjectStoreError::UnknownBucket(bucket.to_string()))?;
        Ok(format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn stat(&self, bucket: &str, key: &str) -> ObjectStoreResult<ObjectStat> {
        let url = self.object_url(bucket, key)?;
        debug!("HEAD {}", url);
        let stat_err = |reason: String| ObjectStoreError::Stat {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let resp = self
            .http
            .head(&url)
            .send()
            .await
            .map_err(|err| stat_err(err.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => {
                return Err(ObjectStoreError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            status if !status.is_success() => {
                return Err(stat_err(format!("unexpected status {}", status)));
            }
            _ => {}
        }

        let headers = resp.headers();
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| stat_err("missing or invalid Content-Length".into()))?;
        let etag = headers
            .get(header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim_matches('"').to_string())
            .unwrap_or_default();

        let mut metadata = ObjectMetadata::new();
        for (name, value) in headers {
            if !name.as_str().starts_with(USER_META_HEADER_PREFIX) {
                continue;
            }
            if let Ok(value) = value.to_str() {
                metadata.insert(name.as_str(), value);
            }
        }

        Ok(ObjectStat {
            size,
            etag,
            metadata,
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> ObjectStoreResult<ByteStream> {
        let url = self.object_url(bucket, key)?;
        debug!("GET {}", url);
        let get_err = |reason: String| ObjectStoreError::Get {
            bucket: bucket.to_string(),
            key: key.to_string(),
            reason,
        };

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| get_err(err.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(ObjectStoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            status if !status.is_success() => Err(get_err(format!("unexpected status {}", status))),
            _ => Ok(resp.bytes_stream().map(|chunk| chunk.map_err(io::Error::other)).boxed()),
        }
    }
}
