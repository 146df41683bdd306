//! Streaming SHA-256 over object bodies.

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use sha2::{Digest, Sha256};
use std::io;

use crate::services::{object_store::ObjectStoreError, storage_resolver::ResolvedLocation};

/// Hash a byte stream chunk by chunk; returns the lowercase hex digest.
pub async fn sha256_stream<S>(stream: S) -> io::Result<String>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut hasher = Sha256::new();
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        hasher.update(&chunk?);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Fetch the object at `resolved` and hash its full body.
pub async fn calculate_sha256(resolved: &ResolvedLocation) -> Result<String, ObjectStoreError> {
    let bucket = &resolved.location.bucket;
    let stream = resolved.client.get(bucket, &resolved.key).await?;
    sha256_stream(stream)
        .await
        .map_err(|source| ObjectStoreError::Read {
            bucket: bucket.clone(),
            key: resolved.key.clone(),
            source,
        })
}
