//! Catalog ("Registry") access: read file records, write PREMIS events.

use async_trait::async_trait;
use reqwest::{StatusCode, header};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::models::{generic_file::GenericFile, premis_event::PremisEvent};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} not found in registry")]
    NotFound(String),
    #[error("registry {endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("HTTP error calling registry {endpoint}: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

impl CatalogError {
    /// The registry's front-end proxy answers 502 when the app is busy.
    pub fn is_bad_gateway(&self) -> bool {
        matches!(self, CatalogError::Status { status, .. } if *status == StatusCode::BAD_GATEWAY)
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// The parts of the catalog fixity verification needs.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_file(&self, id: i64) -> CatalogResult<GenericFile>;
    async fn save_event(&self, event: &PremisEvent) -> CatalogResult<()>;
}

/// Connection settings for the registry admin API.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
    pub api_version: String,
    pub api_user: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// HTTP client for the registry admin API.
///
/// Holds one pooled `reqwest::Client`, so a single instance can be shared by
/// every concurrent check.
#[derive(Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    config: RegistryConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;
        Ok(Self { http, config })
    }

    fn url(&self, relative: &str) -> String {
        format!(
            "{}/admin-api/{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            relative
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header(header::ACCEPT, "application/json")
            .header("X-Pharos-API-User", &self.config.api_user)
            .header("X-Pharos-API-Key", &self.config.api_key)
    }

    /// Turn a non-success response into a `CatalogError`.
    async fn check_status(
        resp: reqwest::Response,
        endpoint: &str,
        resource: impl FnOnce() -> String,
    ) -> CatalogResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(resource()));
        }
        let body = resp
            .text()
            .await
            .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
        Err(CatalogError::Status {
            endpoint: endpoint.to_string(),
            status,
            body,
        })
    }
}

#[async_trait]
impl Catalog for RegistryClient {
    async fn get_file(&self, id: i64) -> CatalogResult<GenericFile> {
        let endpoint = self.url(&format!("/files/show/{}", id));
        debug!("GET {}", endpoint);
        let http_err = |source: reqwest::Error| CatalogError::Http {
            endpoint: endpoint.clone(),
            source,
        };

        let resp = self
            .request(reqwest::Method::GET, &endpoint)
            .send()
            .await
            .map_err(http_err)?;
        let resp = Self::check_status(resp, &endpoint, || format!("file {}", id)).await?;
        resp.json::<GenericFile>().await.map_err(http_err)
    }

    async fn save_event(&self, event: &PremisEvent) -> CatalogResult<()> {
        let endpoint = self.url("/events/");
        debug!("POST {} for {}", endpoint, event.generic_file_identifier);

        let resp = self
            .request(reqwest::Method::POST, &endpoint)
            .json(event)
            .send()
            .await
            .map_err(|source| CatalogError::Http {
                endpoint: endpoint.clone(),
                source,
            })?;
        Self::check_status(resp, &endpoint, || format!("event {}", event.identifier)).await?;
        Ok(())
    }
}
