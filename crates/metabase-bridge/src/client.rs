//! Client for the Metabase dataset API
//!
//! Sends one native query per call to `POST {host}/api/dataset` and turns the
//! response into a [`QueryOutcome`]. No retries: a failed call is reported
//! and the caller decides what to do.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use tracing::{debug, info};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, ConfigError};
use crate::query::{NativeDatasetQuery, QueryOutcome};

/// Something that can execute a native dataset query
///
/// The bridge talks to Metabase through this trait so that handlers can be
/// exercised against other backends.
#[async_trait]
pub trait DatasetBackend: Send + Sync {
    /// Database every query is sent to
    fn database_id(&self) -> i64;

    /// Execute `query` and return whatever came back
    async fn execute(&self, query: NativeDatasetQuery) -> Result<QueryOutcome, BridgeError>;
}

/// HTTP client bound to one Metabase instance
#[derive(Debug, Clone)]
pub struct MetabaseClient {
    http: reqwest::Client,
    config: Arc<BridgeConfig>,
    auth_value: HeaderValue,
}

impl MetabaseClient {
    /// Create a client; the configured timeout covers the whole exchange
    pub fn new(config: BridgeConfig) -> Result<Self, ConfigError> {
        let auth_value = config.auth_header_value()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("metabase-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            config: Arc::new(config),
            auth_value,
        })
    }

    /// The configuration this client was built from
    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Send `query` to Metabase
    pub async fn run_native_query(
        &self,
        query: NativeDatasetQuery,
    ) -> Result<QueryOutcome, BridgeError> {
        let body = serde_json::to_vec(&query)
            .map_err(|e| BridgeError::serialization("create query JSON", e))?;

        let url = self.config.dataset_url();
        info!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(self.config.auth_header.clone(), self.auth_value.clone())
            .body(body)
            .send()
            .await
            .map_err(|e| BridgeError::transport(&e))?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| BridgeError::read(&e))?;
        debug!("Metabase answered {} with {} bytes", status, bytes.len());

        Ok(QueryOutcome::from_response(
            status.as_u16(),
            status.to_string(),
            &bytes,
            query,
        ))
    }
}

#[async_trait]
impl DatasetBackend for MetabaseClient {
    fn database_id(&self) -> i64 {
        self.config.database_id
    }

    async fn execute(&self, query: NativeDatasetQuery) -> Result<QueryOutcome, BridgeError> {
        self.run_native_query(query).await
    }
}
