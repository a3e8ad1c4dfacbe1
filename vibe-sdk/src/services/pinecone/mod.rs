//! Pinecone vector index client
//!
//! Covers the data-plane calls the pipeline needs: similarity queries and
//! index stats for health checks.

mod models;
pub use models::*;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::{PineconeConfig, ServiceConfig, DEFAULT_PROVIDER};
use crate::core::{ClientMetrics, ServiceClient};
use crate::error::{Result, ServiceError};
use crate::resilience::{CircuitBreakerConfig, Resilience, RetryConfig};
use crate::services::common::{build_http_client, send_json, UserAgent};

const SERVICE_NAME: &str = "pinecone";

/// Pinecone index client
pub struct PineconeClient {
    http_client: Client,
    config: PineconeConfig,
    base_url: String,
    resilience: Resilience,
    metrics: ClientMetrics,
}

impl PineconeClient {
    pub fn new_with_config(config: PineconeConfig) -> Result<Self> {
        config.validate()?;

        let http_client = build_http_client(
            Some(UserAgent::for_client("Pinecone-Client")),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        let resilience = Resilience::new(
            RetryConfig {
                max_retries: 2,
                initial_interval: Duration::from_millis(200),
                max_interval: Duration::from_secs(2),
                ..RetryConfig::default()
            },
            CircuitBreakerConfig::default(),
        );

        Ok(Self {
            base_url: config.base_url(),
            http_client,
            config,
            resilience,
            metrics: ClientMetrics::new(),
        })
    }

    pub fn builder() -> PineconeClientBuilder {
        PineconeClientBuilder::default()
    }

    /// Namespace configured for this client, if any
    pub fn namespace(&self) -> Option<&str> {
        self.config.namespace.as_deref()
    }

    /// Run a similarity query
    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse> {
        if request.vector.is_empty() {
            return Err(ServiceError::validation("Query vector must not be empty"));
        }
        if request.top_k == 0 {
            return Err(ServiceError::validation("topK must be at least 1"));
        }

        let url = format!("{}/query", self.base_url);
        debug!(
            "Querying Pinecone: POST {} (topK={}, dim={})",
            url,
            request.top_k,
            request.vector.len()
        );

        self.resilience
            .execute(|| {
                let builder = self.authorized(self.http_client.post(&url)).json(&request);
                self.timed("query", builder)
            })
            .await
    }

    /// Query the configured namespace for the `top_k` nearest neighbours,
    /// including metadata
    pub async fn query_vector(&self, vector: Vec<f32>, top_k: u32) -> Result<QueryResponse> {
        self.query(QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace: self.config.namespace.clone(),
            filter: None,
        })
        .await
    }

    /// Fetch index statistics
    pub async fn describe_index_stats(&self) -> Result<IndexStats> {
        let url = format!("{}/describe_index_stats", self.base_url);
        self.resilience
            .execute(|| self.timed("describe_index_stats", self.authorized(self.http_client.get(&url))))
            .await
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Api-Key", &self.config.api_key)
            .header("X-Pinecone-API-Version", &self.config.api_version)
    }

    async fn timed<R>(&self, endpoint: &str, request: reqwest::RequestBuilder) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let start = Instant::now();
        match send_json::<R>(SERVICE_NAME, endpoint, request).await {
            Ok((body, status)) => {
                self.metrics
                    .record_request(endpoint, status, start.elapsed().as_millis() as u64);
                Ok(body)
            }
            Err(err) => {
                self.metrics.record_error(endpoint);
                Err(err)
            }
        }
    }
}

#[async_trait]
impl ServiceClient for PineconeClient {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn health_check(&self) -> Result<bool> {
        match self.describe_index_stats().await {
            Ok(stats) => {
                debug!(
                    "Pinecone index healthy: dimension={}, vectors={}",
                    stats.dimension, stats.total_vector_count
                );
                Ok(true)
            }
            Err(e) => {
                warn!("Pinecone health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn metrics(&self) -> HashMap<String, String> {
        let mut metrics = self.metrics.snapshot();
        metrics.insert(
            "circuit_breaker".to_string(),
            self.resilience.circuit_breaker_status().to_string(),
        );
        metrics
    }
}

/// Builder for the Pinecone client
#[derive(Default)]
pub struct PineconeClientBuilder {
    config: Option<PineconeConfig>,
    api_key: Option<String>,
    index_host: Option<String>,
    namespace: Option<String>,
    timeout_seconds: Option<u64>,
    retry_config: Option<RetryConfig>,
}

impl PineconeClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-loaded configuration instead of the environment
    pub fn config(mut self, config: PineconeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn index_host(mut self, host: impl Into<String>) -> Self {
        self.index_host = Some(host.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    pub fn build(self) -> Result<PineconeClient> {
        let mut config = match self.config {
            Some(config) => config,
            None => PineconeConfig::from_provider(&**DEFAULT_PROVIDER).unwrap_or_default(),
        };

        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }
        if let Some(host) = self.index_host {
            config.index_host = host;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = Some(namespace);
        }
        if let Some(timeout) = self.timeout_seconds {
            config.timeout_seconds = timeout;
        }

        let mut client = PineconeClient::new_with_config(config)?;
        if let Some(retry_config) = self.retry_config {
            client.resilience.configure_retry(retry_config);
        }

        Ok(client)
    }
}
