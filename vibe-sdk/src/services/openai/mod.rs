//! OpenAI API client implementation
//!
//! Strongly-typed client for the OpenAI API covering chat completions
//! (text and image input) and embeddings.

mod models;
pub use models::*;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::{OpenAIConfig, DEFAULT_PROVIDER};
use crate::core::{ClientMetrics, ServiceClient};
use crate::error::{Result, ServiceError};
use crate::resilience::{CircuitBreakerConfig, Resilience, RetryConfig};
use crate::services::common::{build_http_client, send_json, UserAgent};

const SERVICE_NAME: &str = "openai";

/// OpenAI API client
pub struct OpenAIClient {
    http_client: Client,
    config: OpenAIConfig,
    resilience: Resilience,
    metrics: ClientMetrics,
}

impl OpenAIClient {
    /// Create a new OpenAI client with custom configuration
    pub fn new_with_config(config: OpenAIConfig) -> Result<Self> {
        let http_client = build_http_client(
            Some(UserAgent::for_client("OpenAI-Client")),
            Some(Duration::from_secs(config.timeout_seconds)),
        )?;

        let resilience = Resilience::new(
            RetryConfig {
                max_retries: 2,
                initial_interval: Duration::from_millis(500),
                max_interval: Duration::from_secs(5),
                ..RetryConfig::default()
            },
            CircuitBreakerConfig {
                failure_threshold: 5,
                reset_timeout: Duration::from_secs(60),
                ..CircuitBreakerConfig::default()
            },
        );

        Ok(Self {
            http_client,
            config,
            resilience,
            metrics: ClientMetrics::new(),
        })
    }

    /// Create a new builder for the OpenAI client
    pub fn builder() -> OpenAIClientBuilder {
        OpenAIClientBuilder::default()
    }

    /// Send a chat completion request
    pub async fn chat_completion(&self, request: ChatCompletionRequest) -> Result<ChatCompletionResponse> {
        self.post_json("chat/completions", &request).await
    }

    /// Send a text embedding request
    pub async fn embeddings(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        self.post_json("embeddings", &request).await
    }

    /// List available models
    pub async fn list_models(&self) -> Result<ListModelsResponse> {
        let url = self.url("models");
        self.resilience
            .execute(|| self.timed("models", self.authorized(self.http_client.get(&url))))
            .await
    }

    /// Run a chat completion and return the text of the first choice
    pub async fn complete(&self, request: ChatCompletionRequest) -> Result<String> {
        let response = self.chat_completion(request).await?;

        match response.first_content() {
            Some(content) if !content.trim().is_empty() => Ok(content.to_string()),
            Some(_) => Err(ServiceError::parsing("Empty completion response")),
            None => Err(ServiceError::parsing("No completion choices returned")),
        }
    }

    /// Generate an embedding for a single text
    pub async fn embed_text(&self, text: &str, model: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: model.to_string(),
            input: EmbeddingInput::String(text.to_string()),
            encoding_format: None,
            user: None,
        };

        let response = self.embeddings(request).await?;
        response
            .data
            .into_iter()
            .next()
            .map(|embedding| embedding.embedding)
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| ServiceError::parsing("No embeddings returned"))
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.bearer_auth(&self.config.api_key);
        match self.config.org_id {
            Some(ref org) => builder.header("OpenAI-Organization", org),
            None => builder,
        }
    }

    async fn post_json<T, R>(&self, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(endpoint);
        let payload = serde_json::to_vec(body)
            .map_err(|e| ServiceError::validation(format!("Failed to serialize request: {}", e)))?;

        debug!("Sending request to OpenAI: POST {} ({} bytes)", url, payload.len());

        self.resilience
            .execute(|| {
                let request = self
                    .authorized(self.http_client.post(&url))
                    .header("Content-Type", "application/json")
                    .body(payload.clone());
                self.timed(endpoint, request)
            })
            .await
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
impl ServiceClient for OpenAIClient {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("OpenAI health check failed: {}", e);
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

/// Builder for OpenAI client
#[derive(Default)]
pub struct OpenAIClientBuilder {
    config: Option<OpenAIConfig>,
    api_key: Option<String>,
    org_id: Option<String>,
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    retry_config: Option<RetryConfig>,
    circuit_breaker_config: Option<CircuitBreakerConfig>,
}

impl OpenAIClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already-loaded configuration instead of the environment
    pub fn config(mut self, config: OpenAIConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the timeout in seconds
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry_config = Some(config);
        self
    }

    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker_config = Some(config);
        self
    }

    /// Build the OpenAI client
    pub fn build(self) -> Result<OpenAIClient> {
        let mut config = match self.config {
            Some(config) => config,
            None => OpenAIConfig::from_provider(&**DEFAULT_PROVIDER).unwrap_or_default(),
        };

        if let Some(api_key) = self.api_key {
            config.api_key = api_key;
        }

        if let Some(org_id) = self.org_id {
            config.org_id = Some(org_id);
        }

        if let Some(base_url) = self.base_url {
            config.base_url = base_url;
        }

        if let Some(timeout) = self.timeout_seconds {
            config.timeout_seconds = timeout;
        }

        crate::config::ServiceConfig::validate(&config)?;

        let mut client = OpenAIClient::new_with_config(config)?;

        if let Some(retry_config) = self.retry_config {
            client.resilience.configure_retry(retry_config);
        }

        if let Some(circuit_breaker_config) = self.circuit_breaker_config {
            client.resilience.configure_circuit_breaker(circuit_breaker_config);
        }

        Ok(client)
    }
}
