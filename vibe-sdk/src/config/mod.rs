//! Configuration management for service clients
//!
//! Loads and validates client configuration from the environment or from
//! in-memory maps, with composite fallback between providers.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::str::FromStr;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Environment prefix used by the default provider
pub const DEFAULT_ENV_PREFIX: &str = "VIBE";

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String>;
}

/// Extension methods for configuration providers
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a typed configuration value by parsing from string
    fn get<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        let value = self.get_string(key)?;
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ServiceError::configuration(format!("Invalid value for key {}: {}", key, e)))
    }

    /// Get a typed configuration value, falling back to a default when the
    /// key is absent. A present but unparsable value is still an error.
    fn get_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        <T as FromStr>::Err: std::fmt::Display,
    {
        match self.get_string(key) {
            Ok(_) => self.get(key),
            Err(_) => Ok(default),
        }
    }

    /// Get a boolean configuration value
    fn get_bool(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(true),
            "false" | "no" | "0" | "off" => Ok(false),
            _ => Err(ServiceError::configuration(format!(
                "Invalid boolean value for key {}: {}",
                key, value
            ))),
        }
    }

    /// Get a string configuration value with a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|_| default.to_string())
    }

    /// Get an optional, non-empty string value
    fn get_optional(&self, key: &str) -> Option<String> {
        self.get_string(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "OPENAI", "PINECONE")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    pub fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        if let Some(ref prefix) = self.prefix {
            env_key.push_str(prefix);
            env_key.push('_');
        }

        if let Some(ref namespace) = self.namespace {
            env_key.push_str(namespace);
            env_key.push('_');
        }

        env_key.push_str(&key.to_uppercase().replace(|c: char| !c.is_ascii_alphanumeric(), "_"));

        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        let env_key = self.format_key(key);

        env::var(&env_key).map_err(|e| match e {
            env::VarError::NotPresent => {
                ServiceError::configuration(format!("Environment variable not set: {}", env_key))
            }
            env::VarError::NotUnicode(_) => ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            )),
        })
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| ServiceError::configuration(format!("Configuration key not found: {}", key)))
    }
}

/// A composite config provider that tries multiple providers in order
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Builder-style variant of `add_provider`
    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn get_string(&self, key: &str) -> Result<String> {
        for provider in &self.providers {
            if let Ok(value) = provider.get_string(key) {
                return Ok(value);
            }
        }

        Err(ServiceError::configuration(format!(
            "Configuration key not found in any provider: {}",
            key
        )))
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new().with_prefix(DEFAULT_ENV_PREFIX)));

/// Trait for service-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Service name
    fn service_name(&self) -> &str;
}

/// Configuration for the OpenAI API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    pub api_key: String,

    /// Organization ID (optional)
    pub org_id: Option<String>,

    /// Base URL (can be changed for proxies)
    pub base_url: String,

    /// Timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            org_id: None,
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl OpenAIConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let config = Self {
            api_key: provider.get_string("openai_api_key")?,
            org_id: provider.get_optional("openai_org_id"),
            base_url: provider.get_string_or("openai_base_url", "https://api.openai.com/v1"),
            timeout_seconds: provider.get_or("openai_timeout_seconds", 30u64)?,
        };

        config.validate()?;
        Ok(config)
    }
}

impl ServiceConfig for OpenAIConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ServiceError::configuration("OpenAI API key is required"));
        }

        if self.base_url.is_empty() {
            return Err(ServiceError::configuration("OpenAI base URL is required"));
        }

        if self.timeout_seconds == 0 {
            return Err(ServiceError::configuration("OpenAI timeout must be positive"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "openai"
    }
}

/// Configuration for a Pinecone index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    pub api_key: String,

    /// Data-plane host of the index, e.g. `dog-behavior-abc123.svc.us-east1-gcp.pinecone.io`
    pub index_host: String,

    /// Namespace to query (optional)
    pub namespace: Option<String>,

    /// Value sent as `X-Pinecone-API-Version`
    pub api_version: String,

    /// Timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            index_host: String::new(),
            namespace: None,
            api_version: "2024-07".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl PineconeConfig {
    /// Load configuration from a config provider
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let config = Self {
            api_key: provider.get_string("pinecone_api_key")?,
            index_host: provider.get_string("pinecone_index_host")?,
            namespace: provider.get_optional("pinecone_namespace"),
            api_version: provider.get_string_or("pinecone_api_version", "2024-07"),
            timeout_seconds: provider.get_or("pinecone_timeout_seconds", 30u64)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Index host normalised to a base URL with scheme and no trailing slash
    pub fn base_url(&self) -> String {
        let host = self.index_host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{}", host)
        }
    }
}

impl ServiceConfig for PineconeConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(ServiceError::configuration("Pinecone API key is required"));
        }

        if self.index_host.trim().is_empty() {
            return Err(ServiceError::configuration("Pinecone index host is required"));
        }

        if self.timeout_seconds == 0 {
            return Err(ServiceError::configuration("Pinecone timeout must be positive"));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        "pinecone"
    }
}
