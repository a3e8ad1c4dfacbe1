//! Service configuration
//!
//! Pipeline settings are read through the SDK's `ConfigProvider`, so the
//! binary loads them from `VIBE_*` environment variables and tests from
//! memory. The bind address follows the `<SERVICE>_SERVICE_ADDR` /
//! `<SERVICE>_SERVICE_PORT` convention.

use std::net::SocketAddr;
use std::time::Duration;

use vibe_sdk::config::{ConfigProvider, ConfigProviderExt, ServiceConfig};
use vibe_sdk::{Result, ServiceError};

use crate::image_prep::PreprocessOptions;

pub const SERVICE_NAME: &str = "vibe-check";

/// Port used when neither address nor port is configured
pub const DEFAULT_PORT: u16 = 8000;

pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4o";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_PLACEHOLDER_SOURCE_URL: &str = "https://www.akc.org/expert-advice/training/";

/// Settings for the pipeline and its HTTP surface
#[derive(Debug, Clone)]
pub struct VibeCheckConfig {
    pub vision_model: String,
    pub generation_model: String,
    pub embedding_model: String,

    pub vision_max_tokens: u32,
    pub generation_max_tokens: u32,
    pub generation_temperature: f32,

    /// Number of knowledge passages to retrieve
    pub retrieval_top_k: u32,

    /// Bound on every external call made by a stage
    pub stage_timeout_seconds: u64,

    /// `sourceUrl` reported when retrieval yields no attribution
    pub placeholder_source_url: String,

    /// Inbound images decoding to more than `preprocess.max_bytes` are recompressed
    pub preprocess: PreprocessOptions,

    pub max_body_bytes: usize,
}

impl Default for VibeCheckConfig {
    fn default() -> Self {
        Self {
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            vision_max_tokens: 500,
            generation_max_tokens: 1500,
            generation_temperature: 0.7,
            retrieval_top_k: 5,
            stage_timeout_seconds: 30,
            placeholder_source_url: DEFAULT_PLACEHOLDER_SOURCE_URL.to_string(),
            preprocess: PreprocessOptions::default(),
            max_body_bytes: 15 * 1024 * 1024,
        }
    }
}

impl VibeCheckConfig {
    /// Load configuration from a config provider, defaulting absent keys
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P) -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            vision_model: provider.get_string_or("vision_model", &defaults.vision_model),
            generation_model: provider.get_string_or("generation_model", &defaults.generation_model),
            embedding_model: provider.get_string_or("embedding_model", &defaults.embedding_model),
            vision_max_tokens: provider.get_or("vision_max_tokens", defaults.vision_max_tokens)?,
            generation_max_tokens: provider.get_or("generation_max_tokens", defaults.generation_max_tokens)?,
            generation_temperature: provider.get_or("generation_temperature", defaults.generation_temperature)?,
            retrieval_top_k: provider.get_or("retrieval_top_k", defaults.retrieval_top_k)?,
            stage_timeout_seconds: provider.get_or("stage_timeout_seconds", defaults.stage_timeout_seconds)?,
            placeholder_source_url: provider
                .get_string_or("placeholder_source_url", &defaults.placeholder_source_url),
            preprocess: PreprocessOptions {
                max_bytes: provider.get_or("max_image_bytes", defaults.preprocess.max_bytes)?,
                ..defaults.preprocess
            },
            max_body_bytes: provider.get_or("max_body_bytes", defaults.max_body_bytes)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_seconds)
    }
}

impl ServiceConfig for VibeCheckConfig {
    fn validate(&self) -> Result<()> {
        for (key, model) in [
            ("vision_model", &self.vision_model),
            ("generation_model", &self.generation_model),
            ("embedding_model", &self.embedding_model),
        ] {
            if model.trim().is_empty() {
                return Err(ServiceError::configuration(format!("{} must not be empty", key)));
            }
        }

        if self.retrieval_top_k == 0 {
            return Err(ServiceError::configuration("retrieval_top_k must be at least 1"));
        }

        if self.stage_timeout_seconds == 0 {
            return Err(ServiceError::configuration("stage_timeout_seconds must be positive"));
        }

        if !(0.0..=2.0).contains(&self.generation_temperature) {
            return Err(ServiceError::configuration("generation_temperature must be within [0, 2]"));
        }

        if self.placeholder_source_url.trim().is_empty() {
            return Err(ServiceError::configuration("placeholder_source_url is required"));
        }

        if self.preprocess.max_bytes == 0 {
            return Err(ServiceError::configuration("max_image_bytes must be positive"));
        }

        if self.max_body_bytes < self.preprocess.max_bytes {
            return Err(ServiceError::configuration(
                "max_body_bytes must not be smaller than max_image_bytes",
            ));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        SERVICE_NAME
    }
}

fn service_key(suffix: &str) -> String {
    format!("{}_service_{}", SERVICE_NAME.replace('-', "_"), suffix)
}

/// Port from `vibe_check_service_port`, falling back to `default_port`
pub fn service_port<P: ConfigProvider + ?Sized>(provider: &P, default_port: u16) -> u16 {
    let key = service_key("port");
    provider.get_or(&key, default_port).unwrap_or_else(|_| {
        log::warn!("Invalid port in {}, using default {}", key, default_port);
        default_port
    })
}

/// Socket address to bind the HTTP server to.
///
/// `vibe_check_service_addr` may be `host:port` or `http://host:port`;
/// otherwise the service binds all interfaces on `service_port`.
pub fn bind_address<P: ConfigProvider + ?Sized>(provider: &P, default_port: u16) -> SocketAddr {
    let key = service_key("addr");

    if let Some(addr) = provider.get_optional(&key) {
        let trimmed = addr
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .trim_end_matches('/');
        match trimmed.parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", key),
        }
    }

    SocketAddr::from(([0, 0, 0, 0], service_port(provider, default_port)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vibe_sdk::config::MemoryConfigProvider;

    #[test]
    fn test_defaults_when_nothing_is_configured() {
        let config = VibeCheckConfig::from_provider(&MemoryConfigProvider::new()).unwrap();
        assert_eq!(config.vision_model, "gpt-4o");
        assert_eq!(config.embedding_model, "text-embedding-3-small");
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.stage_timeout(), Duration::from_secs(30));
        assert_eq!(config.preprocess.max_bytes, 2 * 1024 * 1024);
        assert_eq!(config.max_body_bytes, 15 * 1024 * 1024);
    }

    #[test]
    fn test_overrides_and_validation() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("retrieval_top_k", "3");
        provider.set("placeholder_source_url", "https://dogs.example/kb");
        provider.set("max_image_bytes", "1048576");

        let config = VibeCheckConfig::from_provider(&provider).unwrap();
        assert_eq!(config.retrieval_top_k, 3);
        assert_eq!(config.placeholder_source_url, "https://dogs.example/kb");
        assert_eq!(config.preprocess.max_bytes, 1024 * 1024);

        provider.set("retrieval_top_k", "0");
        assert!(VibeCheckConfig::from_provider(&provider).is_err());

        provider.set("retrieval_top_k", "many");
        assert!(VibeCheckConfig::from_provider(&provider).is_err());
    }

    #[test]
    fn test_bind_address_resolution() {
        let mut provider = MemoryConfigProvider::new();
        assert_eq!(bind_address(&provider, DEFAULT_PORT).to_string(), "0.0.0.0:8000");

        provider.set("vibe_check_service_port", "9100");
        assert_eq!(bind_address(&provider, DEFAULT_PORT).to_string(), "0.0.0.0:9100");

        provider.set("vibe_check_service_addr", "http://127.0.0.1:9200");
        assert_eq!(bind_address(&provider, DEFAULT_PORT).to_string(), "127.0.0.1:9200");

        provider.set("vibe_check_service_addr", "not an address");
        provider.set("vibe_check_service_port", "seventy");
        assert_eq!(bind_address(&provider, DEFAULT_PORT).to_string(), "0.0.0.0:8000");
    }
}
