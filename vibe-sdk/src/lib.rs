//! # Vibe SDK
//!
//! Typed clients for the hosted services behind the Vibe Check pipeline.
//!
//! This crate provides:
//!
//! - An OpenAI client for chat completions (text and image input) and embeddings
//! - A Pinecone client for vector index queries
//! - A normalized error system shared by every client
//! - Resilience patterns (retries with backoff, circuit breaker)
//! - Configuration providers backed by the environment or memory
//!
//! ## Architecture
//!
//! - `ServiceClient`: The base trait every external service client implements
//! - `Resilience`: Facade composing retry and circuit breaker
//! - `ServiceError`: Transport-level error taxonomy with HTTP mapping
//! - `ConfigProvider`: Key/value configuration lookup

pub mod core;
pub use core::ServiceClient;

pub mod services;
pub use services::{openai, pinecone};

pub mod error;
pub use error::{ErrorContext, Result, ServiceError};

pub mod resilience;
pub use resilience::{CircuitBreaker, Resilience, RetryExecutor};

pub mod config;
pub use config::{ConfigProvider, ServiceConfig};

pub mod util;

#[cfg(test)]
mod tests;

/// Create an OpenAI client builder seeded from the default provider
pub fn openai_client() -> services::openai::OpenAIClientBuilder {
    services::openai::OpenAIClient::builder()
}

/// Create a Pinecone client builder seeded from the default provider
pub fn pinecone_client() -> services::pinecone::PineconeClientBuilder {
    services::pinecone::PineconeClient::builder()
}
