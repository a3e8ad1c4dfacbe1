//! # Vibe Check
//!
//! A retrieval-augmented pipeline that reads a dog's mood from a photo:
//!
//! 1. **Vision**: a multimodal model describes body language, mood and
//!    behavior with a confidence score
//! 2. **Retrieval**: the description is embedded and matched against a
//!    canine-behavior knowledge base (fails open)
//! 3. **Generation**: a short summary and a sectioned markdown report are
//!    written from the analysis and the retrieved passages
//!
//! Stages depend on the capability traits in [`providers`], so the pipeline
//! can run against the SDK clients or against fakes.

use std::sync::Arc;

use vibe_sdk::config::{ConfigProvider, OpenAIConfig, PineconeConfig};
use vibe_sdk::openai::OpenAIClient;
use vibe_sdk::pinecone::PineconeClient;

pub mod config;
pub mod error;
pub mod image_prep;
pub mod json_repair;
pub mod models;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod retrieval;
pub mod server;
pub mod vision;

pub use config::VibeCheckConfig;
pub use error::{Result, VibeCheckError};
pub use models::{
    GeneratedReport, KnowledgeMatch, KnowledgeSet, VibeCheckRequest, VibeCheckResponse, VisionAnalysis,
};
pub use pipeline::{PipelineStage, PipelineTrace, VibeCheckPipeline};
pub use server::VibeCheckService;

/// Build the service from configuration, wiring the OpenAI and Pinecone clients
pub fn build_service<P: ConfigProvider + ?Sized>(provider: &P) -> Result<VibeCheckService> {
    let config = VibeCheckConfig::from_provider(provider)?;

    let openai = Arc::new(
        OpenAIClient::builder()
            .config(OpenAIConfig::from_provider(provider)?)
            .build()?,
    );
    let pinecone = Arc::new(
        PineconeClient::builder()
            .config(PineconeConfig::from_provider(provider)?)
            .build()?,
    );

    log::info!(
        "Pipeline models: vision={}, generation={}, embedding={}, top_k={}",
        config.vision_model,
        config.generation_model,
        config.embedding_model,
        config.retrieval_top_k
    );

    let pipeline = VibeCheckPipeline::from_clients(openai.clone(), pinecone.clone(), &config);
    Ok(VibeCheckService::new(pipeline, config.max_body_bytes)
        .with_dependency(openai)
        .with_dependency(pinecone))
}
