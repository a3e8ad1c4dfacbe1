//! Capabilities the pipeline stages depend on
//!
//! Each stage holds its collaborator as `Arc<dyn Trait>`; the SDK clients
//! implement these for production and tests substitute fakes.

use std::sync::Arc;

use async_trait::async_trait;
use vibe_sdk::openai::{ChatCompletionRequest, ChatMessage, OpenAIClient, ResponseFormat};
use vibe_sdk::pinecone::{PineconeClient, ScoredVector};
use vibe_sdk::Result;

/// Given a prompt and an image URL, return completion text
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn describe_image(&self, prompt: &str, image_url: &str) -> Result<String>;
}

/// Given system and user prompts, return completion text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Given text, return its embedding vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Given a vector, return the `top_k` nearest neighbours with metadata
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, vector: Vec<f32>, top_k: u32) -> Result<Vec<ScoredVector>>;
}

/// Multimodal chat completion in JSON mode
pub struct OpenAIVision {
    client: Arc<OpenAIClient>,
    model: String,
    max_tokens: u32,
}

impl OpenAIVision {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
        }
    }
}

#[async_trait]
impl VisionModel for OpenAIVision {
    async fn describe_image(&self, prompt: &str, image_url: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user_with_image(prompt, image_url)],
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat::json_object()),
            ..Default::default()
        };
        self.client.complete(request).await
    }
}

/// Text chat completion in JSON mode
pub struct OpenAIGenerator {
    client: Arc<OpenAIClient>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIGenerator {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens,
            temperature,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat::json_object()),
            ..Default::default()
        };
        self.client.complete(request).await
    }
}

pub struct OpenAIEmbedder {
    client: Arc<OpenAIClient>,
    model: String,
}

impl OpenAIEmbedder {
    pub fn new(client: Arc<OpenAIClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed_text(text, &self.model).await
    }
}

#[async_trait]
impl VectorIndex for PineconeClient {
    async fn query(&self, vector: Vec<f32>, top_k: u32) -> Result<Vec<ScoredVector>> {
        Ok(self.query_vector(vector, top_k).await?.matches)
    }
}
