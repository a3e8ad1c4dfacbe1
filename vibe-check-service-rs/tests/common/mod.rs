//! Fake providers shared by the integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use vibe_check::providers::{Embedder, TextGenerator, VectorIndex, VisionModel};
use vibe_check::report::REQUIRED_SECTIONS;
use vibe_check::{VibeCheckConfig, VibeCheckPipeline};
use vibe_sdk::pinecone::ScoredVector;
use vibe_sdk::ServiceError;

pub const PLACEHOLDER_URL: &str = "https://placeholder.example/dog-behavior";

pub fn test_config() -> VibeCheckConfig {
    VibeCheckConfig {
        placeholder_source_url: PLACEHOLDER_URL.to_string(),
        stage_timeout_seconds: 2,
        ..VibeCheckConfig::default()
    }
}

pub fn happy_analysis_json() -> String {
    json!({
        "bodyLanguage": "tail wagging",
        "mood": "happy",
        "behavior": "playful",
        "confidence": 0.9
    })
    .to_string()
}

pub fn complete_report_json() -> String {
    let report = REQUIRED_SECTIONS
        .iter()
        .map(|section| format!("## {}\\n\\nThis pup looks relaxed and social.", section))
        .collect::<Vec<_>>()
        .join("\\n\\n");
    json!({
        "short_summary": "This happy pup is ready for zoomies and belly rubs",
        "detailed_report": report,
    })
    .to_string()
}

/// PNG of pseudo-random pixels; noise keeps it from compressing well
pub fn noise_png(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x9e37_79b9;
    let noise = RgbImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    let mut png = Vec::new();
    DynamicImage::ImageRgb8(noise)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .unwrap();
    png
}

/// Replies with a fixed result and records every image URL it saw
pub struct FakeVision {
    reply: Result<String, String>,
    pub calls: AtomicUsize,
    pub seen_urls: Mutex<Vec<String>>,
}

impl FakeVision {
    pub fn replying(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.into()),
            calls: AtomicUsize::new(0),
            seen_urls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.into()),
            calls: AtomicUsize::new(0),
            seen_urls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl VisionModel for FakeVision {
    async fn describe_image(&self, _prompt: &str, image_url: &str) -> vibe_sdk::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_urls.lock().unwrap().push(image_url.to_string());
        self.reply.clone().map_err(ServiceError::service)
    }
}

/// Replies with a fixed result and records every prompt it saw
pub struct FakeGenerator {
    reply: Result<String, String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn replying(reply: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> vibe_sdk::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(ServiceError::service)
    }
}

pub struct FakeEmbedder {
    fail: bool,
}

impl FakeEmbedder {
    pub fn working() -> Arc<Self> {
        Arc::new(Self { fail: false })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true })
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, _text: &str) -> vibe_sdk::Result<Vec<f32>> {
        if self.fail {
            return Err(ServiceError::network("Connection error: embeddings unreachable"));
        }
        Ok(vec![0.1, 0.2, 0.3])
    }
}

pub struct FakeIndex {
    matches: Vec<ScoredVector>,
}

impl FakeIndex {
    pub fn empty() -> Arc<Self> {
        Arc::new(Self { matches: Vec::new() })
    }

    /// One passage per `(content, source, score)`
    pub fn with_passages(passages: &[(&str, &str, f32)]) -> Arc<Self> {
        let matches = passages
            .iter()
            .enumerate()
            .map(|(i, (content, source, score))| ScoredVector {
                id: format!("passage-{}", i),
                score: *score,
                metadata: json!({"content": content, "source": source}).as_object().cloned(),
            })
            .collect();
        Arc::new(Self { matches })
    }
}

#[async_trait]
impl VectorIndex for FakeIndex {
    async fn query(&self, _vector: Vec<f32>, _top_k: u32) -> vibe_sdk::Result<Vec<ScoredVector>> {
        Ok(self.matches.clone())
    }
}

pub fn pipeline(
    vision: Arc<FakeVision>,
    generator: Arc<FakeGenerator>,
    embedder: Arc<FakeEmbedder>,
    index: Arc<FakeIndex>,
) -> VibeCheckPipeline {
    VibeCheckPipeline::new(vision, generator, embedder, index, &test_config())
}

/// Pipeline where every stage succeeds and retrieval finds nothing
pub fn happy_pipeline() -> VibeCheckPipeline {
    pipeline(
        FakeVision::replying(happy_analysis_json()),
        FakeGenerator::replying(complete_report_json()),
        FakeEmbedder::working(),
        FakeIndex::empty(),
    )
}
