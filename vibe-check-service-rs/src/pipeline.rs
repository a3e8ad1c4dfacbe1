//! Pipeline orchestration
//!
//! Runs the stages strictly in sequence:
//! `Received → Analyzing → Retrieving → Generating → Completed | Failed`.
//! A fatal stage error moves straight to `Failed`; no stage is re-entered.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use serde::Serialize;
use vibe_sdk::openai::OpenAIClient;
use vibe_sdk::pinecone::PineconeClient;
use vibe_sdk::util::generate_request_id;

use crate::config::VibeCheckConfig;
use crate::error::{Result, VibeCheckError};
use crate::image_prep::{estimated_decoded_len, prepare_image_base64, PreprocessOptions};
use crate::models::{VibeCheckRequest, VibeCheckResponse};
use crate::providers::{
    Embedder, OpenAIEmbedder, OpenAIGenerator, OpenAIVision, TextGenerator, VectorIndex, VisionModel,
};
use crate::report::ReportGenerator;
use crate::retrieval::KnowledgeRetriever;
use crate::vision::VisionAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Received,
    Analyzing,
    Retrieving,
    Generating,
    Completed,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "Received",
            Self::Analyzing => "Analyzing",
            Self::Retrieving => "Retrieving",
            Self::Generating => "Generating",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTransition {
    pub stage: PipelineStage,

    /// Milliseconds since the request was received
    pub elapsed_ms: u64,
}

/// Stage history of one request
#[derive(Debug, Clone, Serialize)]
pub struct PipelineTrace {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    pub transitions: Vec<StageTransition>,

    #[serde(skip)]
    clock: Instant,
}

impl PipelineTrace {
    fn new(request_id: String) -> Self {
        Self {
            request_id,
            started_at: Utc::now(),
            transitions: Vec::new(),
            clock: Instant::now(),
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        let elapsed_ms = self.clock.elapsed().as_millis() as u64;
        info!("[{}] {} (+{}ms)", self.request_id, stage, elapsed_ms);
        self.transitions.push(StageTransition { stage, elapsed_ms });
    }

    fn fail(&mut self, err: &VibeCheckError) {
        error!("[{}] stage failed: {}", self.request_id, err);
        self.enter(PipelineStage::Failed);
    }

    pub fn stages(&self) -> Vec<PipelineStage> {
        self.transitions.iter().map(|t| t.stage).collect()
    }

    /// Last stage reached, if the request got past validation
    pub fn final_stage(&self) -> Option<PipelineStage> {
        self.transitions.last().map(|t| t.stage)
    }
}

/// The vibe check pipeline. Immutable and shared across requests.
pub struct VibeCheckPipeline {
    vision: VisionAnalyzer,
    retriever: KnowledgeRetriever,
    reporter: ReportGenerator,
    placeholder_source_url: String,
    preprocess: PreprocessOptions,
}

impl VibeCheckPipeline {
    pub fn new(
        vision_model: Arc<dyn VisionModel>,
        text_generator: Arc<dyn TextGenerator>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        config: &VibeCheckConfig,
    ) -> Self {
        let stage_timeout = config.stage_timeout();
        Self {
            vision: VisionAnalyzer::new(vision_model, stage_timeout),
            retriever: KnowledgeRetriever::new(embedder, index, config.retrieval_top_k, stage_timeout),
            reporter: ReportGenerator::new(text_generator, stage_timeout),
            placeholder_source_url: config.placeholder_source_url.clone(),
            preprocess: config.preprocess,
        }
    }

    /// Wire the pipeline to the OpenAI and Pinecone SDK clients
    pub fn from_clients(openai: Arc<OpenAIClient>, pinecone: Arc<PineconeClient>, config: &VibeCheckConfig) -> Self {
        Self::new(
            Arc::new(OpenAIVision::new(openai.clone(), &config.vision_model, config.vision_max_tokens)),
            Arc::new(OpenAIGenerator::new(
                openai.clone(),
                &config.generation_model,
                config.generation_max_tokens,
                config.generation_temperature,
            )),
            Arc::new(OpenAIEmbedder::new(openai, &config.embedding_model)),
            pinecone,
            config,
        )
    }

    pub async fn run(&self, request: &VibeCheckRequest) -> Result<VibeCheckResponse> {
        self.run_traced(request).await.0
    }

    /// Run the pipeline and return the stage trace alongside the result
    pub async fn run_traced(&self, request: &VibeCheckRequest) -> (Result<VibeCheckResponse>, PipelineTrace) {
        let mut trace = PipelineTrace::new(generate_request_id());

        if let Err(e) = request.validate() {
            return (Err(e), trace);
        }

        trace.enter(PipelineStage::Received);
        info!(
            "[{}] vibe check for user {} ({} byte image)",
            trace.request_id,
            request.user_id,
            estimated_decoded_len(&request.image_base64)
        );
        let image = self.inbound_image(&request.image_base64).await;

        trace.enter(PipelineStage::Analyzing);
        let analysis = match self.vision.analyze(&image).await {
            Ok(analysis) => analysis,
            Err(e) => {
                trace.fail(&e);
                return (Err(e), trace);
            }
        };

        trace.enter(PipelineStage::Retrieving);
        let knowledge = self.retriever.retrieve(&analysis).await;

        trace.enter(PipelineStage::Generating);
        let report = match self.reporter.generate(&analysis, &knowledge).await {
            Ok(report) => report,
            Err(e) => {
                trace.fail(&e);
                return (Err(e), trace);
            }
        };

        let source_url = knowledge
            .first_source()
            .unwrap_or(self.placeholder_source_url.as_str())
            .to_string();

        let response = VibeCheckResponse {
            short_summary: report.short_summary,
            detailed_report: report.detailed_report,
            source_url,
            confidence: analysis.confidence,
            analysis,
        };

        trace.enter(PipelineStage::Completed);
        (Ok(response), trace)
    }

    /// Images over the ceiling are recompressed on the blocking pool before analysis
    async fn inbound_image<'a>(&self, image_base64: &'a str) -> Cow<'a, str> {
        if estimated_decoded_len(image_base64) <= self.preprocess.max_bytes {
            return Cow::Borrowed(image_base64);
        }

        let encoded = image_base64.to_string();
        let options = self.preprocess;
        match tokio::task::spawn_blocking(move || prepare_image_base64(&encoded, &options)).await {
            Ok(prepared) if !prepared.degraded => Cow::Owned(prepared.base64),
            Ok(_) => Cow::Borrowed(image_base64),
            Err(e) => {
                warn!("Image preparation task failed, using original image: {}", e);
                Cow::Borrowed(image_base64)
            }
        }
    }
}
