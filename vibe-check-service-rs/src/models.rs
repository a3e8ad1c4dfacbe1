//! Request, stage and response types of a vibe check

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, VibeCheckError, MISSING_FIELDS_MESSAGE};

/// Inbound request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VibeCheckRequest {
    pub image_base64: String,
    pub user_id: String,
}

impl VibeCheckRequest {
    pub fn new(image_base64: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            image_base64: image_base64.into(),
            user_id: user_id.into(),
        }
    }

    /// Extract a request from an arbitrary JSON body.
    ///
    /// Absent, non-string and blank fields are all reported as missing.
    pub fn from_json(body: &Value) -> Result<Self> {
        let field = |name: &str| {
            body.get(name)
                .and_then(Value::as_str)
                .filter(|value| !value.trim().is_empty())
                .map(str::to_string)
        };

        match (field("imageBase64"), field("userId")) {
            (Some(image_base64), Some(user_id)) => Ok(Self { image_base64, user_id }),
            _ => Err(VibeCheckError::validation(MISSING_FIELDS_MESSAGE)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_base64.trim().is_empty() || self.user_id.trim().is_empty() {
            return Err(VibeCheckError::validation(MISSING_FIELDS_MESSAGE));
        }
        Ok(())
    }
}

/// Structured output of the vision stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisionAnalysis {
    pub body_language: String,
    pub mood: String,
    pub behavior: String,

    /// Always within [0, 1]
    pub confidence: f64,
}

/// One retrieved knowledge-base passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeMatch {
    pub content: String,
    pub score: f32,

    /// Attribution URL; may be empty when the passage has none
    pub source: String,
}

/// Output of the retrieval stage, ordered by descending score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeSet {
    pub matches: Vec<KnowledgeMatch>,

    /// Why retrieval fell back to an empty set, if it did
    pub degraded: Option<String>,
}

impl KnowledgeSet {
    pub fn new(matches: Vec<KnowledgeMatch>) -> Self {
        Self {
            matches,
            degraded: None,
        }
    }

    /// Empty set recording why retrieval was skipped
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            matches: Vec::new(),
            degraded: Some(reason.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn contents(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.content.as_str()).collect()
    }

    pub fn scores(&self) -> Vec<f32> {
        self.matches.iter().map(|m| m.score).collect()
    }

    /// Non-empty sources in rank order, without duplicates
    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for source in self.matches.iter().map(|m| m.source.trim()) {
            if !source.is_empty() && !sources.contains(&source) {
                sources.push(source);
            }
        }
        sources
    }

    /// Attribution of the best-ranked passage that has one
    pub fn first_source(&self) -> Option<&str> {
        self.sources().into_iter().next()
    }
}

// Diagnostics shape: parallel arrays, as the knowledge set is logged and traced
impl Serialize for KnowledgeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = if self.degraded.is_some() { 4 } else { 3 };
        let mut state = serializer.serialize_struct("KnowledgeSet", fields)?;
        state.serialize_field("content", &self.contents())?;
        state.serialize_field("scores", &self.scores())?;
        state.serialize_field(
            "sources",
            &self.matches.iter().map(|m| m.source.as_str()).collect::<Vec<_>>(),
        )?;
        if let Some(ref reason) = self.degraded {
            state.serialize_field("degraded", reason)?;
        }
        state.end()
    }
}

/// Output of the generation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedReport {
    pub short_summary: String,

    /// Normalised markdown
    pub detailed_report: String,
}

/// Successful response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibeCheckResponse {
    pub short_summary: String,
    pub detailed_report: String,

    #[serde(rename = "sourceUrl")]
    pub source_url: String,

    pub confidence: f64,
    pub analysis: VisionAnalysis,
}
