//! Vision stage: structured body-language analysis of the photo

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::timeout;

use crate::error::{Result, VibeCheckError};
use crate::json_repair::decode_llm_object;
use crate::models::VisionAnalysis;
use crate::providers::VisionModel;

pub const VISION_PROMPT: &str = "You are an expert in canine behavior and body language. \
Analyze the dog in this photo and respond with a JSON object containing exactly these four fields:\n\
- \"bodyLanguage\": what the dog's posture, tail, ears, eyes and mouth show\n\
- \"mood\": the dog's apparent mood in a few words\n\
- \"behavior\": what the dog appears to be doing\n\
- \"confidence\": a number between 0 and 1 for how confident you are in this reading\n\
Respond with the JSON object only.";

pub struct VisionAnalyzer {
    model: Arc<dyn VisionModel>,
    timeout: Duration,
}

impl VisionAnalyzer {
    pub fn new(model: Arc<dyn VisionModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Analyze a base64 JPEG (bare or as a `data:` URL)
    pub async fn analyze(&self, image_base64: &str) -> Result<VisionAnalysis> {
        let image_url = to_data_url(image_base64);

        let raw = match timeout(self.timeout, self.model.describe_image(VISION_PROMPT, &image_url)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(VibeCheckError::vision(format!("model call failed: {}", e))),
            Err(_) => {
                return Err(VibeCheckError::vision(format!(
                    "model call timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        parse_vision_analysis(&raw)
    }
}

/// Wrap bare base64 as a JPEG data URL; existing data URLs are kept
pub fn to_data_url(image_base64: &str) -> String {
    let trimmed = image_base64.trim();
    if trimmed.starts_with("data:") {
        trimmed.to_string()
    } else {
        format!("data:image/jpeg;base64,{}", trimmed)
    }
}

/// Decode and validate the model's analysis
pub fn parse_vision_analysis(raw: &str) -> Result<VisionAnalysis> {
    let object = decode_llm_object(raw)
        .map_err(|e| VibeCheckError::vision(format!("unparsable analysis: {}", e)))?;

    Ok(VisionAnalysis {
        body_language: required_text(&object, "bodyLanguage")?,
        mood: required_text(&object, "mood")?,
        behavior: required_text(&object, "behavior")?,
        confidence: confidence(&object)?,
    })
}

fn required_text(object: &Map<String, Value>, key: &str) -> Result<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .ok_or_else(|| VibeCheckError::vision(format!("analysis is missing \"{}\"", key)))
}

// Numeric strings are accepted; anything outside [0, 1] is rejected, not rescaled
fn confidence(object: &Map<String, Value>) -> Result<f64> {
    let value = match object.get("confidence") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match value {
        Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => Ok(c),
        Some(c) => Err(VibeCheckError::vision(format!("confidence {} is outside [0, 1]", c))),
        None => Err(VibeCheckError::vision("analysis has no numeric \"confidence\"")),
    }
}
