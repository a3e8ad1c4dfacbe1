//! Pipeline error taxonomy and its HTTP envelope

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use vibe_sdk::ServiceError;

/// Message returned when `imageBase64` or `userId` is absent or empty
pub const MISSING_FIELDS_MESSAGE: &str = "Missing required fields: imageBase64, userId";

/// Top-level message of every pipeline failure envelope
pub const PIPELINE_FAILED_MESSAGE: &str = "Check Vibe RAG failed";

pub type Result<T> = std::result::Result<T, VibeCheckError>;

/// Errors that end a vibe check request
#[derive(Debug, Error)]
pub enum VibeCheckError {
    /// Missing or malformed request fields
    #[error("{0}")]
    Validation(String),

    /// Vision stage call failure or unparsable analysis
    #[error("Vision analysis failed: {0}")]
    VisionAnalysis(String),

    /// Generation stage call failure, unparsable or incomplete report
    #[error("Report generation failed: {0}")]
    ReportGeneration(String),

    /// Unexpected failure from an external service outside a stage
    #[error("Upstream service error: {0}")]
    UpstreamService(#[from] ServiceError),
}

impl VibeCheckError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn vision(message: impl Into<String>) -> Self {
        Self::VisionAnalysis(message.into())
    }

    pub fn report(message: impl Into<String>) -> Self {
        Self::ReportGeneration(message.into())
    }

    /// Pipeline stage the error originated from, if any
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            Self::VisionAnalysis(_) => Some("vision"),
            Self::ReportGeneration(_) => Some("generation"),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to HTTP status code and error envelope
    pub fn to_response(&self) -> (StatusCode, Json<ErrorResponse>) {
        let body = match self {
            Self::Validation(message) => ErrorResponse::new(message.clone()),
            other => ErrorResponse::new(PIPELINE_FAILED_MESSAGE).with_details(other.to_string()),
        };
        (self.status_code(), Json(body))
    }
}

impl IntoResponse for VibeCheckError {
    fn into_response(self) -> Response {
        self.to_response().into_response()
    }
}

/// Error envelope returned to callers
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let (status, Json(body)) = VibeCheckError::validation(MISSING_FIELDS_MESSAGE).to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, MISSING_FIELDS_MESSAGE);
        assert!(body.details.is_none());
    }

    #[test]
    fn test_stage_failures_share_one_envelope() {
        let err = VibeCheckError::vision("model call timed out after 30s");
        assert_eq!(err.stage(), Some("vision"));

        let (status, Json(body)) = err.to_response();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, PIPELINE_FAILED_MESSAGE);
        assert_eq!(
            body.details.as_deref(),
            Some("Vision analysis failed: model call timed out after 30s")
        );

        let err = VibeCheckError::from(ServiceError::configuration("OpenAI API key is required"));
        assert_eq!(err.stage(), None);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
