//! Error mapping for service-specific APIs
//!
//! Converts the error bodies returned by OpenAI and Pinecone into the
//! normalized ServiceError type.

use reqwest::StatusCode;
use serde_json::Value;

use super::{ErrorContext, ServiceError};

/// Map a status code and message to the matching error variant
fn error_for_status(status: StatusCode, message: impl Into<String>) -> ServiceError {
    let message = message.into();
    match status {
        StatusCode::UNAUTHORIZED => ServiceError::authentication(message),
        StatusCode::FORBIDDEN => ServiceError::authorization(message),
        StatusCode::TOO_MANY_REQUESTS => ServiceError::rate_limit(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::validation(message)
        }
        StatusCode::NOT_FOUND => ServiceError::not_found(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => ServiceError::timeout(message),
        s if s.is_server_error() => ServiceError::service(message),
        _ => ServiceError::validation(message),
    }
}

/// Map an OpenAI API error to a ServiceError
///
/// OpenAI wraps errors as `{"error": {"message", "type", "code"}}`.
pub fn map_openai_error(status: StatusCode, json: &Value, context: &mut ErrorContext) -> ServiceError {
    context.service = "openai".to_string();

    if let Some(error) = json.get("error") {
        if let Some(error_type) = error.get("type").and_then(|t| t.as_str()) {
            context.add("error_type", error_type);
        }

        if let Some(code) = error.get("code").and_then(|c| c.as_str()) {
            context.error_code = Some(code.to_string());
        }

        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown OpenAI error");

        return error_for_status(status, message);
    }

    let message = json
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("Unknown OpenAI error");
    error_for_status(status, message)
}

/// Map a Pinecone API error to a ServiceError
///
/// The data plane answers with `{"code": <int>, "message": "..."}` while the
/// control plane nests it as `{"error": {"code": "...", "message": "..."}}`.
pub fn map_pinecone_error(status: StatusCode, json: &Value, context: &mut ErrorContext) -> ServiceError {
    context.service = "pinecone".to_string();

    let (code, message) = match json.get("error") {
        Some(error) => (
            error.get("code").map(value_to_code),
            error.get("message").and_then(|m| m.as_str()),
        ),
        None => (
            json.get("code").map(value_to_code),
            json.get("message").and_then(|m| m.as_str()),
        ),
    };

    if let Some(code) = code {
        context.error_code = Some(code);
    }

    error_for_status(status, message.unwrap_or("Unknown Pinecone error"))
}

fn value_to_code(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Map a generic HTTP error to a ServiceError
pub fn map_http_error(status: StatusCode, body: &str, context: &mut ErrorContext) -> ServiceError {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        match context.service.as_str() {
            "openai" => return map_openai_error(status, &json, context),
            "pinecone" => return map_pinecone_error(status, &json, context),
            _ => {
                let message = json
                    .get("message")
                    .or_else(|| json.get("error"))
                    .and_then(|m| m.as_str())
                    .unwrap_or(body);
                return error_for_status(status, message);
            }
        }
    }

    // Body was not JSON: fall back to the status line plus a body excerpt
    let message = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, crate::util::truncate_string(body, 100))
    };

    error_for_status(status, message)
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}
