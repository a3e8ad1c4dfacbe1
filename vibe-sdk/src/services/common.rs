//! Common utilities for service clients

use std::fmt;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::mapping::{is_retryable_status, map_http_error};
use crate::error::{ErrorContext, Result, ServiceError};
use crate::util::sanitize_for_logging;

/// UserAgent structure for identifying the client to upstream services
#[derive(Debug, Clone)]
pub struct UserAgent {
    pub app_name: String,
    pub version: String,
    pub extra: Option<String>,
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            app_name: "SnapDog-VibeCheck".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            extra: Some("vibe-sdk".to_string()),
        }
    }
}

impl UserAgent {
    /// Default user agent tagged with the calling client
    pub fn for_client(client: &str) -> Self {
        Self {
            extra: Some(format!("vibe-sdk; {}", client)),
            ..Self::default()
        }
    }
}

impl fmt::Display for UserAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_name, self.version)?;

        if let Some(ref extra) = self.extra {
            write!(f, " ({})", extra)?;
        }

        Ok(())
    }
}

/// Build a standard HTTP client with default settings
pub fn build_http_client(user_agent: Option<UserAgent>, timeout: Option<Duration>) -> Result<Client> {
    let mut headers = header::HeaderMap::new();
    let ua = user_agent.unwrap_or_default().to_string();

    headers.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&ua)
            .map_err(|e| ServiceError::configuration(format!("Invalid user agent: {}", e)))?,
    );

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(timeout.unwrap_or_else(|| Duration::from_secs(30)))
        .gzip(true)
        .build()
        .map_err(|e| ServiceError::configuration(format!("Failed to build HTTP client: {}", e)))
}

/// Turn a non-success HTTP response into a ServiceError
pub async fn parse_error_response(service_name: &str, endpoint: &str, response: reqwest::Response) -> ServiceError {
    let status = response.status();
    let mut context = ErrorContext::for_service(service_name)
        .status_code(status.as_u16())
        .endpoint(endpoint);

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("Failed to read error response: {}", e),
    };

    log::debug!(
        "{} {} returned {} (retryable: {}): {}",
        service_name,
        endpoint,
        status,
        is_retryable_status(status),
        sanitize_for_logging(&body)
    );

    let error = map_http_error(status, &body, &mut context);
    error.with_context(context)
}

/// Send a prepared request and decode a JSON body of type R
pub async fn send_json<R>(service_name: &str, endpoint: &str, request: RequestBuilder) -> Result<(R, u16)>
where
    R: DeserializeOwned,
{
    let response = request.send().await.map_err(|e| {
        let err = ServiceError::from(e);
        log::debug!("{} {} transport failure: {}", service_name, endpoint, err);
        err
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(parse_error_response(service_name, endpoint, response).await);
    }

    let body = response
        .json::<R>()
        .await
        .map_err(|e| ServiceError::parsing(format!("Failed to parse {} response: {}", service_name, e)))?;

    Ok((body, status.as_u16()))
}
