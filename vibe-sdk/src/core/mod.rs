//! Core abstractions for the SDK
//!
//! Every external service client implements `ServiceClient` so the service
//! layer can report health and per-client metrics uniformly.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// Base trait for all service clients
#[async_trait]
pub trait ServiceClient: Send + Sync {
    /// The client name/identifier
    fn name(&self) -> &str;

    /// The base URL for the service
    fn base_url(&self) -> &str;

    /// Health check for the service
    async fn health_check(&self) -> Result<bool>;

    /// Returns the client's metrics
    fn metrics(&self) -> HashMap<String, String>;
}

/// Request counters kept by each client
#[derive(Debug, Default)]
pub struct ClientMetrics {
    values: std::sync::Mutex<HashMap<String, u64>>,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request against an endpoint
    pub fn record_request(&self, endpoint: &str, status: u16, duration_ms: u64) {
        let Ok(mut values) = self.values.lock() else {
            return;
        };

        let endpoint_key = endpoint.replace('/', "_");
        *values.entry("request_count".to_string()).or_insert(0) += 1;

        let count = {
            let entry = values.entry(format!("{}_count", endpoint_key)).or_insert(0);
            *entry += 1;
            *entry
        };

        // Running average latency for this endpoint
        let avg_key = format!("{}_avg_ms", endpoint_key);
        let old_avg = values.get(&avg_key).copied().unwrap_or(0);
        let new_avg = (old_avg * (count - 1) + duration_ms) / count;
        values.insert(avg_key, new_avg);

        *values.entry(format!("status_{}", status)).or_insert(0) += 1;
    }

    /// Record a failed request against an endpoint
    pub fn record_error(&self, endpoint: &str) {
        let Ok(mut values) = self.values.lock() else {
            return;
        };

        *values.entry("error_count".to_string()).or_insert(0) += 1;
        *values
            .entry(format!("{}_errors", endpoint.replace('/', "_")))
            .or_insert(0) += 1;
    }

    /// Snapshot the counters as strings
    pub fn snapshot(&self) -> HashMap<String, String> {
        match self.values.lock() {
            Ok(values) => values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_string()))
                .collect(),
            Err(_) => HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_track_average_latency() {
        let metrics = ClientMetrics::new();
        metrics.record_request("chat/completions", 200, 100);
        metrics.record_request("chat/completions", 200, 300);
        metrics.record_error("embeddings");

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot["request_count"], "2");
        assert_eq!(snapshot["chat_completions_count"], "2");
        assert_eq!(snapshot["chat_completions_avg_ms"], "200");
        assert_eq!(snapshot["status_200"], "2");
        assert_eq!(snapshot["error_count"], "1");
        assert_eq!(snapshot["embeddings_errors"], "1");
    }
}
