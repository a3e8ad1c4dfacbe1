//! Mock tests for the Pinecone client

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::core::ServiceClient;
    use crate::error::ServiceError;
    use crate::resilience::RetryConfig;
    use crate::services::pinecone::{PineconeClient, PineconeClientBuilder};

    fn create_test_client(mock_server: &MockServer) -> PineconeClient {
        PineconeClientBuilder::new()
            .api_key("pc_mock_key")
            .index_host(mock_server.uri())
            .namespace("dog-behavior")
            .timeout(5)
            .retry(RetryConfig {
                max_retries: 1,
                initial_interval: Duration::from_millis(5),
                max_interval: Duration::from_millis(10),
                ..RetryConfig::default()
            })
            .build()
            .expect("Failed to build Pinecone client")
    }

    #[tokio::test]
    async fn test_query_vector_sends_camel_case_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .and(header("Api-Key", "pc_mock_key"))
            .and(header("X-Pinecone-API-Version", "2024-07"))
            .and(body_json(json!({
                "vector": [0.5, 0.25],
                "topK": 3,
                "includeMetadata": true,
                "includeValues": false,
                "namespace": "dog-behavior"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [
                    {
                        "id": "play-bow",
                        "score": 0.91,
                        "metadata": {"content": "A play bow invites play.", "source": "https://vet.example/play"}
                    },
                    {"id": "bare", "score": 0.42}
                ],
                "namespace": "dog-behavior"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let response = client.query_vector(vec![0.5, 0.25], 3).await.unwrap();

        assert_eq!(response.matches.len(), 2);
        assert_eq!(response.matches[0].id, "play-bow");
        assert_eq!(
            response.matches[0].metadata_str(&["content", "text"]),
            Some("A play bow invites play.")
        );
        assert!(response.matches[1].metadata.is_none());
    }

    #[tokio::test]
    async fn test_query_rejects_empty_vector_without_calling_upstream() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let err = client.query_vector(Vec::new(), 5).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = client.query_vector(vec![1.0], 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_mapped_to_validation() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 3,
                "message": "Vector dimension 2 does not match the dimension of the index 1536",
                "details": []
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let err = client.query_vector(vec![0.1, 0.2], 5).await.unwrap_err();

        assert!(matches!(err.root(), ServiceError::Validation(_)));
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.error_code(), Some("3"));
        assert_eq!(err.service_name(), Some("pinecone"));
    }

    #[tokio::test]
    async fn test_health_check_uses_index_stats() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/describe_index_stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dimension": 1536,
                "indexFullness": 0.0,
                "totalVectorCount": 240,
                "namespaces": {"dog-behavior": {"vectorCount": 240}}
            })))
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server);
        let stats = client.describe_index_stats().await.unwrap();
        assert_eq!(stats.dimension, 1536);
        assert_eq!(stats.total_vector_count, 240);
        assert!(client.health_check().await.unwrap());
        assert_eq!(client.name(), "pinecone");
        assert_eq!(client.namespace(), Some("dog-behavior"));
    }

    #[test]
    fn test_builder_requires_index_host() {
        let result = PineconeClientBuilder::new()
            .config(crate::config::PineconeConfig {
                api_key: "k".to_string(),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(ServiceError::Configuration(_))));
    }
}
