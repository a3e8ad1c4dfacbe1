//! Pinecone data-plane models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Query request for `POST /query`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub vector: Vec<f32>,

    pub top_k: u32,

    pub include_metadata: bool,

    #[serde(default)]
    pub include_values: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Metadata filter expression
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
}

/// A single scored match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredVector {
    pub id: String,

    #[serde(default)]
    pub score: f32,

    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

impl ScoredVector {
    /// First string-valued metadata field among `keys`
    pub fn metadata_str(&self, keys: &[&str]) -> Option<&str> {
        let metadata = self.metadata.as_ref()?;
        keys.iter()
            .filter_map(|key| metadata.get(*key))
            .filter_map(|value| value.as_str())
            .find(|value| !value.trim().is_empty())
    }
}

/// Query response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub matches: Vec<ScoredVector>,

    #[serde(default)]
    pub namespace: String,
}

/// Response of `GET /describe_index_stats`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    #[serde(default)]
    pub dimension: u32,

    #[serde(default)]
    pub total_vector_count: u64,
}
