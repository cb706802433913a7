//! HTTP similarity-store client holding the baseline clause corpus

use crate::provider::{LlmError, LlmResult, Neighbor, SimilarityStore};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::error;

pub struct HttpSimilarityStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpSimilarityStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait::async_trait]
impl SimilarityStore for HttpSimilarityStore {
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        namespace: &str,
        k: usize,
    ) -> LlmResult<Vec<Neighbor>> {
        let body = QueryRequest {
            vector: vector.to_vec(),
            namespace: namespace.to_string(),
            top_k: k,
        };

        let mut req = self
            .client
            .post(format!("{}/query", self.base_url.trim_end_matches('/')))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Similarity store error {}: {}", status, error_text);

            return Err(match status.as_u16() {
                401 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 5_000 },
                408 | 500..=599 => LlmError::ServiceUnavailable(format!("{}: {}", status, error_text)),
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            });
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        Ok(parsed.matches)
    }
}

#[derive(Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    namespace: String,
    top_k: usize,
}

#[derive(Deserialize)]
struct QueryResponse {
    matches: Vec<Neighbor>,
}
