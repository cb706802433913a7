//! Provider traits for the external services the pipeline suspends on.

use serde::{Deserialize, Serialize};

/// Result type for service calls
pub type LlmResult<T> = Result<T, LlmError>;

/// Service error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("{service} timed out")]
    Timeout { service: String },

    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl LlmError {
    /// Transient failures are retried with bounded backoff; everything else
    /// (malformed output, bad credentials) falls back immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout { .. } | Self::ServiceUnavailable(_) => true,
            Self::NetworkError(e) => e.is_timeout() || e.is_connect(),
            Self::RequestFailed(_) | Self::AuthFailed(_) | Self::InvalidResponse(_) => false,
        }
    }
}

/// Token usage reported by a completion.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// A single non-streaming completion request.
#[derive(Clone, Debug)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// Completed response text plus usage.
#[derive(Clone, Debug)]
pub struct Completion {
    pub text: String,
    pub usage: Usage,
}

/// LLM completion service backing the analysis stages.
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> LlmResult<Completion>;
}

/// Embedding service: text in, vector out.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>>;
}

/// A scored neighbor from the reference corpus.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    pub score: f32,
}

/// Similarity store holding the baseline clause corpus.
#[async_trait::async_trait]
pub trait SimilarityStore: Send + Sync {
    async fn nearest_neighbors(
        &self,
        vector: &[f32],
        namespace: &str,
        k: usize,
    ) -> LlmResult<Vec<Neighbor>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LlmError::RateLimited { retry_after_ms: 500 }.is_transient());
        assert!(LlmError::Timeout { service: "llm".into() }.is_transient());
        assert!(LlmError::ServiceUnavailable("503".into()).is_transient());
        assert!(!LlmError::InvalidResponse("not json".into()).is_transient());
        assert!(!LlmError::AuthFailed("401".into()).is_transient());
        assert!(!LlmError::RequestFailed("400".into()).is_transient());
    }
}
