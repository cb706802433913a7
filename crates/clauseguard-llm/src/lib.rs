//! External service clients: LLM completion, embeddings, similarity store.
//!
//! Everything network-facing lives behind the traits in [`provider`] so the
//! analysis pipeline can be exercised with scripted fakes.

pub mod anthropic;
pub mod cosine;
pub mod embeddings;
pub mod provider;
pub mod store;

pub use anthropic::AnthropicProvider;
pub use cosine::cosine_sim;
pub use embeddings::HttpEmbeddingClient;
pub use provider::{
    Completion, CompletionProvider, CompletionRequest, EmbeddingProvider, LlmError, LlmResult,
    Neighbor, SimilarityStore, Usage,
};
pub use store::HttpSimilarityStore;
