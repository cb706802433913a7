//! Content-addressed analysis cache
//!
//! Keys hash the clause text, the resolved severity, and the pipeline
//! version, so identical inputs under the same configuration always hit the
//! same entry and writes are idempotent. The cache is strictly best-effort:
//! an unavailable store degrades to "always miss", never aborts analysis.

use chrono::{DateTime, Utc};
use clauseguard_core::types::{Severity, Stage};
use dashmap::DashMap;
use ring::digest::{digest, SHA256};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

impl From<CacheError> for clauseguard_core::Error {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Unavailable(message) => Self::CacheUnavailable(message),
        }
    }
}

/// The accepted explanation for one clause, as stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedAnalysis {
    pub explanation: String,
    pub consumer_impact: Option<String>,
    pub recommendation: Option<String>,
    pub confidence: f32,
    /// Which stage produced the accepted result.
    pub stage: Stage,
    pub stored_at: DateTime<Utc>,
}

/// Stable cache key: SHA-256 over clause text, severity, and pipeline
/// version, hex-encoded.
pub fn cache_key(clause_text: &str, severity: Severity, pipeline_version: &str) -> String {
    let mut input = Vec::with_capacity(clause_text.len() + 16);
    input.extend_from_slice(clause_text.as_bytes());
    input.push(0);
    input.extend_from_slice(severity.as_str().as_bytes());
    input.push(0);
    input.extend_from_slice(pipeline_version.as_bytes());

    let hash = digest(&SHA256, &input);
    hash.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}

#[async_trait::async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedAnalysis>, CacheError>;

    async fn put(
        &self,
        key: &str,
        value: CachedAnalysis,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

struct Entry {
    value: CachedAnalysis,
    expires_at: Instant,
}

/// In-process cache with lazy TTL expiry.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl AnalysisCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CachedAnalysis>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Expired entries are removed on the next lookup.
        self.entries
            .remove_if(key, |_, e| e.expires_at <= Instant::now());
        Ok(None)
    }

    async fn put(
        &self,
        key: &str,
        value: CachedAnalysis,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CachedAnalysis {
        CachedAnalysis {
            explanation: "unilateral termination clause".into(),
            consumer_impact: Some("account can vanish without warning".into()),
            recommendation: None,
            confidence: 0.9,
            stage: Stage::One,
            stored_at: Utc::now(),
        }
    }

    #[test]
    fn key_is_stable_and_input_sensitive() {
        let a = cache_key("some clause", Severity::High, "v1");
        let b = cache_key("some clause", Severity::High, "v1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        assert_ne!(a, cache_key("some clause!", Severity::High, "v1"));
        assert_ne!(a, cache_key("some clause", Severity::Medium, "v1"));
        assert_ne!(a, cache_key("some clause", Severity::High, "v2"));
    }

    #[test]
    fn key_fields_are_delimited() {
        // Concatenation across field boundaries must not collide.
        let a = cache_key("ab", Severity::High, "v1");
        let b = cache_key("a", Severity::High, "bv1");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn get_after_put_round_trips() {
        let cache = MemoryCache::new();
        cache
            .put("k1", sample(), Duration::from_secs(60))
            .await
            .unwrap();
        let got = cache.get("k1").await.unwrap().expect("hit");
        assert_eq!(got.explanation, "unilateral termination clause");
        assert_eq!(got.stage, Stage::One);
    }

    #[tokio::test]
    async fn expired_entry_misses() {
        let cache = MemoryCache::new();
        cache.put("k1", sample(), Duration::ZERO).await.unwrap();
        assert!(cache.get("k1").await.unwrap().is_none());
        // Expired entry is dropped, not retained.
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn rewrite_same_key_is_idempotent() {
        let cache = MemoryCache::new();
        cache.put("k1", sample(), Duration::from_secs(60)).await.unwrap();
        cache.put("k1", sample(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.len(), 1);
    }
}
