//! Prevalence estimation against the reference corpus
//!
//! Prevalence is the fraction of the fetched near-neighbors whose similarity
//! clears the configured floor. When the corpus yields nothing above the
//! floor — cold corpus, or a truly novel clause — the estimate falls back to
//! the configured default, which must flag the clause as rare. That direction
//! matters: a missing signal must not suppress detection.

use clauseguard_core::config::PrevalenceConfig;
use clauseguard_core::types::{ClauseId, PrevalenceScore};
use clauseguard_llm::provider::{LlmResult, SimilarityStore};
use std::sync::Arc;
use tracing::debug;

pub struct PrevalenceEstimator {
    store: Arc<dyn SimilarityStore>,
    config: PrevalenceConfig,
}

impl PrevalenceEstimator {
    pub fn new(store: Arc<dyn SimilarityStore>, config: PrevalenceConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &PrevalenceConfig {
        &self.config
    }

    /// The conservative score used when no estimate is possible (cold corpus,
    /// or the embedding/store call failed past its retry budget).
    pub fn default_score(&self, clause: ClauseId) -> PrevalenceScore {
        PrevalenceScore {
            clause,
            prevalence: self.config.default_prevalence,
            neighbors_considered: 0,
            defaulted: true,
        }
    }

    pub async fn estimate(
        &self,
        clause: ClauseId,
        embedding: &[f32],
    ) -> LlmResult<PrevalenceScore> {
        let neighbors = self
            .store
            .nearest_neighbors(embedding, &self.config.namespace, self.config.top_k)
            .await?;

        let above_floor = neighbors
            .iter()
            .filter(|n| n.score >= self.config.similarity_floor)
            .count();

        if above_floor == 0 {
            debug!(
                clause = %clause,
                fetched = neighbors.len(),
                "no neighbors above similarity floor — assuming rare"
            );
            return Ok(self.default_score(clause));
        }

        let prevalence = above_floor as f32 / self.config.top_k.max(1) as f32;
        Ok(PrevalenceScore {
            clause,
            prevalence: prevalence.min(1.0),
            neighbors_considered: neighbors.len(),
            defaulted: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauseguard_llm::provider::{LlmError, Neighbor};

    struct FixedStore(Vec<Neighbor>);

    #[async_trait::async_trait]
    impl SimilarityStore for FixedStore {
        async fn nearest_neighbors(
            &self,
            _vector: &[f32],
            _namespace: &str,
            _k: usize,
        ) -> LlmResult<Vec<Neighbor>> {
            Ok(self.0.clone())
        }
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl SimilarityStore for FailingStore {
        async fn nearest_neighbors(
            &self,
            _vector: &[f32],
            _namespace: &str,
            _k: usize,
        ) -> LlmResult<Vec<Neighbor>> {
            Err(LlmError::ServiceUnavailable("503".into()))
        }
    }

    fn neighbors(scores: &[f32]) -> Vec<Neighbor> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| Neighbor {
                id: format!("ref-{i}"),
                score: *s,
            })
            .collect()
    }

    fn config() -> PrevalenceConfig {
        PrevalenceConfig {
            namespace: "test".into(),
            top_k: 10,
            similarity_floor: 0.8,
            rarity_threshold: 0.15,
            default_prevalence: 0.05,
        }
    }

    #[tokio::test]
    async fn empty_store_resolves_rare_never_common() {
        let est = PrevalenceEstimator::new(Arc::new(FixedStore(vec![])), config());
        let score = est.estimate("c1".into(), &[0.1, 0.2]).await.unwrap();
        assert!(score.defaulted);
        assert!(score.is_unusual(0.15), "cold corpus must flag as rare");
    }

    #[tokio::test]
    async fn all_neighbors_below_floor_defaults_rare() {
        let est = PrevalenceEstimator::new(
            Arc::new(FixedStore(neighbors(&[0.5, 0.6, 0.79]))),
            config(),
        );
        let score = est.estimate("c1".into(), &[0.1]).await.unwrap();
        assert!(score.defaulted);
        assert_eq!(score.prevalence, 0.05);
    }

    #[tokio::test]
    async fn prevalence_is_fraction_above_floor() {
        let est = PrevalenceEstimator::new(
            Arc::new(FixedStore(neighbors(&[0.95, 0.91, 0.85, 0.6, 0.4]))),
            config(),
        );
        let score = est.estimate("c1".into(), &[0.1]).await.unwrap();
        assert!(!score.defaulted);
        // 3 of top_k=10 above the 0.8 floor.
        assert!((score.prevalence - 0.3).abs() < 1e-6);
        assert!(!score.is_unusual(0.15));
    }

    #[tokio::test]
    async fn store_error_propagates_for_caller_fallback() {
        let est = PrevalenceEstimator::new(Arc::new(FailingStore), config());
        let err = est.estimate("c1".into(), &[0.1]).await.unwrap_err();
        assert!(err.is_transient());
    }
}
