//! Analyzer configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists. The numeric thresholds
//! are empirically tuned defaults, not invariants — deployments should tune
//! them against their own corpus.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level analyzer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Lexical indicator matching.
    pub indicators: IndicatorConfig,
    /// Reference-corpus prevalence estimation.
    pub prevalence: PrevalenceConfig,
    /// Risky-template semantic matching.
    pub semantic: SemanticConfig,
    /// Two-stage cascade routing, caching, and cost control.
    pub cascade: CascadeConfig,
    /// Model selection per call site.
    pub models: ModelConfig,
    /// Concurrency and per-call timeouts.
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Clauses shorter than this many characters are excluded from matching
    /// entirely. A length floor, not zero — short boilerplate fragments
    /// otherwise dominate false positives.
    pub min_clause_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrevalenceConfig {
    /// Similarity-store namespace holding the reference corpus.
    pub namespace: String,
    /// Neighbors fetched per estimate.
    pub top_k: usize,
    /// Neighbors below this cosine similarity don't count as "near".
    pub similarity_floor: f32,
    /// Prevalence under this value marks a clause as unusual.
    pub rarity_threshold: f32,
    /// Used when the corpus yields no qualifying neighbors. Must stay LOW
    /// (assume rare): silent non-detection is the worse failure mode.
    pub default_prevalence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticConfig {
    /// Minimum cosine similarity for a template match to be retained.
    pub match_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Stage 1 confidences under this escalate to Stage 2. The single knob
    /// controlling the cost/quality tradeoff.
    pub escalation_threshold: f32,
    /// TTL for cached analyses, so stale legal-text analyses expire.
    pub cache_ttl_secs: u64,
    /// Version tag mixed into cache keys — bump on any change to patterns,
    /// prompts, or thresholds to invalidate prior analyses.
    pub pipeline_version: String,
    /// Backoff schedule for transient failures, in milliseconds.
    pub retry_backoff_ms: Vec<u64>,
    /// Optional cost guard. Once cumulative spend crosses this, remaining
    /// clauses in the run skip Stage 2 (Stage 1 results are kept).
    pub stage2_budget_usd: Option<f64>,
    /// Pricing used for cost accounting, USD per 1k tokens.
    pub stage1_usd_per_1k_tokens: f64,
    pub stage2_usd_per_1k_tokens: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Cheap/fast model backing Stage 1.
    pub stage1_model: String,
    /// Deep model backing Stage 2.
    pub stage2_model: String,
    /// Embedding model for prevalence and semantic matching.
    pub embedding_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on clause pipelines in flight at once — respects upstream
    /// rate limits.
    pub max_concurrent_clauses: usize,
    /// Per-call timeout for each network service, in seconds.
    pub call_timeout_secs: u64,
}

// ============================================================
// Defaults
// ============================================================

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            indicators: IndicatorConfig::default(),
            prevalence: PrevalenceConfig::default(),
            semantic: SemanticConfig::default(),
            cascade: CascadeConfig::default(),
            models: ModelConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { min_clause_chars: 25 }
    }
}

impl Default for PrevalenceConfig {
    fn default() -> Self {
        Self {
            namespace: "clause-baseline".into(),
            top_k: 20,
            similarity_floor: 0.80,
            rarity_threshold: 0.15,
            default_prevalence: 0.05,
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self { match_threshold: 0.86 }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: 0.70,
            cache_ttl_secs: 7 * 24 * 3600,
            pipeline_version: "v1".into(),
            retry_backoff_ms: vec![250, 1_000, 4_000],
            stage2_budget_usd: None,
            stage1_usd_per_1k_tokens: 0.001,
            stage2_usd_per_1k_tokens: 0.018,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            stage1_model: "claude-haiku-4-5".into(),
            stage2_model: "claude-opus-4-6".into(),
            embedding_model: "text-embedding-3-small".into(),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_clauses: 4,
            call_timeout_secs: 30,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl AnalyzerConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} — using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} — using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject knob values the pipeline cannot operate with. Parse errors are
    /// forgiven by [`load`](Self::load), but a parsed config with a zero
    /// concurrency bound or an out-of-range threshold would fail in confusing
    /// ways much later, so those are hard errors.
    pub fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.cascade.escalation_threshold) {
            return Err(Error::Config(format!(
                "cascade.escalation_threshold must be within [0, 1], got {}",
                self.cascade.escalation_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.semantic.match_threshold) {
            return Err(Error::Config(format!(
                "semantic.match_threshold must be within [0, 1], got {}",
                self.semantic.match_threshold
            )));
        }
        if self.prevalence.top_k == 0 {
            return Err(Error::Config("prevalence.top_k must be at least 1".into()));
        }
        if self.runtime.max_concurrent_clauses == 0 {
            return Err(Error::Config(
                "runtime.max_concurrent_clauses must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
