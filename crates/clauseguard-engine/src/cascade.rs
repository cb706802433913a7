//! Cascade orchestration for one clause
//!
//! State machine: CacheLookup → Stage1 → {Accept | Escalate} → Stage2 →
//! CacheWrite → Done. Escalation is driven by Stage 1's self-reported
//! confidence against a single configured threshold, gated by the run-level
//! cost ledger. Stage 2 failure falls back to Stage 1's result; total stage
//! failure falls back to the indicator-derived severity with no explanation.
//! An anomaly is never silently dropped.

use crate::cache::{cache_key, AnalysisCache, CachedAnalysis};
use crate::retry::{with_backoff, with_deadline};
use crate::stages::{StageAnalyzer, StageAssessment, StageRequest};
use chrono::Utc;
use clauseguard_core::config::CascadeConfig;
use clauseguard_core::error::Error;
use clauseguard_core::types::{AnalysisAttempt, CacheStatus, Stage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run-level spend tracking. Content is monotonic; once the budget is
/// crossed, escalation stays off for the remainder of the run.
pub struct CostLedger {
    spent_microusd: AtomicU64,
    budget_usd: Option<f64>,
}

impl CostLedger {
    pub fn new(budget_usd: Option<f64>) -> Self {
        Self {
            spent_microusd: AtomicU64::new(0),
            budget_usd,
        }
    }

    pub fn record(&self, cost_usd: f64) {
        let micro = (cost_usd * 1_000_000.0).round().max(0.0) as u64;
        self.spent_microusd.fetch_add(micro, Ordering::Relaxed);
    }

    pub fn spent_usd(&self) -> f64 {
        self.spent_microusd.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Err when the configured stage2 budget is spent.
    pub fn check(&self) -> Result<(), Error> {
        match self.budget_usd {
            Some(budget) if self.spent_usd() >= budget => Err(Error::BudgetExceeded {
                spent_usd: self.spent_usd(),
                budget_usd: budget,
            }),
            _ => Ok(()),
        }
    }
}

/// Where a clause's accepted explanation came from — tagged so call sites
/// handle every path exhaustively.
pub enum AnalysisOutcome {
    CacheHit(CachedAnalysis),
    Stage1(StageAssessment),
    Stage2 {
        assessment: StageAssessment,
        /// The Stage 1 result the escalation superseded.
        superseded: StageAssessment,
    },
    /// Both stages failed; the deterministic severity stands unexplained.
    IndicatorOnly,
}

/// Outcome plus the audit trail of what ran.
pub struct ClauseAnalysis {
    pub outcome: AnalysisOutcome,
    pub attempts: Vec<AnalysisAttempt>,
}

pub struct CascadeOrchestrator {
    stage1: Arc<dyn StageAnalyzer>,
    stage2: Arc<dyn StageAnalyzer>,
    cache: Arc<dyn AnalysisCache>,
    config: CascadeConfig,
    call_timeout_secs: u64,
    ledger: CostLedger,
}

impl CascadeOrchestrator {
    pub fn new(
        stage1: Arc<dyn StageAnalyzer>,
        stage2: Arc<dyn StageAnalyzer>,
        cache: Arc<dyn AnalysisCache>,
        config: CascadeConfig,
        call_timeout_secs: u64,
    ) -> Self {
        let ledger = CostLedger::new(config.stage2_budget_usd);
        Self {
            stage1,
            stage2,
            cache,
            config,
            call_timeout_secs,
            ledger,
        }
    }

    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }

    /// Run the full cascade for one flagged clause.
    pub async fn analyze_clause(&self, request: &StageRequest) -> ClauseAnalysis {
        let clause = request.clause.id.clone();
        let key = cache_key(
            &request.clause.text,
            request.verdict.severity,
            &self.config.pipeline_version,
        );
        let mut attempts = Vec::new();

        // CacheLookup — unavailability degrades to a miss, never an abort.
        let cache_status = match self.cache.get(&key).await {
            Ok(Some(cached)) => {
                debug!(clause = %clause, "analysis cache hit");
                attempts.push(AnalysisAttempt {
                    clause,
                    stage: cached.stage,
                    confidence: Some(cached.confidence),
                    cost_usd: 0.0,
                    cache: CacheStatus::Hit,
                    escalated: false,
                    timestamp: Utc::now(),
                });
                return ClauseAnalysis {
                    outcome: AnalysisOutcome::CacheHit(cached),
                    attempts,
                };
            }
            Ok(None) => CacheStatus::Miss,
            Err(e) => {
                let err = Error::from(e);
                warn!(clause = %clause, "treating as permanent miss: {}", err);
                CacheStatus::Bypassed
            }
        };

        // Stage1 — unconditional on cache miss.
        let stage1 = match self.run_stage(self.stage1.as_ref(), request).await {
            Ok(a) => a,
            Err(e) => {
                warn!(
                    clause = %clause,
                    "stage1 failed, severity stands without explanation: {}", e
                );
                attempts.push(AnalysisAttempt {
                    clause,
                    stage: Stage::One,
                    confidence: None,
                    cost_usd: 0.0,
                    cache: cache_status,
                    escalated: false,
                    timestamp: Utc::now(),
                });
                return ClauseAnalysis {
                    outcome: AnalysisOutcome::IndicatorOnly,
                    attempts,
                };
            }
        };
        self.ledger.record(stage1.cost_usd);

        // Escalation decision.
        let wants_escalation = stage1.confidence < self.config.escalation_threshold;
        let escalate = match (wants_escalation, self.ledger.check()) {
            (true, Ok(())) => true,
            (true, Err(e)) => {
                info!(clause = %clause, "{} — keeping stage1 result", e);
                false
            }
            (false, _) => false,
        };

        attempts.push(AnalysisAttempt {
            clause: clause.clone(),
            stage: Stage::One,
            confidence: Some(stage1.confidence),
            cost_usd: stage1.cost_usd,
            cache: cache_status,
            escalated: escalate,
            timestamp: Utc::now(),
        });

        let outcome = if escalate {
            match self.run_stage(self.stage2.as_ref(), request).await {
                Ok(stage2) => {
                    self.ledger.record(stage2.cost_usd);
                    attempts.push(AnalysisAttempt {
                        clause: clause.clone(),
                        stage: Stage::Two,
                        confidence: Some(stage2.confidence),
                        cost_usd: stage2.cost_usd,
                        cache: cache_status,
                        escalated: false,
                        timestamp: Utc::now(),
                    });
                    AnalysisOutcome::Stage2 {
                        assessment: stage2,
                        superseded: stage1,
                    }
                }
                Err(e) => {
                    // Graceful degradation: keep the stage1 result.
                    warn!(clause = %clause, "stage2 failed, falling back to stage1: {}", e);
                    attempts.push(AnalysisAttempt {
                        clause: clause.clone(),
                        stage: Stage::Two,
                        confidence: None,
                        cost_usd: 0.0,
                        cache: cache_status,
                        escalated: false,
                        timestamp: Utc::now(),
                    });
                    AnalysisOutcome::Stage1(stage1)
                }
            }
        } else {
            AnalysisOutcome::Stage1(stage1)
        };

        // CacheWrite — best-effort, keyed identically to the lookup.
        if let Some(value) = cached_value(&outcome) {
            let ttl = Duration::from_secs(self.config.cache_ttl_secs);
            if let Err(e) = self.cache.put(&key, value, ttl).await {
                warn!(clause = %clause, "cache write failed: {}", Error::from(e));
            }
        }

        ClauseAnalysis { outcome, attempts }
    }

    async fn run_stage(
        &self,
        stage: &dyn StageAnalyzer,
        request: &StageRequest,
    ) -> Result<StageAssessment, clauseguard_llm::provider::LlmError> {
        let name = stage.stage().as_str();
        with_backoff(&self.config.retry_backoff_ms, name, || {
            with_deadline(self.call_timeout_secs, name, stage.assess(request))
        })
        .await
    }
}

fn cached_value(outcome: &AnalysisOutcome) -> Option<CachedAnalysis> {
    let (assessment, stage) = match outcome {
        AnalysisOutcome::Stage1(a) => (a, Stage::One),
        AnalysisOutcome::Stage2 { assessment, .. } => (assessment, Stage::Two),
        // Hits are already stored; indicator-only has nothing worth caching.
        AnalysisOutcome::CacheHit(_) | AnalysisOutcome::IndicatorOnly => return None,
    };
    Some(CachedAnalysis {
        explanation: assessment.explanation.clone(),
        consumer_impact: assessment.consumer_impact.clone(),
        recommendation: assessment.recommendation.clone(),
        confidence: assessment.confidence,
        stage,
        stored_at: Utc::now(),
    })
}
