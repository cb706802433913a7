//! Document-level analysis
//!
//! Fans independent clause pipelines out under a bounded concurrency limit,
//! recombines results by clause id (completion order is irrelevant), runs
//! compound detection across the whole document, and aggregates the report.
//! Per-clause failures are isolated: one clause degrading or dying never
//! aborts its siblings.

use crate::cascade::{AnalysisOutcome, CascadeOrchestrator};
use crate::retry::{with_backoff, with_deadline};
use crate::stages::StageRequest;
use chrono::Utc;
use clauseguard_core::config::AnalyzerConfig;
use clauseguard_core::error::{Error, Result};
use clauseguard_core::types::{
    AnalysisAttempt, AnalysisSource, AnomalyRecord, AnomalyReport, Clause, CompoundRiskFinding,
    RiskCategory, RiskTier, Severity, SeverityVerdict, SignalBundle,
};
use clauseguard_llm::provider::{EmbeddingProvider, LlmError};
use clauseguard_signals::compound::CompoundRiskDetector;
use clauseguard_signals::indicators::IndicatorMatcher;
use clauseguard_signals::prevalence::PrevalenceEstimator;
use clauseguard_signals::semantic::SemanticRiskMatcher;
use clauseguard_signals::severity::resolve_severity;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-clause output of the signal phase.
struct ClauseSignals {
    clause: Clause,
    bundle: SignalBundle,
    verdict: Option<SeverityVerdict>,
}

pub struct DocumentAnalyzer {
    embedder: Arc<dyn EmbeddingProvider>,
    matcher: Arc<IndicatorMatcher>,
    estimator: Arc<PrevalenceEstimator>,
    semantic: Arc<SemanticRiskMatcher>,
    compound: CompoundRiskDetector,
    orchestrator: Arc<CascadeOrchestrator>,
    config: AnalyzerConfig,
}

impl DocumentAnalyzer {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        matcher: IndicatorMatcher,
        estimator: PrevalenceEstimator,
        semantic: SemanticRiskMatcher,
        compound: CompoundRiskDetector,
        orchestrator: Arc<CascadeOrchestrator>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            embedder,
            matcher: Arc::new(matcher),
            estimator: Arc::new(estimator),
            semantic: Arc::new(semantic),
            compound,
            orchestrator,
            config,
        }
    }

    /// Analyze a document's clauses and produce the ranked report.
    ///
    /// Cancellation stops issuing new per-clause work; in-flight calls finish
    /// or time out normally and their results are kept.
    pub async fn analyze_document(
        &self,
        document_id: &str,
        clauses: Vec<Clause>,
        cancel: CancellationToken,
    ) -> Result<AnomalyReport> {
        if clauses.is_empty() {
            return Err(Error::EmptyInput);
        }
        info!(document_id, clause_count = clauses.len(), "starting analysis");

        let signals = self.extract_signals(clauses, &cancel).await;

        // Compound detection needs the whole document's category set.
        let present: HashSet<RiskCategory> = signals
            .iter()
            .flat_map(|s| clause_categories(&s.bundle))
            .collect();
        let compound_findings = self.compound.detect(&present);
        if !compound_findings.is_empty() {
            info!(
                document_id,
                findings = compound_findings.len(),
                "compound risk patterns present"
            );
        }

        let (mut anomalies, mut attempts) = self
            .explain_flagged(&signals, &compound_findings, &cancel)
            .await;

        // Rank: most severe first, document order within a severity.
        let position_of = |clause: &AnomalyRecord| {
            signals
                .iter()
                .find(|s| s.clause.id == clause.clause)
                .map(|s| s.clause.position)
                .unwrap_or(usize::MAX)
        };
        anomalies.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| position_of(a).cmp(&position_of(b)))
        });
        attempts.sort_by_key(|a| a.timestamp);

        let total_cost_usd = attempts.iter().map(|a| a.cost_usd).sum();
        let risk_score = document_risk_score(&anomalies, &compound_findings);

        info!(
            document_id,
            anomalies = anomalies.len(),
            risk_score,
            total_cost_usd,
            "analysis complete"
        );

        Ok(AnomalyReport {
            document_id: document_id.to_string(),
            risk_score,
            anomalies,
            compound_findings,
            attempts,
            total_cost_usd,
        })
    }

    /// Phase 1: concurrent per-clause signal extraction.
    async fn extract_signals(
        &self,
        clauses: Vec<Clause>,
        cancel: &CancellationToken,
    ) -> Vec<ClauseSignals> {
        let semaphore = Arc::new(Semaphore::new(self.config.runtime.max_concurrent_clauses));
        let rarity_threshold = self.config.prevalence.rarity_threshold;
        let backoff = self.config.cascade.retry_backoff_ms.clone();
        let timeout_secs = self.config.runtime.call_timeout_secs;

        let mut handles = Vec::with_capacity(clauses.len());
        for clause in clauses {
            if cancel.is_cancelled() {
                debug!(clause = %clause.id, "cancelled before signal extraction");
                continue;
            }
            let semaphore = semaphore.clone();
            let embedder = self.embedder.clone();
            let matcher = self.matcher.clone();
            let estimator = self.estimator.clone();
            let semantic = self.semantic.clone();
            let backoff = backoff.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                // Tasks queued behind the concurrency limit re-check after
                // acquiring their permit; a cancel mid-run stops them here
                // while already-running siblings finish normally.
                if cancel.is_cancelled() {
                    debug!(clause = %clause.id, "cancelled before signal extraction");
                    return None;
                }

                let indicators = matcher.scan(&clause);

                let embedding = with_backoff(&backoff, "embedding", || {
                    with_deadline(timeout_secs, "embedding", embedder.embed(&clause.text))
                })
                .await;

                let (prevalence, semantic_match) = match embedding {
                    Ok(vector) => {
                        let prevalence = with_backoff(&backoff, "similarity-store", || {
                            with_deadline(
                                timeout_secs,
                                "similarity-store",
                                estimator.estimate(clause.id.clone(), &vector),
                            )
                        })
                        .await
                        .unwrap_or_else(|e| {
                            let err = service_error("similarity-store", &e);
                            warn!(clause = %clause.id, "prevalence unavailable, assuming rare: {}", err);
                            estimator.default_score(clause.id.clone())
                        });
                        (prevalence, semantic.best_match(clause.id.clone(), &vector))
                    }
                    Err(e) => {
                        // No embedding: lexical signals still flow, and the
                        // prevalence default errs toward detection.
                        let err = service_error("embedding", &e);
                        warn!(clause = %clause.id, "embedding failed, lexical-only signals: {}", err);
                        (estimator.default_score(clause.id.clone()), None)
                    }
                };

                let bundle = SignalBundle {
                    indicators,
                    prevalence,
                    semantic: semantic_match,
                };
                let verdict = resolve_severity(&bundle, rarity_threshold);
                Some(ClauseSignals {
                    clause,
                    bundle,
                    verdict,
                })
            }));
        }

        let mut signals = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(s)) => signals.push(s),
                Ok(None) => {}
                Err(e) => warn!("clause signal task failed: {}", e),
            }
        }
        // Recombine deterministically by document position.
        signals.sort_by_key(|s| s.clause.position);
        signals
    }

    /// Phase 2: concurrent cascade over flagged clauses.
    async fn explain_flagged(
        &self,
        signals: &[ClauseSignals],
        compound_findings: &[CompoundRiskFinding],
        cancel: &CancellationToken,
    ) -> (Vec<AnomalyRecord>, Vec<AnalysisAttempt>) {
        let semaphore = Arc::new(Semaphore::new(self.config.runtime.max_concurrent_clauses));
        let mut handles = Vec::new();

        for s in signals {
            let Some(verdict) = &s.verdict else { continue };
            if cancel.is_cancelled() {
                debug!(clause = %s.clause.id, "cancelled before cascade");
                continue;
            }

            let request = StageRequest {
                clause: s.clause.clone(),
                verdict: verdict.clone(),
                signals: s.bundle.clone(),
                compound: relevant_findings(&s.bundle, compound_findings),
            };
            let orchestrator = self.orchestrator.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();

            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    debug!(clause = %request.clause.id, "cancelled before cascade");
                    return None;
                }
                let analysis = orchestrator.analyze_clause(&request).await;
                Some((request, analysis))
            }));
        }

        let mut anomalies = Vec::new();
        let mut attempts = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some((request, analysis))) => {
                    attempts.extend(analysis.attempts);
                    anomalies.push(build_record(&request, analysis.outcome));
                }
                Ok(None) => {}
                Err(e) => warn!("clause cascade task failed: {}", e),
            }
        }
        (anomalies, attempts)
    }
}

/// Lift a provider failure into the pipeline error taxonomy.
fn service_error(service: &str, e: &LlmError) -> Error {
    if e.is_transient() {
        Error::transient(service, e.to_string())
    } else if matches!(e, LlmError::InvalidResponse(_)) {
        Error::malformed(service, e.to_string())
    } else {
        Error::Internal(format!("{service}: {e}"))
    }
}

/// All categories a clause's signals touch, lexical and semantic.
fn clause_categories(bundle: &SignalBundle) -> Vec<RiskCategory> {
    let mut cats: Vec<RiskCategory> = bundle.indicators.iter().map(|m| m.category).collect();
    if let Some(s) = &bundle.semantic {
        cats.push(s.category);
    }
    cats
}

/// Compound findings that any of the clause's categories participate in.
fn relevant_findings(
    bundle: &SignalBundle,
    findings: &[CompoundRiskFinding],
) -> Vec<CompoundRiskFinding> {
    let cats: HashSet<RiskCategory> = clause_categories(bundle).into_iter().collect();
    findings
        .iter()
        .filter(|f| {
            f.categories_present.iter().any(|c| cats.contains(c))
                || f.bonus_present.iter().any(|c| cats.contains(c))
        })
        .cloned()
        .collect()
}

/// Dominant category for the record: strongest high-tier indicator first,
/// then the semantic match, then the strongest indicator of any tier.
fn primary_category(bundle: &SignalBundle) -> Option<RiskCategory> {
    let strongest = |tier: Option<RiskTier>| {
        bundle
            .indicators
            .iter()
            .filter(|m| tier.map_or(true, |t| m.tier == t))
            .max_by(|a, b| a.weight.partial_cmp(&b.weight).unwrap_or(std::cmp::Ordering::Equal))
            .map(|m| m.category)
    };
    strongest(Some(RiskTier::High))
        .or_else(|| bundle.semantic.as_ref().map(|s| s.category))
        .or_else(|| strongest(None))
}

/// Attach the accepted explanation (if any) to the deterministic verdict.
/// The severity on the record always comes from the verdict — no outcome
/// path can change it.
fn build_record(request: &StageRequest, outcome: AnalysisOutcome) -> AnomalyRecord {
    let (explanation, consumer_impact, recommendation, confidence, source) = match outcome {
        AnalysisOutcome::CacheHit(cached) => (
            Some(cached.explanation),
            cached.consumer_impact,
            cached.recommendation,
            cached.confidence,
            AnalysisSource::CacheHit,
        ),
        AnalysisOutcome::Stage1(a) => (
            Some(a.explanation),
            a.consumer_impact,
            a.recommendation,
            a.confidence,
            AnalysisSource::Stage1,
        ),
        AnalysisOutcome::Stage2 { assessment, .. } => (
            Some(assessment.explanation),
            assessment.consumer_impact,
            assessment.recommendation,
            assessment.confidence,
            AnalysisSource::Stage2,
        ),
        AnalysisOutcome::IndicatorOnly => {
            let confidence = request
                .signals
                .indicators
                .iter()
                .map(|m| m.weight)
                .fold(0.0_f32, f32::max)
                .max(0.5);
            (None, None, None, confidence, AnalysisSource::IndicatorOnly)
        }
    };

    AnomalyRecord {
        id: Uuid::new_v4(),
        clause: request.clause.id.clone(),
        severity: request.verdict.severity,
        category: primary_category(&request.signals),
        explanation,
        consumer_impact,
        recommendation,
        confidence,
        source,
        signals: request.signals.clone(),
        created_at: Utc::now(),
    }
}

/// Weighted aggregate over count, severity mix, compound findings, and
/// category diversity, clamped to 1..=10.
pub fn document_risk_score(anoms: &[AnomalyRecord], compound: &[CompoundRiskFinding]) -> u8 {
    if anoms.is_empty() && compound.is_empty() {
        return 1;
    }

    let severity_points: f32 = anoms
        .iter()
        .map(|a| match a.severity {
            Severity::High => 3.0,
            Severity::Medium => 2.0,
            Severity::Low => 1.0,
        })
        .sum();
    let diversity = anoms
        .iter()
        .filter_map(|a| a.category)
        .collect::<HashSet<_>>()
        .len() as f32;

    let raw = 1.0 + severity_points + 1.5 * compound.len() as f32 + 0.5 * diversity;
    (raw.round() as u8).clamp(1, 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauseguard_core::types::{ClauseId, PrevalenceScore, SeverityBasis};

    fn record(severity: Severity, category: Option<RiskCategory>) -> AnomalyRecord {
        let clause = ClauseId::from("c1");
        AnomalyRecord {
            id: Uuid::new_v4(),
            clause: clause.clone(),
            severity,
            category,
            explanation: None,
            consumer_impact: None,
            recommendation: None,
            confidence: 0.8,
            source: AnalysisSource::IndicatorOnly,
            signals: SignalBundle {
                indicators: vec![],
                prevalence: PrevalenceScore {
                    clause,
                    prevalence: 0.05,
                    neighbors_considered: 0,
                    defaulted: true,
                },
                semantic: None,
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn clean_document_scores_one() {
        assert_eq!(document_risk_score(&[], &[]), 1);
    }

    #[test]
    fn single_high_anomaly_scores_mid_range() {
        let anoms = vec![record(Severity::High, Some(RiskCategory::UnilateralTermination))];
        let score = document_risk_score(&anoms, &[]);
        assert!((4..=6).contains(&score), "got {score}");
    }

    #[test]
    fn score_saturates_at_ten() {
        let anoms: Vec<_> = (0..20)
            .map(|_| record(Severity::High, Some(RiskCategory::DataSale)))
            .collect();
        assert_eq!(document_risk_score(&anoms, &[]), 10);
    }

    #[test]
    fn compound_findings_raise_the_score() {
        let anoms = vec![record(Severity::Medium, Some(RiskCategory::AutoRenewal))];
        let without = document_risk_score(&anoms, &[]);
        let finding = CompoundRiskFinding {
            pattern_id: "subscription-trap".into(),
            name: "Subscription trap".into(),
            categories_present: vec![RiskCategory::AutoRenewal],
            bonus_present: vec![],
            confidence: 0.85,
        };
        let with = document_risk_score(&anoms, &[finding]);
        assert!(with > without);
    }

    #[test]
    fn severity_verdict_never_overridden_by_outcome() {
        let clause = Clause {
            id: ClauseId::from("c1"),
            section: "s".into(),
            number: "1".into(),
            text: "text".into(),
            position: 0,
        };
        let request = StageRequest {
            verdict: SeverityVerdict {
                clause: clause.id.clone(),
                severity: Severity::High,
                basis: SeverityBasis::HighIndicator,
            },
            signals: SignalBundle {
                indicators: vec![],
                prevalence: PrevalenceScore {
                    clause: clause.id.clone(),
                    prevalence: 0.5,
                    neighbors_considered: 5,
                    defaulted: false,
                },
                semantic: None,
            },
            compound: vec![],
            clause,
        };
        // A stage claiming low confidence and a benign reading still cannot
        // move the severity.
        let outcome = AnalysisOutcome::Stage1(crate::stages::StageAssessment {
            explanation: "looks fine to me".into(),
            consumer_impact: None,
            recommendation: None,
            confidence: 0.1,
            cost_usd: 0.0,
        });
        let rec = build_record(&request, outcome);
        assert_eq!(rec.severity, Severity::High);
        assert_eq!(rec.source, AnalysisSource::Stage1);
    }
}
