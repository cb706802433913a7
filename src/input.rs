//! Document loading and the offline (no network) scan path.

use chrono::Utc;
use clauseguard_core::config::AnalyzerConfig;
use clauseguard_core::error::Result;
use clauseguard_core::types::{
    AnalysisSource, AnomalyRecord, AnomalyReport, Clause, ClauseId, PrevalenceScore, RiskCategory,
    RiskTier, SignalBundle,
};
use clauseguard_engine::document_risk_score;
use clauseguard_signals::compound::CompoundRiskDetector;
use clauseguard_signals::indicators::{IndicatorLibrary, IndicatorMatcher};
use clauseguard_signals::severity::resolve_severity;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DocumentFile {
    pub document_id: String,
    pub clauses: Vec<ClauseEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ClauseEntry {
    pub id: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub number: String,
    pub text: String,
    pub position: usize,
}

impl DocumentFile {
    pub fn clauses(&self) -> Vec<Clause> {
        self.clauses
            .iter()
            .map(|c| Clause {
                id: ClauseId::new(c.id.as_str()),
                section: c.section.clone(),
                number: c.number.clone(),
                text: c.text.clone(),
                position: c.position,
            })
            .collect()
    }
}

pub fn load_document(path: &Path) -> Result<DocumentFile> {
    let raw = std::fs::read_to_string(path)?;
    let doc: DocumentFile = serde_json::from_str(&raw)?;
    Ok(doc)
}

/// Lexical-only scan: indicator matching, severity, compound detection.
///
/// Without a reference corpus every clause is treated as common
/// (prevalence 1.0), so rarity alone never flags anything here and the
/// output is exactly the pattern-backed findings.
pub fn offline_scan(document: &DocumentFile, config: &AnalyzerConfig) -> AnomalyReport {
    let matcher = IndicatorMatcher::new(
        IndicatorLibrary::default(),
        config.indicators.min_clause_chars,
    );
    let compound = CompoundRiskDetector::default();

    let mut anomalies = Vec::new();
    let mut present: HashSet<RiskCategory> = HashSet::new();

    for clause in document.clauses() {
        let indicators = matcher.scan(&clause);
        present.extend(indicators.iter().map(|m| m.category));

        let bundle = SignalBundle {
            indicators,
            prevalence: PrevalenceScore {
                clause: clause.id.clone(),
                prevalence: 1.0,
                neighbors_considered: 0,
                defaulted: false,
            },
            semantic: None,
        };
        let Some(verdict) = resolve_severity(&bundle, config.prevalence.rarity_threshold) else {
            continue;
        };

        let by_weight = |a: &&clauseguard_core::types::IndicatorMatch,
                         b: &&clauseguard_core::types::IndicatorMatch| {
            a.weight.total_cmp(&b.weight)
        };
        let strongest = bundle
            .indicators
            .iter()
            .filter(|m| m.tier == RiskTier::High)
            .max_by(by_weight)
            .or_else(|| bundle.indicators.iter().max_by(by_weight));
        let confidence = strongest.map(|m| m.weight.max(0.5)).unwrap_or(0.5);

        anomalies.push(AnomalyRecord {
            id: Uuid::new_v4(),
            clause: clause.id.clone(),
            severity: verdict.severity,
            category: strongest.map(|m| m.category),
            explanation: None,
            consumer_impact: None,
            recommendation: None,
            confidence,
            source: AnalysisSource::IndicatorOnly,
            signals: bundle,
            created_at: Utc::now(),
        });
    }

    let compound_findings = compound.detect(&present);
    let risk_score = document_risk_score(&anomalies, &compound_findings);

    anomalies.sort_by(|a, b| b.severity.cmp(&a.severity));

    AnomalyReport {
        document_id: document.document_id.clone(),
        risk_score,
        anomalies,
        compound_findings,
        attempts: Vec::new(),
        total_cost_usd: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauseguard_core::types::Severity;

    fn doc(clauses: Vec<(&str, &str, usize)>) -> DocumentFile {
        DocumentFile {
            document_id: "doc-test".into(),
            clauses: clauses
                .into_iter()
                .map(|(id, text, position)| ClauseEntry {
                    id: id.into(),
                    section: String::new(),
                    number: String::new(),
                    text: text.into(),
                    position,
                })
                .collect(),
        }
    }

    #[test]
    fn offline_scan_flags_high_tier_language() {
        let d = doc(vec![
            (
                "c1",
                "The Company reserves the right to terminate your account at any time without notice.",
                0,
            ),
            ("c2", "Invoices are payable within thirty days of receipt.", 1),
        ]);
        let report = offline_scan(&d, &AnalyzerConfig::default());
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].severity, Severity::High);
        assert!(report.risk_score > 1);
    }

    #[test]
    fn offline_scan_benign_document_is_clean() {
        let d = doc(vec![(
            "c1",
            "Either party may provide notices by email to the addresses listed above.",
            0,
        )]);
        let report = offline_scan(&d, &AnalyzerConfig::default());
        assert!(report.anomalies.is_empty());
        assert_eq!(report.risk_score, 1);
        assert_eq!(report.total_cost_usd, 0.0);
    }

    #[test]
    fn load_document_rejects_malformed_json() {
        let dir = std::env::temp_dir();
        let path = dir.join("clauseguard-bad-doc.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, clauseguard_core::Error::Json(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_document_surfaces_missing_file_as_io() {
        let path = std::env::temp_dir().join("clauseguard-no-such-doc.json");
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, clauseguard_core::Error::Io(_)));
    }
}
