//! Plain-text report rendering for terminal output.

use clauseguard_core::types::{AnalysisSource, AnomalyReport, CacheStatus, Severity};
use std::fmt::Write;

pub fn render_report(report: &AnomalyReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Document: {}", report.document_id);
    let _ = writeln!(out, "Risk score: {}/10", report.risk_score);
    let _ = writeln!(out);

    if report.anomalies.is_empty() {
        let _ = writeln!(out, "No anomalous clauses detected.");
    } else {
        let _ = writeln!(out, "Anomalies ({}):", report.anomalies.len());
        for record in &report.anomalies {
            let category = record
                .category
                .map(|c| c.as_str())
                .unwrap_or("uncategorized");
            let _ = writeln!(
                out,
                "  [{}] clause {} ({}) confidence {:.2} via {}",
                severity_label(record.severity),
                record.clause,
                category,
                record.confidence,
                source_label(record.source),
            );
            if let Some(explanation) = &record.explanation {
                let _ = writeln!(out, "      {explanation}");
            }
            if let Some(impact) = &record.consumer_impact {
                let _ = writeln!(out, "      Impact: {impact}");
            }
            if let Some(rec) = &record.recommendation {
                let _ = writeln!(out, "      Suggestion: {rec}");
            }
        }
    }

    if !report.compound_findings.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Compound patterns:");
        for finding in &report.compound_findings {
            let categories: Vec<&str> = finding
                .categories_present
                .iter()
                .map(|c| c.as_str())
                .collect();
            let _ = writeln!(
                out,
                "  {} (confidence {:.2}): {}",
                finding.name,
                finding.confidence,
                categories.join(", "),
            );
        }
    }

    if !report.attempts.is_empty() {
        let hits = report
            .attempts
            .iter()
            .filter(|a| a.cache == CacheStatus::Hit)
            .count();
        let escalations = report.attempts.iter().filter(|a| a.escalated).count();
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Model calls: {} ({} cache hits, {} escalations), cost ${:.4}",
            report.attempts.len(),
            hits,
            escalations,
            report.total_cost_usd,
        );
    }

    out
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "HIGH",
        Severity::Medium => "MED ",
        Severity::Low => "LOW ",
    }
}

fn source_label(source: AnalysisSource) -> &'static str {
    match source {
        AnalysisSource::CacheHit => "cache",
        AnalysisSource::Stage1 => "stage1",
        AnalysisSource::Stage2 => "stage2",
        AnalysisSource::IndicatorOnly => "patterns",
    }
}
