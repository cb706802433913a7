//! Shared data model: clauses, signals, verdicts, and report records.
//!
//! Severity is derived exclusively from deterministic signals
//! ([`SignalBundle`]); model output is attached afterwards as annotation and
//! has no path back into [`SeverityVerdict`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Clause identifier — cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ClauseId(Arc<str>);

impl ClauseId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClauseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ClauseId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ClauseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Serialize for ClauseId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ClauseId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(s))
    }
}

/// Smallest addressable unit of document text subject to independent
/// risk analysis. Immutable once extracted; owned by the document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clause {
    pub id: ClauseId,
    pub section: String,
    pub number: String,
    pub text: String,
    /// Position within the document, for stable report ordering.
    pub position: usize,
}

/// Risk tier of an indicator or template.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    High,
    Medium,
}

/// Fixed taxonomy of risk categories.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskCategory {
    AutoRenewal,
    UnilateralTermination,
    NoRefund,
    PriceIncreaseNoNotice,
    UnilateralChanges,
    ArbitrationWaiver,
    ClassActionWaiver,
    DataSale,
    PerpetualLicense,
    LiabilityWaiver,
    ForeignJurisdiction,
    FeeOnExit,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoRenewal => "auto_renewal",
            Self::UnilateralTermination => "unilateral_termination",
            Self::NoRefund => "no_refund",
            Self::PriceIncreaseNoNotice => "price_increase_no_notice",
            Self::UnilateralChanges => "unilateral_changes",
            Self::ArbitrationWaiver => "arbitration_waiver",
            Self::ClassActionWaiver => "class_action_waiver",
            Self::DataSale => "data_sale",
            Self::PerpetualLicense => "perpetual_license",
            Self::LiabilityWaiver => "liability_waiver",
            Self::ForeignJurisdiction => "foreign_jurisdiction",
            Self::FeeOnExit => "fee_on_exit",
        }
    }
}

/// A lexical pattern hit on a clause.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndicatorMatch {
    pub clause: ClauseId,
    pub category: RiskCategory,
    pub tier: RiskTier,
    /// Byte range of the matched span within the clause text.
    pub span: (usize, usize),
    pub snippet: String,
    pub weight: f32,
}

/// Estimated commonness of a clause relative to the reference corpus.
///
/// `defaulted` means the corpus had no qualifying neighbors (cold corpus or
/// truly novel clause) and the conservative "assume rare" default was used.
/// The asymmetry is load-bearing: a missing signal must not suppress
/// detection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrevalenceScore {
    pub clause: ClauseId,
    /// Fraction of near-neighbors above the similarity floor, in [0, 1].
    pub prevalence: f32,
    pub neighbors_considered: usize,
    pub defaulted: bool,
}

impl PrevalenceScore {
    pub fn is_unusual(&self, rarity_threshold: f32) -> bool {
        self.prevalence < rarity_threshold
    }
}

/// Best match against the curated risky-clause template library,
/// retained only when similarity clears the configured threshold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub clause: ClauseId,
    pub template_id: String,
    pub category: RiskCategory,
    pub tier: RiskTier,
    pub similarity: f32,
}

/// The per-clause signal bundle fed to severity resolution.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignalBundle {
    pub indicators: Vec<IndicatorMatch>,
    pub prevalence: PrevalenceScore,
    pub semantic: Option<SemanticMatch>,
}

/// Severity level, ordered from least to most severe.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// What the severity rests on.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeverityBasis {
    HighIndicator,
    MediumIndicator,
    RarityOnly,
}

/// Deterministic severity for a clause. Final once resolved — downstream
/// model output may annotate it with explanation text, never change it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeverityVerdict {
    pub clause: ClauseId,
    pub severity: Severity,
    pub basis: SeverityBasis,
}

/// Risk that only manifests as a combination of categories across the
/// document, not from any single clause.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompoundRiskFinding {
    pub pattern_id: String,
    pub name: String,
    pub categories_present: Vec<RiskCategory>,
    pub bonus_present: Vec<RiskCategory>,
    pub confidence: f32,
}

/// Analysis depth.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Stage {
    One,
    Two,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::One => "stage1",
            Self::Two => "stage2",
        }
    }
}

/// Cache interaction for one attempt. `Bypassed` means the cache store was
/// unavailable and was treated as a permanent miss for that call.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypassed,
}

/// Append-only audit artifact for one stage execution within a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisAttempt {
    pub clause: ClauseId,
    pub stage: Stage,
    pub confidence: Option<f32>,
    pub cost_usd: f64,
    pub cache: CacheStatus,
    pub escalated: bool,
    pub timestamp: DateTime<Utc>,
}

/// Where the accepted explanation came from. Explicit provenance tag so call
/// sites can match exhaustively instead of reading ad hoc flags.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    CacheHit,
    Stage1,
    Stage2,
    /// Both stages failed — the deterministic severity stands on its own.
    IndicatorOnly,
}

/// One flagged clause. Immutable after creation; re-analysis supersedes
/// rather than mutates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: Uuid,
    pub clause: ClauseId,
    pub severity: Severity,
    pub category: Option<RiskCategory>,
    pub explanation: Option<String>,
    pub consumer_impact: Option<String>,
    pub recommendation: Option<String>,
    pub confidence: f32,
    pub source: AnalysisSource,
    pub signals: SignalBundle,
    pub created_at: DateTime<Utc>,
}

/// Output of one document analysis run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub document_id: String,
    /// Weighted aggregate of count, severity mix, and category diversity,
    /// clamped to 1..=10. Not a learned model.
    pub risk_score: u8,
    pub anomalies: Vec<AnomalyRecord>,
    pub compound_findings: Vec<CompoundRiskFinding>,
    pub attempts: Vec<AnalysisAttempt>,
    pub total_cost_usd: f64,
}
