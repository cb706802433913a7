//! Deterministic signal extraction and severity resolution.
//!
//! Everything here is insulated from model output: indicator scanning,
//! prevalence estimation, semantic template matching, compound co-occurrence
//! detection, and the severity policy that combines them. Stages downstream
//! may annotate a verdict with explanation text, never change it.

pub mod compound;
pub mod indicators;
pub mod prevalence;
pub mod semantic;
pub mod severity;

pub use compound::{CompoundPattern, CompoundRiskDetector};
pub use indicators::{IndicatorLibrary, IndicatorMatcher};
pub use prevalence::PrevalenceEstimator;
pub use semantic::{RiskTemplate, SemanticRiskMatcher, TemplateSpec};
pub use severity::resolve_severity;
