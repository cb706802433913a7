//! Analysis engine: cache, stages, cascade orchestration, and the
//! document-level analyzer that fans clauses out concurrently.

pub mod analyzer;
pub mod cache;
pub mod cascade;
pub mod retry;
pub mod stages;

pub use analyzer::{document_risk_score, DocumentAnalyzer};
pub use cache::{cache_key, AnalysisCache, CacheError, CachedAnalysis, MemoryCache};
pub use cascade::{AnalysisOutcome, CascadeOrchestrator, ClauseAnalysis, CostLedger};
pub use stages::{Stage1Classifier, Stage2Analyzer, StageAnalyzer, StageAssessment, StageRequest};
