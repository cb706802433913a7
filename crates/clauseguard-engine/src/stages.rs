//! Two analysis depths over one capability
//!
//! Both stages produce an explanation plus a confidence estimate for a
//! clause given its already-resolved severity. Stage 1 runs a cheap model on
//! a short prompt; Stage 2 runs the deep model with full signal and
//! document-level compound context. Neither stage can touch the severity —
//! it arrives resolved and is only echoed into the prompt as context.

use clauseguard_core::types::{
    Clause, CompoundRiskFinding, SeverityVerdict, SignalBundle, Stage,
};
use clauseguard_llm::provider::{
    Completion, CompletionProvider, CompletionRequest, LlmError, LlmResult,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Everything a stage needs to explain one clause.
pub struct StageRequest {
    pub clause: Clause,
    pub verdict: SeverityVerdict,
    pub signals: SignalBundle,
    /// Compound findings the clause's categories participate in.
    pub compound: Vec<CompoundRiskFinding>,
}

/// A stage's explanation of a flagged clause.
#[derive(Clone, Debug)]
pub struct StageAssessment {
    pub explanation: String,
    pub consumer_impact: Option<String>,
    pub recommendation: Option<String>,
    /// The stage's estimate of its own explanation's adequacy, in [0, 1].
    pub confidence: f32,
    pub cost_usd: f64,
}

/// Produce an explanation + confidence for a clause given its severity.
#[async_trait::async_trait]
pub trait StageAnalyzer: Send + Sync {
    fn stage(&self) -> Stage;

    async fn assess(&self, request: &StageRequest) -> LlmResult<StageAssessment>;
}

const STAGE1_SYSTEM: &str = "You are a consumer-protection analyst reviewing contract clauses. \
The clause's severity has already been determined by deterministic rules and is not up for \
debate — explain it, do not re-judge it. Reply with ONLY a JSON object, no prose around it: \
{\"explanation\": string, \"consumer_impact\": string, \"recommendation\": string, \
\"confidence\": number between 0 and 1}. Set confidence to how adequate you judge your own \
explanation to be for this clause.";

const STAGE2_SYSTEM: &str = "You are a senior consumer-protection analyst performing a deep \
review of a contract clause that a first-pass analysis could not explain confidently. The \
severity is fixed by deterministic rules — your job is the explanation, not the verdict. \
Reason carefully about the clause in its document context before answering. Reply with ONLY \
a JSON object: {\"explanation\": string, \"consumer_impact\": string, \"recommendation\": \
string, \"confidence\": number between 0 and 1}.";

/// What the model must return. Missing optional fields degrade gracefully.
#[derive(Deserialize)]
struct AssessmentJson {
    explanation: String,
    #[serde(default)]
    consumer_impact: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
    confidence: f32,
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_assessment(completion: &Completion, cost_usd: f64) -> LlmResult<StageAssessment> {
    let json = strip_fence(&completion.text);
    let parsed: AssessmentJson = serde_json::from_str(json)
        .map_err(|e| LlmError::InvalidResponse(format!("assessment schema violation: {e}")))?;

    Ok(StageAssessment {
        explanation: parsed.explanation,
        consumer_impact: parsed.consumer_impact,
        recommendation: parsed.recommendation,
        confidence: parsed.confidence.clamp(0.0, 1.0),
        cost_usd,
    })
}

fn signal_summary(request: &StageRequest) -> String {
    let mut lines = Vec::new();
    for m in &request.signals.indicators {
        lines.push(format!(
            "- indicator [{:?}] {}: \"{}\"",
            m.tier,
            m.category.as_str(),
            m.snippet
        ));
    }
    if let Some(s) = &request.signals.semantic {
        lines.push(format!(
            "- semantic match {} ({}, similarity {:.2})",
            s.template_id,
            s.category.as_str(),
            s.similarity
        ));
    }
    let p = &request.signals.prevalence;
    lines.push(format!(
        "- prevalence {:.2}{}",
        p.prevalence,
        if p.defaulted { " (defaulted: no corpus coverage)" } else { "" }
    ));
    lines.join("\n")
}

/// Cheap, fast first pass.
pub struct Stage1Classifier {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    usd_per_1k_tokens: f64,
}

impl Stage1Classifier {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        model: impl Into<String>,
        usd_per_1k_tokens: f64,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            usd_per_1k_tokens,
        }
    }
}

#[async_trait::async_trait]
impl StageAnalyzer for Stage1Classifier {
    fn stage(&self) -> Stage {
        Stage::One
    }

    async fn assess(&self, request: &StageRequest) -> LlmResult<StageAssessment> {
        let prompt = format!(
            "Clause {} (section {}, severity {}):\n\n{}\n\nSignals:\n{}",
            request.clause.number,
            request.clause.section,
            request.verdict.severity.as_str(),
            request.clause.text,
            signal_summary(request),
        );

        let completion = self
            .provider
            .complete(CompletionRequest {
                model: self.model.clone(),
                system: Some(STAGE1_SYSTEM.to_string()),
                prompt,
                max_tokens: 512,
                temperature: Some(0.0),
            })
            .await?;

        let cost = completion.usage.total() as f64 / 1000.0 * self.usd_per_1k_tokens;
        debug!(model = %self.model, cost_usd = cost, "stage1 completion");
        parse_assessment(&completion, cost)
    }
}

/// Expensive, deliberate second pass — invoked only on escalation.
pub struct Stage2Analyzer {
    provider: Arc<dyn CompletionProvider>,
    model: String,
    usd_per_1k_tokens: f64,
}

impl Stage2Analyzer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        model: impl Into<String>,
        usd_per_1k_tokens: f64,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            usd_per_1k_tokens,
        }
    }
}

#[async_trait::async_trait]
impl StageAnalyzer for Stage2Analyzer {
    fn stage(&self) -> Stage {
        Stage::Two
    }

    async fn assess(&self, request: &StageRequest) -> LlmResult<StageAssessment> {
        let compound = if request.compound.is_empty() {
            String::from("none")
        } else {
            request
                .compound
                .iter()
                .map(|f| format!("- {} (confidence {:.2})", f.name, f.confidence))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let prompt = format!(
            "Clause {} in section \"{}\" of a consumer agreement, resolved severity {} \
             (basis: {:?}).\n\nFull clause text:\n{}\n\nDeterministic signals:\n{}\n\n\
             Document-level compound risk patterns this clause participates in:\n{}",
            request.clause.number,
            request.clause.section,
            request.verdict.severity.as_str(),
            request.verdict.basis,
            request.clause.text,
            signal_summary(request),
            compound,
        );

        let completion = self
            .provider
            .complete(CompletionRequest {
                model: self.model.clone(),
                system: Some(STAGE2_SYSTEM.to_string()),
                prompt,
                max_tokens: 2048,
                temperature: Some(0.2),
            })
            .await?;

        let cost = completion.usage.total() as f64 / 1000.0 * self.usd_per_1k_tokens;
        debug!(model = %self.model, cost_usd = cost, "stage2 completion");
        parse_assessment(&completion, cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauseguard_llm::provider::Usage;

    fn completion(text: &str) -> Completion {
        Completion {
            text: text.into(),
            usage: Usage {
                input_tokens: 100,
                output_tokens: 50,
            },
        }
    }

    #[test]
    fn parses_bare_json() {
        let c = completion(
            r#"{"explanation": "e", "consumer_impact": "i", "recommendation": "r", "confidence": 0.8}"#,
        );
        let a = parse_assessment(&c, 0.01).unwrap();
        assert_eq!(a.explanation, "e");
        assert_eq!(a.consumer_impact.as_deref(), Some("i"));
        assert_eq!(a.confidence, 0.8);
        assert_eq!(a.cost_usd, 0.01);
    }

    #[test]
    fn parses_fenced_json() {
        let c = completion("```json\n{\"explanation\": \"e\", \"confidence\": 0.4}\n```");
        let a = parse_assessment(&c, 0.0).unwrap();
        assert_eq!(a.explanation, "e");
        assert!(a.consumer_impact.is_none());
    }

    #[test]
    fn malformed_json_is_invalid_response() {
        let c = completion("The clause is risky because...");
        let err = parse_assessment(&c, 0.0).unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
        assert!(!err.is_transient(), "schema violations must not be retried");
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let c = completion(r#"{"explanation": "e", "confidence": 1.7}"#);
        assert_eq!(parse_assessment(&c, 0.0).unwrap().confidence, 1.0);
        let c = completion(r#"{"explanation": "e", "confidence": -0.3}"#);
        assert_eq!(parse_assessment(&c, 0.0).unwrap().confidence, 0.0);
    }
}
