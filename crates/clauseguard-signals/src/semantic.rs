//! Semantic matching against the risky-clause template library
//!
//! Recovers risky clauses that evade lexical matching through paraphrase:
//! each template is a known-risky clause wording, embedded once per run, and
//! a clause embedding is compared against all of them by cosine similarity.
//! Only the best match is returned, and only if it clears the threshold.

use clauseguard_core::types::{ClauseId, RiskCategory, RiskTier, SemanticMatch};
use clauseguard_llm::cosine::cosine_sim;
use clauseguard_llm::provider::{EmbeddingProvider, LlmResult};
use tracing::debug;

/// A template before embedding: id, tags, and the canonical risky wording.
pub struct TemplateSpec {
    pub id: &'static str,
    pub category: RiskCategory,
    pub tier: RiskTier,
    pub text: &'static str,
}

/// An embedded template ready for matching.
pub struct RiskTemplate {
    pub id: String,
    pub category: RiskCategory,
    pub tier: RiskTier,
    pub embedding: Vec<f32>,
}

/// The curated library of known-risky clause wordings.
pub fn default_template_specs() -> Vec<TemplateSpec> {
    use RiskCategory::*;
    use RiskTier::*;
    vec![
        TemplateSpec {
            id: "tmpl-unilateral-termination",
            category: UnilateralTermination,
            tier: High,
            text: "We reserve the right to terminate or suspend your account at any time, \
                   for any reason or no reason, without notice or liability.",
        },
        TemplateSpec {
            id: "tmpl-arbitration",
            category: ArbitrationWaiver,
            tier: High,
            text: "Any dispute arising under this agreement shall be resolved exclusively \
                   through final and binding arbitration, and you waive your right to a jury trial.",
        },
        TemplateSpec {
            id: "tmpl-class-action",
            category: ClassActionWaiver,
            tier: High,
            text: "You agree to bring claims only in your individual capacity and waive any \
                   right to participate in a class action or representative proceeding.",
        },
        TemplateSpec {
            id: "tmpl-data-sale",
            category: DataSale,
            tier: High,
            text: "We may share, transfer, or sell your personal information to third parties, \
                   including advertisers and data brokers, for any business purpose.",
        },
        TemplateSpec {
            id: "tmpl-perpetual-license",
            category: PerpetualLicense,
            tier: High,
            text: "You grant us a perpetual, irrevocable, worldwide, royalty-free license to \
                   use, reproduce, and distribute any content you submit.",
        },
        TemplateSpec {
            id: "tmpl-liability-waiver",
            category: LiabilityWaiver,
            tier: High,
            text: "Under no circumstances shall the company be liable for any direct, indirect, \
                   incidental, or consequential damages arising from your use of the service.",
        },
        TemplateSpec {
            id: "tmpl-auto-renewal",
            category: AutoRenewal,
            tier: Medium,
            text: "Your subscription automatically renews at the end of each billing period \
                   unless you cancel before the renewal date.",
        },
        TemplateSpec {
            id: "tmpl-no-refund",
            category: NoRefund,
            tier: Medium,
            text: "All payments are final and non-refundable, including in the event of \
                   cancellation or termination of the service.",
        },
        TemplateSpec {
            id: "tmpl-price-increase",
            category: PriceIncreaseNoNotice,
            tier: Medium,
            text: "We may change our fees and pricing at any time without prior notice, \
                   effective immediately upon posting.",
        },
        TemplateSpec {
            id: "tmpl-unilateral-changes",
            category: UnilateralChanges,
            tier: Medium,
            text: "We may modify these terms at any time at our sole discretion, and your \
                   continued use constitutes acceptance of the modified terms.",
        },
    ]
}

pub struct SemanticRiskMatcher {
    templates: Vec<RiskTemplate>,
    threshold: f32,
}

impl SemanticRiskMatcher {
    pub fn new(templates: Vec<RiskTemplate>, threshold: f32) -> Self {
        Self { templates, threshold }
    }

    /// Embed the template library through the provider. Done once per run so
    /// template vectors always come from the same model as clause vectors.
    pub async fn build(
        embedder: &dyn EmbeddingProvider,
        specs: Vec<TemplateSpec>,
        threshold: f32,
    ) -> LlmResult<Self> {
        let mut templates = Vec::with_capacity(specs.len());
        for spec in specs {
            let embedding = embedder.embed(spec.text).await?;
            templates.push(RiskTemplate {
                id: spec.id.to_string(),
                category: spec.category,
                tier: spec.tier,
                embedding,
            });
        }
        debug!(count = templates.len(), "embedded risk template library");
        Ok(Self::new(templates, threshold))
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Best template match for a clause embedding, if it clears the threshold.
    pub fn best_match(&self, clause: ClauseId, embedding: &[f32]) -> Option<SemanticMatch> {
        let mut best: Option<(&RiskTemplate, f32)> = None;
        for template in &self.templates {
            let sim = cosine_sim(embedding, &template.embedding);
            if best.map_or(true, |(_, b)| sim > b) {
                best = Some((template, sim));
            }
        }

        let (template, similarity) = best?;
        if similarity < self.threshold {
            return None;
        }
        Some(SemanticMatch {
            clause,
            template_id: template.id.clone(),
            category: template.category,
            tier: template.tier,
            similarity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: &str, tier: RiskTier, embedding: Vec<f32>) -> RiskTemplate {
        RiskTemplate {
            id: id.into(),
            category: RiskCategory::DataSale,
            tier,
            embedding,
        }
    }

    #[test]
    fn below_threshold_returns_none() {
        let matcher = SemanticRiskMatcher::new(
            vec![template("t1", RiskTier::High, vec![1.0, 0.0])],
            0.86,
        );
        // 45 degrees apart: cosine ~0.707.
        assert!(matcher.best_match("c1".into(), &[1.0, 1.0]).is_none());
    }

    #[test]
    fn best_of_several_templates_wins() {
        let matcher = SemanticRiskMatcher::new(
            vec![
                template("weak", RiskTier::Medium, vec![1.0, 1.0, 0.0]),
                template("strong", RiskTier::High, vec![0.0, 1.0, 0.0]),
            ],
            0.86,
        );
        let m = matcher
            .best_match("c1".into(), &[0.05, 1.0, 0.0])
            .expect("match above threshold");
        assert_eq!(m.template_id, "strong");
        assert!(m.similarity > 0.99);
    }

    #[test]
    fn empty_library_never_matches() {
        let matcher = SemanticRiskMatcher::new(vec![], 0.5);
        assert!(matcher.best_match("c1".into(), &[1.0]).is_none());
    }

    #[test]
    fn default_specs_cover_both_tiers() {
        let specs = default_template_specs();
        assert!(specs.iter().any(|s| s.tier == RiskTier::High));
        assert!(specs.iter().any(|s| s.tier == RiskTier::Medium));
    }
}
