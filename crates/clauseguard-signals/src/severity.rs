//! Severity resolution — the deterministic policy stage
//!
//! Pure function of the signal bundle with a fixed precedence: any high-tier
//! indicator (lexical or semantic) wins, then medium-tier, then rarity alone.
//! Nothing in this module sees model output; stages downstream attach
//! explanation text to the verdict as metadata afterwards. A disagreeing
//! model therefore cannot cause a false negative here.

use clauseguard_core::types::{
    RiskTier, SeverityBasis, SeverityVerdict, Severity, SignalBundle,
};

/// Resolve a clause's severity from its signals. `None` means the clause is
/// not anomalous and produces no record.
pub fn resolve_severity(bundle: &SignalBundle, rarity_threshold: f32) -> Option<SeverityVerdict> {
    let clause = bundle.prevalence.clause.clone();

    let has_tier = |tier: RiskTier| {
        bundle.indicators.iter().any(|m| m.tier == tier)
            || bundle.semantic.as_ref().map_or(false, |s| s.tier == tier)
    };

    if has_tier(RiskTier::High) {
        return Some(SeverityVerdict {
            clause,
            severity: Severity::High,
            basis: SeverityBasis::HighIndicator,
        });
    }

    if has_tier(RiskTier::Medium) {
        return Some(SeverityVerdict {
            clause,
            severity: Severity::Medium,
            basis: SeverityBasis::MediumIndicator,
        });
    }

    // No lexical or semantic match: flag on rarity alone, at low severity.
    if bundle.prevalence.is_unusual(rarity_threshold) {
        return Some(SeverityVerdict {
            clause,
            severity: Severity::Low,
            basis: SeverityBasis::RarityOnly,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauseguard_core::types::{
        ClauseId, IndicatorMatch, PrevalenceScore, RiskCategory, SemanticMatch,
    };

    fn indicator(tier: RiskTier) -> IndicatorMatch {
        IndicatorMatch {
            clause: ClauseId::from("c1"),
            category: RiskCategory::UnilateralTermination,
            tier,
            span: (0, 10),
            snippet: "may terminate".into(),
            weight: 0.9,
        }
    }

    fn semantic(tier: RiskTier) -> SemanticMatch {
        SemanticMatch {
            clause: ClauseId::from("c1"),
            template_id: "tmpl-x".into(),
            category: RiskCategory::DataSale,
            tier,
            similarity: 0.91,
        }
    }

    fn prevalence(value: f32) -> PrevalenceScore {
        PrevalenceScore {
            clause: ClauseId::from("c1"),
            prevalence: value,
            neighbors_considered: 10,
            defaulted: false,
        }
    }

    fn bundle(
        indicators: Vec<IndicatorMatch>,
        prev: f32,
        sem: Option<SemanticMatch>,
    ) -> SignalBundle {
        SignalBundle {
            indicators,
            prevalence: prevalence(prev),
            semantic: sem,
        }
    }

    #[test]
    fn high_indicator_wins_over_everything() {
        let b = bundle(
            vec![indicator(RiskTier::High), indicator(RiskTier::Medium)],
            0.9,
            None,
        );
        let v = resolve_severity(&b, 0.15).unwrap();
        assert_eq!(v.severity, Severity::High);
        assert_eq!(v.basis, SeverityBasis::HighIndicator);
    }

    #[test]
    fn semantic_high_tier_counts_as_high() {
        let b = bundle(vec![], 0.9, Some(semantic(RiskTier::High)));
        let v = resolve_severity(&b, 0.15).unwrap();
        assert_eq!(v.severity, Severity::High);
    }

    #[test]
    fn medium_indicator_resolves_medium() {
        let b = bundle(vec![indicator(RiskTier::Medium)], 0.9, None);
        let v = resolve_severity(&b, 0.15).unwrap();
        assert_eq!(v.severity, Severity::Medium);
        assert_eq!(v.basis, SeverityBasis::MediumIndicator);
    }

    #[test]
    fn rare_clause_without_matches_resolves_low() {
        let b = bundle(vec![], 0.05, None);
        let v = resolve_severity(&b, 0.15).unwrap();
        assert_eq!(v.severity, Severity::Low);
        assert_eq!(v.basis, SeverityBasis::RarityOnly);
    }

    #[test]
    fn common_clause_without_matches_is_not_anomalous() {
        let b = bundle(vec![], 0.8, None);
        assert!(resolve_severity(&b, 0.15).is_none());
    }

    #[test]
    fn rarity_does_not_outrank_medium() {
        let b = bundle(vec![indicator(RiskTier::Medium)], 0.01, None);
        let v = resolve_severity(&b, 0.15).unwrap();
        assert_eq!(v.severity, Severity::Medium);
    }
}
