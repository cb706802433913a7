//! Compound risk detection across the whole document
//!
//! Some risk only manifests as a combination: no single clause of a
//! subscription trap is alarming on its own. Each pattern declares a required
//! category subset that must all be present somewhere in the document, plus
//! an optional bonus set that raises confidence without being required.

use clauseguard_core::types::{CompoundRiskFinding, RiskCategory};
use std::collections::HashSet;

pub struct CompoundPattern {
    pub id: &'static str,
    pub name: &'static str,
    pub required: Vec<RiskCategory>,
    pub optional: Vec<RiskCategory>,
    pub base_confidence: f32,
    pub optional_bonus: f32,
}

pub struct CompoundRiskDetector {
    patterns: Vec<CompoundPattern>,
}

impl Default for CompoundRiskDetector {
    fn default() -> Self {
        use RiskCategory::*;
        Self::new(vec![
            CompoundPattern {
                id: "subscription-trap",
                name: "Subscription trap",
                required: vec![AutoRenewal, NoRefund, PriceIncreaseNoNotice],
                optional: vec![FeeOnExit],
                base_confidence: 0.85,
                optional_bonus: 0.05,
            },
            CompoundPattern {
                id: "rights-stripping",
                name: "Dispute rights stripping",
                required: vec![ArbitrationWaiver, ClassActionWaiver],
                optional: vec![ForeignJurisdiction],
                base_confidence: 0.9,
                optional_bonus: 0.05,
            },
            CompoundPattern {
                id: "data-exploitation",
                name: "Data exploitation",
                required: vec![DataSale, PerpetualLicense],
                optional: vec![UnilateralChanges],
                base_confidence: 0.85,
                optional_bonus: 0.05,
            },
            CompoundPattern {
                id: "accountability-void",
                name: "Accountability void",
                required: vec![LiabilityWaiver, UnilateralTermination],
                optional: vec![NoRefund, UnilateralChanges],
                base_confidence: 0.8,
                optional_bonus: 0.05,
            },
        ])
    }
}

impl CompoundRiskDetector {
    pub fn new(patterns: Vec<CompoundPattern>) -> Self {
        Self { patterns }
    }

    /// Evaluate every pattern against the union of categories matched
    /// anywhere in the document. A pattern fires iff its full required set is
    /// present; each optional category found adds to confidence.
    pub fn detect(&self, present: &HashSet<RiskCategory>) -> Vec<CompoundRiskFinding> {
        self.patterns
            .iter()
            .filter_map(|pattern| {
                if !pattern.required.iter().all(|c| present.contains(c)) {
                    return None;
                }
                let bonus_present: Vec<RiskCategory> = pattern
                    .optional
                    .iter()
                    .filter(|c| present.contains(c))
                    .copied()
                    .collect();
                let confidence = (pattern.base_confidence
                    + pattern.optional_bonus * bonus_present.len() as f32)
                    .min(1.0);
                Some(CompoundRiskFinding {
                    pattern_id: pattern.id.to_string(),
                    name: pattern.name.to_string(),
                    categories_present: pattern.required.clone(),
                    bonus_present,
                    confidence,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use RiskCategory::*;

    fn present(cats: &[RiskCategory]) -> HashSet<RiskCategory> {
        cats.iter().copied().collect()
    }

    #[test]
    fn partial_required_set_produces_nothing() {
        let detector = CompoundRiskDetector::default();
        let findings = detector.detect(&present(&[AutoRenewal, NoRefund]));
        assert!(
            !findings.iter().any(|f| f.pattern_id == "subscription-trap"),
            "pattern must not fire without the full required set"
        );
    }

    #[test]
    fn completing_required_set_produces_exactly_one_finding() {
        let detector = CompoundRiskDetector::default();
        let findings =
            detector.detect(&present(&[AutoRenewal, NoRefund, PriceIncreaseNoNotice]));
        let traps: Vec<_> = findings
            .iter()
            .filter(|f| f.pattern_id == "subscription-trap")
            .collect();
        assert_eq!(traps.len(), 1);
        assert!(traps[0].bonus_present.is_empty());
        assert!((traps[0].confidence - 0.85).abs() < 1e-6);
    }

    #[test]
    fn optional_categories_raise_confidence() {
        let detector = CompoundRiskDetector::default();
        let findings = detector.detect(&present(&[
            AutoRenewal,
            NoRefund,
            PriceIncreaseNoNotice,
            FeeOnExit,
        ]));
        let trap = findings
            .iter()
            .find(|f| f.pattern_id == "subscription-trap")
            .unwrap();
        assert_eq!(trap.bonus_present, vec![FeeOnExit]);
        assert!((trap.confidence - 0.90).abs() < 1e-6);
    }

    #[test]
    fn confidence_caps_at_one() {
        let detector = CompoundRiskDetector::new(vec![CompoundPattern {
            id: "p",
            name: "p",
            required: vec![DataSale],
            optional: vec![AutoRenewal, NoRefund, FeeOnExit],
            base_confidence: 0.95,
            optional_bonus: 0.1,
        }]);
        let findings = detector.detect(&present(&[DataSale, AutoRenewal, NoRefund, FeeOnExit]));
        assert_eq!(findings[0].confidence, 1.0);
    }

    #[test]
    fn multiple_patterns_can_fire_together() {
        let detector = CompoundRiskDetector::default();
        let findings = detector.detect(&present(&[
            AutoRenewal,
            NoRefund,
            PriceIncreaseNoNotice,
            ArbitrationWaiver,
            ClassActionWaiver,
        ]));
        let ids: Vec<_> = findings.iter().map(|f| f.pattern_id.as_str()).collect();
        assert!(ids.contains(&"subscription-trap"));
        assert!(ids.contains(&"rights-stripping"));
    }
}
