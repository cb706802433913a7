//! Lexical indicator matching
//!
//! A categorized library of regex patterns, grouped into high and medium risk
//! tiers. Scanning is a pure function of the clause text and the library.
//! Clauses under the length floor are skipped entirely — short boilerplate
//! fragments otherwise dominate false positives.

use clauseguard_core::types::{Clause, IndicatorMatch, RiskCategory, RiskTier};
use regex::Regex;

/// One compiled pattern, tagged with its category and tier.
pub struct IndicatorPattern {
    pub category: RiskCategory,
    pub tier: RiskTier,
    pub weight: f32,
    regex: Regex,
}

/// The categorized pattern library.
pub struct IndicatorLibrary {
    patterns: Vec<IndicatorPattern>,
}

impl IndicatorLibrary {
    pub fn new(patterns: Vec<IndicatorPattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[IndicatorPattern] {
        &self.patterns
    }

    /// Compile one pattern. Panics on an invalid regex — the default library
    /// is static and custom libraries are built at startup.
    pub fn pattern(
        category: RiskCategory,
        tier: RiskTier,
        weight: f32,
        regex: &str,
    ) -> IndicatorPattern {
        IndicatorPattern {
            category,
            tier,
            weight,
            regex: Regex::new(regex).unwrap_or_else(|e| panic!("bad indicator regex {regex:?}: {e}")),
        }
    }
}

impl Default for IndicatorLibrary {
    fn default() -> Self {
        use RiskCategory::*;
        use RiskTier::*;
        let p = Self::pattern;

        Self::new(vec![
            // --- High tier ---
            p(
                UnilateralTermination,
                High,
                0.95,
                r"(?i)\b(?:may|can|reserves?\s+the\s+right\s+to)\s+(?:terminate|suspend|close|deactivate)\b[^.;]{0,120}?\b(?:at\s+any\s+time|without\s+(?:prior\s+)?notice|for\s+any\s+reason|at\s+(?:our|its)\s+(?:sole\s+)?discretion)",
            ),
            p(
                UnilateralTermination,
                High,
                0.9,
                r"(?i)\bterminat\w+[^.;]{0,80}?\bwith\s+or\s+without\s+(?:cause|notice)\b",
            ),
            p(
                ArbitrationWaiver,
                High,
                0.9,
                r"(?i)\b(?:binding|mandatory|final)\s+arbitration\b",
            ),
            p(
                ArbitrationWaiver,
                High,
                0.85,
                r"(?i)\bwaiv\w+[^.;]{0,80}?\b(?:right\s+to\s+)?(?:a\s+)?(?:jury\s+)?trial\b",
            ),
            p(
                ClassActionWaiver,
                High,
                0.9,
                r"(?i)\b(?:no\s+|waiv(?:e[sd]?|er)\s+(?:of\s+)?(?:any\s+)?|not\s+(?:to\s+)?(?:bring|join|participate\s+in)\s+(?:a|any)\s+)class\s+(?:action|proceeding)\b",
            ),
            p(
                DataSale,
                High,
                0.9,
                r"(?i)\b(?:sell|rent|trade|share)\b[^.;]{0,80}?\b(?:personal\s+(?:data|information)|user\s+data)\b[^.;]{0,80}?\bthird\s+part",
            ),
            p(
                DataSale,
                High,
                0.85,
                r"(?i)\bpersonal\s+(?:data|information)\b[^.;]{0,100}?\b(?:may\s+be\s+)?(?:sold|transferred|disclosed)\s+to\s+third\s+part",
            ),
            p(
                PerpetualLicense,
                High,
                0.9,
                r"(?i)\b(?:perpetual|irrevocable|royalty-free|worldwide)\b[^.;]{0,60}?\blicen[sc]e\b[^.;]{0,100}?\b(?:content|submissions?|materials?)\b",
            ),
            p(
                LiabilityWaiver,
                High,
                0.85,
                r"(?i)\b(?:shall|will)\s+not\s+be\s+liable\b[^.;]{0,120}?\b(?:any|all)\s+(?:damages|losses|claims)\b",
            ),
            p(
                LiabilityWaiver,
                High,
                0.85,
                r"(?i)\bdisclaims?\s+(?:any\s+and\s+)?all\s+(?:liability|warranties)\b",
            ),
            // --- Medium tier ---
            p(
                AutoRenewal,
                Medium,
                0.8,
                r"(?i)\b(?:automatic(?:ally)?\s+renew|auto-?renew)\w*\b",
            ),
            p(
                AutoRenewal,
                Medium,
                0.7,
                r"(?i)\brenew\w*\s+(?:automatically\s+)?(?:for\s+successive|unless\s+(?:you\s+)?cancel)",
            ),
            p(NoRefund, Medium, 0.8, r"(?i)\b(?:no|non)[- ]?refund\w*\b"),
            p(
                NoRefund,
                Medium,
                0.75,
                r"(?i)\b(?:fees?|payments?|charges?)\s+(?:are|is)\s+(?:final\s+and\s+)?non-?refundable\b",
            ),
            p(
                PriceIncreaseNoNotice,
                Medium,
                0.8,
                r"(?i)\b(?:change|increase|adjust|modify)\b[^.;]{0,60}?\b(?:price|pricing|fees?|rates?)\b[^.;]{0,80}?\b(?:at\s+any\s+time|without\s+(?:prior\s+)?notice)",
            ),
            p(
                UnilateralChanges,
                Medium,
                0.75,
                r"(?i)\b(?:modify|amend|change|update)\b[^.;]{0,60}?\b(?:these\s+)?(?:terms|agreement|policy)\b[^.;]{0,80}?\b(?:at\s+any\s+time|without\s+notice|(?:our|its)\s+(?:sole\s+)?discretion)",
            ),
            p(
                ForeignJurisdiction,
                Medium,
                0.7,
                r"(?i)\b(?:exclusive\s+jurisdiction|governed\s+by\s+the\s+laws?\s+of)\b[^.;]{0,80}?\b(?:courts?\s+(?:of|in|located)|venue)\b",
            ),
            p(
                FeeOnExit,
                Medium,
                0.75,
                r"(?i)\b(?:early\s+termination|cancellation|deactivation)\s+fee\b",
            ),
        ])
    }
}

/// Pure lexical scanner over one clause.
pub struct IndicatorMatcher {
    library: IndicatorLibrary,
    min_clause_chars: usize,
}

impl IndicatorMatcher {
    pub fn new(library: IndicatorLibrary, min_clause_chars: usize) -> Self {
        Self {
            library,
            min_clause_chars,
        }
    }

    /// Scan a clause against the library. At most one match per pattern.
    /// Clauses under the length floor produce no matches at all.
    pub fn scan(&self, clause: &Clause) -> Vec<IndicatorMatch> {
        if clause.text.trim().chars().count() < self.min_clause_chars {
            return Vec::new();
        }

        self.library
            .patterns()
            .iter()
            .filter_map(|pat| {
                pat.regex.find(&clause.text).map(|m| IndicatorMatch {
                    clause: clause.id.clone(),
                    category: pat.category,
                    tier: pat.tier,
                    span: (m.start(), m.end()),
                    snippet: truncate(m.as_str(), 140),
                    weight: pat.weight,
                })
            })
            .collect()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clauseguard_core::types::ClauseId;

    fn clause(text: &str) -> Clause {
        Clause {
            id: ClauseId::from("c1"),
            section: "General".into(),
            number: "1.1".into(),
            text: text.into(),
            position: 0,
        }
    }

    fn matcher() -> IndicatorMatcher {
        IndicatorMatcher::new(IndicatorLibrary::default(), 25)
    }

    #[test]
    fn termination_at_any_time_is_high_tier() {
        let matches = matcher().scan(&clause(
            "We may terminate your account at any time for any reason without liability to you.",
        ));
        assert!(!matches.is_empty());
        let m = matches
            .iter()
            .find(|m| m.category == RiskCategory::UnilateralTermination)
            .expect("termination indicator");
        assert_eq!(m.tier, RiskTier::High);
        assert!(m.snippet.to_lowercase().contains("terminate"));
    }

    #[test]
    fn auto_renewal_is_medium_tier() {
        let matches = matcher().scan(&clause(
            "Your subscription will automatically renew for successive monthly periods unless you cancel.",
        ));
        let m = matches
            .iter()
            .find(|m| m.category == RiskCategory::AutoRenewal)
            .expect("auto-renewal indicator");
        assert_eq!(m.tier, RiskTier::Medium);
    }

    #[test]
    fn short_fragment_is_skipped() {
        // Would match the no-refund pattern if not for the length floor.
        let matches = matcher().scan(&clause("No refunds."));
        assert!(matches.is_empty());
    }

    #[test]
    fn benign_clause_matches_nothing() {
        let matches = matcher().scan(&clause(
            "You may contact our support team by email during normal business hours.",
        ));
        assert!(matches.is_empty());
    }

    #[test]
    fn span_points_into_clause_text() {
        let text = "All fees are final and non-refundable once charged to your card.";
        let matches = matcher().scan(&clause(text));
        let m = matches
            .iter()
            .find(|m| m.category == RiskCategory::NoRefund)
            .expect("no-refund indicator");
        assert_eq!(&text[m.span.0..m.span.1], m.snippet.as_str());
    }

    #[test]
    fn multiple_categories_in_one_clause() {
        let matches = matcher().scan(&clause(
            "This agreement is subject to binding arbitration and you waive any class action proceeding.",
        ));
        let cats: Vec<_> = matches.iter().map(|m| m.category).collect();
        assert!(cats.contains(&RiskCategory::ArbitrationWaiver));
        assert!(cats.contains(&RiskCategory::ClassActionWaiver));
    }
}
