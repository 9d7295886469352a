//! Role Classifier: domain and seniority inference from free-text job descriptions.
//!
//! Pure and deterministic: word-boundary keyword counting per career domain,
//! plus ordered title patterns for the role level. No I/O, no shared state;
//! the regex tables are compiled once and safe to use from any task.

use serde::Serialize;
use tracing::debug;

pub mod domains;
pub mod role_level;

pub use domains::{score_domains, Domain, DomainScore};
pub use role_level::{detect_level, RoleLevel};

/// A domain needs at least this many keyword occurrences to qualify.
pub const MIN_DOMAIN_SCORE: u32 = 3;
/// The primary domain must lead the runner-up by this much to be confident.
pub const CONFIDENCE_GAP: u32 = 2;

const MAX_TITLE_CHARS: usize = 120;
const UNKNOWN_TITLE: &str = "Unknown Role";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainClassification {
    pub primary_domain: Option<Domain>,
    pub secondary_domain: Option<Domain>,
    pub confident: bool,
    pub role_level: Option<RoleLevel>,
    pub primary_score: u32,
    /// Best score among the other domains, qualifying or not.
    pub secondary_score: u32,
    pub jd_title: String,
    /// Keywords of the primary domain found in the text.
    #[serde(skip)]
    pub matched_keywords: Vec<&'static str>,
}

impl DomainClassification {
    /// Cross-domain or low-confidence classifications must be called out as ambiguous.
    pub fn is_ambiguous(&self) -> bool {
        self.primary_domain.is_some() && (!self.confident || self.secondary_domain.is_some())
    }
}

/// Stateless classifier. Cheap to copy; holds no data of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleClassifier;

impl RoleClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, text: &str) -> DomainClassification {
        let mut ranked = score_domains(text);
        // Stable sort keeps declaration order among equal scores.
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        let mut ranked = ranked.into_iter();
        let top = ranked.next();
        let runner_up = ranked.next();

        let primary = top.filter(|s| s.score >= MIN_DOMAIN_SCORE);
        let runner_up_score = runner_up.as_ref().map(|s| s.score).unwrap_or(0);
        let secondary = primary
            .as_ref()
            .and(runner_up.filter(|s| s.score >= MIN_DOMAIN_SCORE));

        let primary_score = primary.as_ref().map(|s| s.score).unwrap_or(0);
        let confident = primary.is_some() && primary_score - runner_up_score >= CONFIDENCE_GAP;

        let jd_title = extract_title(text);
        let role_level = detect_level(&jd_title).or_else(|| detect_level(text));

        let classification = DomainClassification {
            primary_domain: primary.as_ref().map(|s| s.domain),
            secondary_domain: secondary.as_ref().map(|s| s.domain),
            confident,
            role_level,
            primary_score,
            secondary_score: runner_up_score,
            jd_title,
            matched_keywords: primary.map(|s| s.matched).unwrap_or_default(),
        };

        debug!(
            primary = ?classification.primary_domain,
            secondary = ?classification.secondary_domain,
            confident = classification.confident,
            level = ?classification.role_level,
            primary_score = classification.primary_score,
            secondary_score = classification.secondary_score,
            "Role classification"
        );

        classification
    }
}

/// The first non-empty line shorter than 120 characters, else "Unknown Role".
pub fn extract_title(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && line.chars().count() < MAX_TITLE_CHARS)
        .unwrap_or(UNKNOWN_TITLE)
        .to_string()
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn classify(text: &str) -> DomainClassification {
        RoleClassifier::new().classify(text)
    }

    #[test]
    fn test_every_domain_classifies_confidently() {
        let cases = [
            (JD_EXECUTIVE_CHEF, Domain::Culinary, RoleLevel::Director),
            (JD_QUANT_TRADER, Domain::FinanceTrading, RoleLevel::IcSenior),
            (JD_DRUG_DISCOVERY, Domain::LifeSciences, RoleLevel::Director),
            (JD_CHIEF_MEDICAL_OFFICER, Domain::Healthcare, RoleLevel::CSuite),
            (JD_VP_SALES, Domain::SalesGrowth, RoleLevel::Vp),
            (JD_CTO, Domain::Technology, RoleLevel::CSuite),
        ];
        for (jd, domain, level) in cases {
            let c = classify(jd);
            assert_eq!(c.primary_domain, Some(domain), "{}", c.jd_title);
            assert_eq!(c.role_level, Some(level), "{}", c.jd_title);
            assert!(c.confident, "{} should be confident", c.jd_title);
        }
    }

    #[test]
    fn test_cto_has_large_lead() {
        let c = classify(JD_CTO);
        assert!(c.primary_score >= 8);
        assert!(c.primary_score - c.secondary_score >= CONFIDENCE_GAP);
        assert!(c.matched_keywords.contains(&"distributed systems"));
    }

    #[test]
    fn test_cross_domain_reports_secondary() {
        let c = classify(JD_HEALTH_TECH_VP);
        assert_eq!(c.primary_domain, Some(Domain::Technology));
        assert!(matches!(
            c.secondary_domain,
            Some(Domain::Healthcare) | Some(Domain::LifeSciences)
        ));
        assert!(c.primary_score > c.secondary_score);
        assert_eq!(c.role_level, Some(RoleLevel::Vp));
        assert!(c.is_ambiguous());
    }

    #[test]
    fn test_revenue_operations_straddles_sales_and_technology() {
        let c = classify(JD_REVENUE_OPERATIONS);
        let both = [Some(Domain::Technology), Some(Domain::SalesGrowth)];
        assert!(both.contains(&c.primary_domain));
        assert!(both.contains(&c.secondary_domain));
        assert_ne!(c.primary_domain, c.secondary_domain);
        assert_eq!(c.role_level, Some(RoleLevel::Director));
    }

    #[test]
    fn test_scores_five_four_are_not_confident() {
        let text = "kubernetes kubernetes kubernetes kubernetes kubernetes chef chef chef chef";
        let c = classify(text);
        assert_eq!(c.primary_domain, Some(Domain::Technology));
        assert_eq!(c.secondary_domain, Some(Domain::Culinary));
        assert_eq!((c.primary_score, c.secondary_score), (5, 4));
        assert!(!c.confident);
        assert!(c.is_ambiguous());
    }

    #[test]
    fn test_scores_five_two_are_confident() {
        let text = "kubernetes kubernetes kubernetes kubernetes kubernetes chef chef";
        let c = classify(text);
        assert_eq!(c.primary_domain, Some(Domain::Technology));
        // 2 does not qualify as a secondary domain, but still counts as the runner-up
        assert_eq!(c.secondary_domain, None);
        assert_eq!((c.primary_score, c.secondary_score), (5, 2));
        assert!(c.confident);
        assert!(!c.is_ambiguous());
    }

    #[test]
    fn test_ties_break_by_declaration_order() {
        let c = classify("chef chef chef kubernetes kubernetes kubernetes");
        assert_eq!(c.primary_domain, Some(Domain::Technology));
        assert_eq!(c.secondary_domain, Some(Domain::Culinary));
        assert!(!c.confident);
    }

    #[test]
    fn test_below_threshold_has_no_domain() {
        let c = classify("We need an engineer with API experience.");
        assert_eq!(c.primary_domain, None);
        assert_eq!(c.secondary_domain, None);
        assert!(!c.confident);
        assert!(!c.is_ambiguous());
    }

    #[test]
    fn test_catering_is_not_technology() {
        let c = classify("We are catering high-end events and need a waiting staff manager.");
        assert_ne!(c.primary_domain, Some(Domain::Technology));
        assert_eq!(c.role_level, Some(RoleLevel::Manager));
    }

    #[test]
    fn test_acronym_collision_resolved_by_context() {
        let tech = classify(
            "Chief Information Officer needed. Must have software engineering background, \
             cloud infrastructure expertise, and API design experience.",
        );
        let finance = classify(
            "Chief Investment Officer needed. Must have portfolio management experience, \
             derivatives trading, and hedge fund background.",
        );
        assert_eq!(tech.primary_domain, Some(Domain::Technology));
        assert_eq!(finance.primary_domain, Some(Domain::FinanceTrading));
        assert_eq!(tech.role_level, Some(RoleLevel::CSuite));
    }

    #[test]
    fn test_empty_text() {
        let c = classify("");
        assert_eq!(c.primary_domain, None);
        assert_eq!(c.role_level, None);
        assert_eq!(c.jd_title, "Unknown Role");
    }

    #[test]
    fn test_classification_is_idempotent() {
        for jd in [JD_CTO, JD_REVENUE_OPERATIONS, JD_HEALTH_TECH_VP, JD_EXECUTIVE_CHEF, ""] {
            assert_eq!(classify(jd), classify(jd));
        }
    }

    #[test]
    fn test_extract_title() {
        assert_eq!(extract_title(JD_EXECUTIVE_CHEF), "Executive Chef");
        assert_eq!(extract_title(JD_QUANT_TRADER), "Senior Quantitative Trader");
        assert_eq!(extract_title(JD_DRUG_DISCOVERY), "Director of Drug Discovery");
        assert_eq!(extract_title("\n\n   VP of Global Sales  \nbody"), "VP of Global Sales");
        assert_eq!(extract_title(&"x".repeat(200)), "Unknown Role");
    }

    #[test]
    fn test_scenario_fixtures() {
        let platform = classify(JD_VP_PLATFORM);
        assert_eq!(platform.primary_domain, Some(Domain::Technology));
        assert_eq!(platform.role_level, Some(RoleLevel::Vp));
        assert!(platform.matched_keywords.contains(&"Kubernetes"));

        let chef = classify(JD_MICHELIN_CHEF);
        assert_eq!(chef.primary_domain, Some(Domain::Culinary));
        assert_eq!(chef.role_level, Some(RoleLevel::Director));
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    /// One keyword per domain that no other domain's table can match.
    fn marker(domain: Domain) -> &'static str {
        match domain {
            Domain::Technology => "Kubernetes",
            Domain::Culinary => "chef",
            Domain::FinanceTrading => "arbitrage",
            Domain::LifeSciences => "genomics",
            Domain::Healthcare => "physician",
            Domain::SalesGrowth => "quota",
        }
    }

    fn repeated(domain: Domain, times: u32) -> Vec<&'static str> {
        (0..times).map(|_| marker(domain)).collect()
    }

    fn score_of(text: &str, domain: Domain) -> u32 {
        score_domains(text)
            .into_iter()
            .find(|s| s.domain == domain)
            .map(|s| s.score)
            .unwrap_or(0)
    }

    fn domain_pair() -> impl Strategy<Value = (Domain, Domain)> {
        (0..Domain::ALL.len(), 0..Domain::ALL.len())
            .prop_filter("two different domains", |(x, y)| x != y)
            .prop_map(|(x, y)| (Domain::ALL[x], Domain::ALL[y]))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_classify_is_deterministic(text in any::<String>()) {
            let classifier = RoleClassifier::new();
            prop_assert_eq!(classifier.classify(&text), classifier.classify(&text));
        }

        #[test]
        fn prop_keywords_inside_longer_words_never_count(
            prefix in "[a-z0-9]{1,4}",
            suffix in "[a-z0-9]{1,4}",
        ) {
            for domain in Domain::ALL {
                for keyword in domain.keywords() {
                    let text = format!("{prefix}{keyword}{suffix}");
                    prop_assert_eq!(
                        score_of(&text, domain),
                        0,
                        "{} matched inside {:?}",
                        keyword,
                        text
                    );
                }
            }
        }

        #[test]
        fn prop_every_keyword_counts_on_word_boundaries(times in 1u32..5) {
            for domain in Domain::ALL {
                for keyword in domain.keywords() {
                    let text = vec![*keyword; times as usize].join(" | ");
                    prop_assert!(
                        score_of(&text, domain) >= times,
                        "{} repeated {} times scored low",
                        keyword,
                        times
                    );
                }
            }
        }

        #[test]
        fn prop_single_domain_signal_wins(times in 3u32..12) {
            for domain in Domain::ALL {
                let text = repeated(domain, times).join(", ");
                let c = RoleClassifier::new().classify(&text);
                prop_assert_eq!(c.primary_domain, Some(domain));
                prop_assert_eq!(c.secondary_domain, None);
                prop_assert_eq!(c.primary_score, times);
                prop_assert!(c.confident);
            }
        }

        #[test]
        fn prop_confidence_needs_threshold_and_gap(
            (first, second) in domain_pair(),
            a in 0u32..12,
            b in 0u32..12,
        ) {
            let mut words = repeated(first, a);
            words.extend(repeated(second, b));
            let c = RoleClassifier::new().classify(&words.join(", "));

            let (high, low) = (a.max(b), a.min(b));
            prop_assert_eq!(
                c.confident,
                high >= MIN_DOMAIN_SCORE && high - low >= CONFIDENCE_GAP
            );

            if high < MIN_DOMAIN_SCORE {
                prop_assert_eq!(c.primary_domain, None);
            } else if a != b {
                let (leader, trailer) = if a > b { (first, second) } else { (second, first) };
                prop_assert_eq!(c.primary_domain, Some(leader));
                prop_assert_eq!(
                    c.secondary_domain,
                    (low >= MIN_DOMAIN_SCORE).then_some(trailer)
                );
                prop_assert_eq!(c.secondary_score, low);
            }
        }
    }
}
