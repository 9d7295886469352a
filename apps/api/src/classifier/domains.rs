use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Career domains a job description (or a candidate background) can belong to.
/// Declaration order breaks score ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Technology,
    Culinary,
    FinanceTrading,
    LifeSciences,
    Healthcare,
    SalesGrowth,
}

impl Domain {
    pub const ALL: [Domain; 6] = [
        Domain::Technology,
        Domain::Culinary,
        Domain::FinanceTrading,
        Domain::LifeSciences,
        Domain::Healthcare,
        Domain::SalesGrowth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Technology => "technology",
            Domain::Culinary => "culinary",
            Domain::FinanceTrading => "finance_trading",
            Domain::LifeSciences => "life_sciences",
            Domain::Healthcare => "healthcare",
            Domain::SalesGrowth => "sales_growth",
        }
    }

    /// Human label used inside prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Domain::Technology => "technology",
            Domain::Culinary => "culinary arts",
            Domain::FinanceTrading => "finance and trading",
            Domain::LifeSciences => "life sciences",
            Domain::Healthcare => "healthcare",
            Domain::SalesGrowth => "sales and growth",
        }
    }

    /// Keywords are matched case-insensitively on word boundaries, with an
    /// optional plural `s`. No keyword may be a whole-word sub-phrase of
    /// another keyword in the same list, or a single mention would count twice.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Domain::Technology => &[
                "software",
                "engineer",
                "engineering",
                "infrastructure",
                "platform",
                "cloud",
                "distributed systems",
                "AI",
                "ML",
                "machine learning",
                "DevOps",
                "SRE",
                "backend",
                "frontend",
                "full-stack",
                "API",
                "microservices",
                "Kubernetes",
                "cybersecurity",
                "security",
                "architecture",
                "scalable",
                "deployment",
                "CI/CD",
                "data",
            ],
            Domain::Culinary => &[
                "chef",
                "culinary",
                "kitchen",
                "menu",
                "cuisine",
                "restaurant",
                "fine dining",
                "back-of-house",
                "sous",
                "pastry",
                "cook",
                "cooking",
                "Michelin",
                "food cost",
                "catering",
                "hospitality",
                "sanitation",
                "plate",
            ],
            Domain::FinanceTrading => &[
                "trading",
                "trader",
                "quantitative",
                "quant",
                "hedge fund",
                "portfolio",
                "derivatives",
                "alpha",
                "risk management",
                "equities",
                "fixed income",
                "asset management",
                "investment",
                "financial",
                "Sharpe",
                "arbitrage",
                "securities",
            ],
            Domain::LifeSciences => &[
                "biotech",
                "pharmaceutical",
                "drug discovery",
                "clinical trials",
                "pre-clinical",
                "preclinical",
                "molecular",
                "chemists",
                "biologists",
                "therapeutic",
                "lead optimization",
                "IND",
                "CRO",
                "assay",
                "genomics",
                "biology",
                "chemistry",
                "R&D",
                "FDA",
                "diagnostic",
            ],
            Domain::Healthcare => &[
                "patient",
                "hospital",
                "medical",
                "physician",
                "clinical",
                "nursing",
                "nurse",
                "HIPAA",
                "EHR",
                "health",
                "healthcare",
                "credentialing",
                "board certification",
                "care",
            ],
            Domain::SalesGrowth => &[
                "sales",
                "revenue",
                "ARR",
                "quota",
                "pipeline",
                "go-to-market",
                "SDR",
                "account executive",
                "AE",
                "CRM",
                "forecast",
                "forecasting",
                "B2B",
                "SaaS",
                "territory",
                "customer acquisition",
                "growth",
                "funnel",
                "partnerships",
                "negotiate",
            ],
        }
    }

    fn index(&self) -> usize {
        Domain::ALL
            .iter()
            .position(|d| d == self)
            .unwrap_or_default()
    }
}

/// Keyword evidence for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainScore {
    pub domain: Domain,
    /// Total word-boundary occurrences across all keywords.
    pub score: u32,
    /// Keywords that occurred at least once, in table order.
    pub matched: Vec<&'static str>,
}

struct CompiledKeyword {
    keyword: &'static str,
    pattern: Regex,
}

fn compiled() -> &'static [Vec<CompiledKeyword>] {
    static TABLE: OnceLock<Vec<Vec<CompiledKeyword>>> = OnceLock::new();
    TABLE.get_or_init(|| {
        Domain::ALL
            .iter()
            .map(|domain| {
                domain
                    .keywords()
                    .iter()
                    .map(|keyword| CompiledKeyword {
                        keyword,
                        pattern: RegexBuilder::new(&format!(r"\b{}s?\b", regex::escape(keyword)))
                            .case_insensitive(true)
                            .build()
                            .expect("domain keyword table must compile"),
                    })
                    .collect()
            })
            .collect()
    })
}

/// Scores `text` against every domain, in declaration order.
pub fn score_domains(text: &str) -> Vec<DomainScore> {
    let table = compiled();
    Domain::ALL
        .iter()
        .map(|domain| {
            let mut score = 0;
            let mut matched = Vec::new();
            for entry in &table[domain.index()] {
                let hits = entry.pattern.find_iter(text).count() as u32;
                if hits > 0 {
                    score += hits;
                    matched.push(entry.keyword);
                }
            }
            DomainScore {
                domain: *domain,
                score,
                matched,
            }
        })
        .collect()
}
