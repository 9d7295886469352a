use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Seniority of a role, ordered most senior first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RoleLevel {
    #[serde(rename = "c-suite")]
    CSuite,
    #[serde(rename = "vp")]
    Vp,
    #[serde(rename = "director")]
    Director,
    #[serde(rename = "manager")]
    Manager,
    #[serde(rename = "ic-senior")]
    IcSenior,
    #[serde(rename = "ic")]
    Ic,
}

impl RoleLevel {
    pub const ALL: [RoleLevel; 6] = [
        RoleLevel::CSuite,
        RoleLevel::Vp,
        RoleLevel::Director,
        RoleLevel::Manager,
        RoleLevel::IcSenior,
        RoleLevel::Ic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleLevel::CSuite => "c-suite",
            RoleLevel::Vp => "vp",
            RoleLevel::Director => "director",
            RoleLevel::Manager => "manager",
            RoleLevel::IcSenior => "ic-senior",
            RoleLevel::Ic => "ic",
        }
    }

    /// (pattern, case_sensitive). First level with a match wins.
    fn patterns(&self) -> &'static [(&'static str, bool)] {
        match self {
            RoleLevel::CSuite => &[
                (r"\b(?:CEO|CTO|CIO|CISO|CFO|COO|CMO|CPO|CDO|CSO|CRO)\b", true),
                (r"\bchief\s+\w+(?:\s+\w+)?\s+officer\b", false),
                (r"\bchief\s+architect\b", false),
            ],
            RoleLevel::Vp => &[
                (r"\b(?:senior\s+|executive\s+)?vice\s+president\b", false),
                (r"\b(?:SVP|EVP|VP)\b", true),
            ],
            RoleLevel::Director => &[
                (r"\b(?:senior\s+)?director\b", false),
                (r"\bhead\s+of\b", false),
                (r"\b(?:executive|head)\s+chef\b", false),
            ],
            RoleLevel::Manager => &[
                (r"\bmanager\b", false),
                (r"\b(?:team|tech|technical|engineering)\s+lead\b", false),
                (r"\blead\s+(?:engineer|developer)\b", false),
            ],
            RoleLevel::IcSenior => &[
                (r"\bstaff\s+(?:engineer|scientist|developer|architect)\b", false),
                (r"\bprincipal\s+\w+", false),
                (r"\bdistinguished\s+engineer\b", false),
                (r"\bsenior\s+(?:quantitative|quant)\s+\w+", false),
                (r"\bfellow\b", false),
                (r"\barchitect\b", false),
            ],
            RoleLevel::Ic => &[
                (
                    r"\b(?:engineer|developer|programmer|analyst|scientist|designer|specialist|consultant|associate|coordinator|technician|trader|researcher|cook|chef|nurse|representative|administrator)s?\b",
                    false,
                ),
                (r"\bSRE\b", true),
            ],
        }
    }
}

fn compiled() -> &'static [(RoleLevel, Vec<Regex>)] {
    static TABLE: OnceLock<Vec<(RoleLevel, Vec<Regex>)>> = OnceLock::new();
    TABLE.get_or_init(|| {
        RoleLevel::ALL
            .iter()
            .map(|level| {
                let patterns = level
                    .patterns()
                    .iter()
                    .map(|(pattern, case_sensitive)| {
                        RegexBuilder::new(pattern)
                            .case_insensitive(!case_sensitive)
                            .build()
                            .expect("role level table must compile")
                    })
                    .collect();
                (*level, patterns)
            })
            .collect()
    })
}

/// Detects the role level from title-like text. Returns `None` when no
/// title-shaped phrase is present.
pub fn detect_level(text: &str) -> Option<RoleLevel> {
    compiled()
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(text)))
        .map(|(level, _)| *level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_from_titles() {
        let cases = [
            ("Chief Technology Officer", Some(RoleLevel::CSuite)),
            ("Chief Medical Officer", Some(RoleLevel::CSuite)),
            ("CISO", Some(RoleLevel::CSuite)),
            ("Senior Vice President, Engineering", Some(RoleLevel::Vp)),
            ("VP of Global Sales", Some(RoleLevel::Vp)),
            ("Director of Drug Discovery", Some(RoleLevel::Director)),
            ("Head of Revenue Operations", Some(RoleLevel::Director)),
            ("Executive Chef", Some(RoleLevel::Director)),
            ("Senior Engineering Manager", Some(RoleLevel::Manager)),
            ("Tech Lead", Some(RoleLevel::Manager)),
            ("Staff Engineer", Some(RoleLevel::IcSenior)),
            ("Principal Scientist", Some(RoleLevel::IcSenior)),
            ("Senior Quantitative Trader", Some(RoleLevel::IcSenior)),
            ("Solutions Architect", Some(RoleLevel::IcSenior)),
            ("Senior Software Engineer", Some(RoleLevel::Ic)),
            ("Line Cook", Some(RoleLevel::Ic)),
            ("Registered Nurse", Some(RoleLevel::Ic)),
            ("Great opportunity, apply today", None),
        ];
        for (title, expected) in cases {
            assert_eq!(detect_level(title), expected, "title: {title}");
        }
    }

    #[test]
    fn test_acronyms_are_case_sensitive() {
        // "vp" and "cto" in running prose are not titles
        assert_eq!(detect_level("the cto of vp-land"), None);
        assert_eq!(detect_level("Reports to the CTO"), Some(RoleLevel::CSuite));
    }

    #[test]
    fn test_more_senior_level_wins() {
        assert_eq!(
            detect_level("Engineering Manager reporting to the Vice President"),
            Some(RoleLevel::Vp)
        );
    }
}
