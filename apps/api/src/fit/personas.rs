//! Assessor personas: a finite (domain, level) table of recruiter system prompts.
//!
//! A persona is the domain's recruiter identity combined with the level's
//! evaluation scope and criteria. Unclassified roles get the fallback persona.

use crate::classifier::{Domain, DomainClassification, RoleLevel};

pub const FALLBACK_PERSONA: &str = "You are an experienced recruiter providing honest, \
calibrated fit assessments. You compare the candidate's background against the role \
requirements and assess seniority alignment.";

const FALLBACK_CRITERIA: &[&str] = &[
    "Relevant experience",
    "Seniority alignment",
    "Skills match",
    "Domain knowledge",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// `technology/vp`, or `fallback`.
    pub key: String,
    pub system_prompt: String,
    pub eval_criteria: Vec<&'static str>,
}

impl Persona {
    pub fn fallback() -> Self {
        Self {
            key: "fallback".to_string(),
            system_prompt: FALLBACK_PERSONA.to_string(),
            eval_criteria: FALLBACK_CRITERIA.to_vec(),
        }
    }
}

fn recruiter_identity(domain: Domain) -> &'static str {
    match domain {
        Domain::Technology => {
            "You are a technical recruiter who has placed engineers and engineering leaders \
             at high-growth software companies."
        }
        Domain::Culinary => {
            "You are a hospitality recruiter who staffs professional kitchens, from line \
             cooks to executive chefs at fine-dining restaurants."
        }
        Domain::FinanceTrading => {
            "You are a front-office recruiter for hedge funds, banks and proprietary trading \
             firms, fluent in quantitative and discretionary roles."
        }
        Domain::LifeSciences => {
            "You are a life-sciences recruiter placing scientists and R&D leaders at biotech \
             and pharmaceutical companies."
        }
        Domain::Healthcare => {
            "You are a healthcare recruiter placing clinicians and clinical leaders at \
             hospitals and care networks."
        }
        Domain::SalesGrowth => {
            "You are a go-to-market recruiter placing sales and revenue leaders at B2B \
             companies."
        }
    }
}

fn level_scope(level: RoleLevel) -> (&'static str, &'static [&'static str]) {
    match level {
        RoleLevel::CSuite => (
            "This is a C-level search. Evaluate against the full scope of an executive role: \
             organisation-wide strategy, board and investor communication, P&L ownership and \
             company-scale decisions. A VP applying for a C-level role is a level jump that \
             must be acknowledged.",
            &[
                "Organisation-wide strategy ownership",
                "Board, investor or external stakeholder experience",
                "P&L or budget authority at company scale",
                "Scale of the organisation led",
                "Prior C-level or equivalent scope",
            ],
        ),
        RoleLevel::Vp => (
            "This is a VP-level search. Evaluate department-scale ownership: cross-functional \
             leadership, budget authority, scaling large teams and turning business strategy \
             into execution. A Director applying for VP is a scope jump; assess whether VP \
             breadth has been demonstrated.",
            &[
                "Department-scale ownership",
                "Cross-functional leadership",
                "Budget authority and resource allocation",
                "Team scale",
                "Strategic planning and roadmap ownership",
            ],
        ),
        RoleLevel::Director => (
            "This is a Director-level search. Evaluate ownership of an area: strategy within \
             it, building and retaining a team, and driving multi-quarter initiatives to \
             delivery.",
            &[
                "Area ownership",
                "Team building and retention",
                "Multi-quarter initiative delivery",
                "Stakeholder management",
                "Hiring and mentoring",
            ],
        ),
        RoleLevel::Manager => (
            "This is a people-manager search. Evaluate team delivery: execution, people \
             management, mentoring, planning and stakeholder alignment.",
            &[
                "People management and mentoring",
                "Delivery and execution",
                "Team health and retention",
                "Stakeholder communication",
            ],
        ),
        RoleLevel::IcSenior => (
            "This is a senior individual-contributor search. Evaluate depth of expertise, \
             influence without authority, mentoring and a track record on complex work.",
            &[
                "Depth of expertise",
                "Cross-team influence",
                "Mentoring and technical leadership",
                "Track record on complex work",
            ],
        ),
        RoleLevel::Ic => (
            "This is an individual-contributor search. Evaluate hands-on skills, relevant \
             experience, problem solving and growth trajectory.",
            &[
                "Relevant hands-on experience",
                "Core skills",
                "Problem solving",
                "Growth trajectory",
            ],
        ),
    }
}

/// Picks the persona for a classification. Both a domain and a level are
/// required; anything less uses the fallback persona.
pub fn select_persona(classification: &DomainClassification) -> Persona {
    let (Some(domain), Some(level)) = (classification.primary_domain, classification.role_level)
    else {
        return Persona::fallback();
    };

    let (scope, criteria) = level_scope(level);
    Persona {
        key: format!("{}/{}", domain.as_str(), level.as_str()),
        system_prompt: format!("{} {}", recruiter_identity(domain), scope),
        eval_criteria: criteria.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::fixtures::{JD_CTO, JD_EXECUTIVE_CHEF};
    use crate::classifier::RoleClassifier;

    #[test]
    fn test_persona_for_every_domain_and_level() {
        for domain in Domain::ALL {
            for level in RoleLevel::ALL {
                let classification = DomainClassification {
                    primary_domain: Some(domain),
                    secondary_domain: None,
                    confident: true,
                    role_level: Some(level),
                    primary_score: 5,
                    secondary_score: 0,
                    jd_title: String::new(),
                    matched_keywords: Vec::new(),
                };
                let persona = select_persona(&classification);
                assert_eq!(persona.key, format!("{}/{}", domain.as_str(), level.as_str()));
                assert!(persona.system_prompt.starts_with("You are"));
                assert!(!persona.eval_criteria.is_empty());
            }
        }
    }

    #[test]
    fn test_classified_fixtures_pick_matching_personas() {
        let classifier = RoleClassifier::new();
        assert_eq!(select_persona(&classifier.classify(JD_CTO)).key, "technology/c-suite");
        assert_eq!(
            select_persona(&classifier.classify(JD_EXECUTIVE_CHEF)).key,
            "culinary/director"
        );
    }

    #[test]
    fn test_unclassified_uses_fallback() {
        let persona = select_persona(&RoleClassifier::new().classify(""));
        assert_eq!(persona, Persona::fallback());
        assert!(persona.system_prompt.starts_with("You are an experienced recruiter"));
    }
}
