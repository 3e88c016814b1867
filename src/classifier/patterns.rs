//! Ordered pattern table for stage classification.
//!
//! Categories are checked in table order and patterns in list order; the
//! first hit decides the category. Confidence comes from the pattern's
//! strength, never from how many patterns matched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::domain::Category;

use super::signals::SignalReport;

pub const STRONG_CONFIDENCE: f64 = 0.9;
pub const WEAK_CONFIDENCE: f64 = 0.8;
pub const GENERAL_HR_CONFIDENCE: f64 = 0.6;
pub const NOT_JOB_RELATED_CONFIDENCE: f64 = 0.8;
pub const CANDIDATE_LIST_CONFIDENCE: f64 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Strong,
    Weak,
}

impl Strength {
    pub fn confidence(&self) -> f64 {
        match self {
            Strength::Strong => STRONG_CONFIDENCE,
            Strength::Weak => WEAK_CONFIDENCE,
        }
    }
}

use Strength::{Strong, Weak};

type PatternRow = (Category, &'static [(&'static str, Strength)]);

// Rejections go first: they routinely quote "thank you for applying" or
// mention an interview. Plain confirmations are the least specific, so last.
const PATTERN_ROWS: &[PatternRow] = &[
    (
        Category::ApplicationRejected,
        &[
            (r"regret to inform", Strong),
            (r"not (?:be )?moving forward with your", Strong),
            (r"will not be moving forward", Strong),
            (r"decided (?:not to proceed|to move forward with other)", Strong),
            (r"pursue other candidates", Strong),
            (r"position has been filled", Strong),
            (r"after careful consideration", Strong),
            (r"won'?t be proceeding", Strong),
            (r"not the right fit", Strong),
            (r"unfortunately", Weak),
            (r"other candidates", Weak),
            (r"not selected", Weak),
            (r"not moving forward", Weak),
        ],
    ),
    (
        Category::OfferLetter,
        &[
            (r"offer letter", Strong),
            (r"pleased to offer", Strong),
            (r"extend (?:you )?an offer", Strong),
            (r"offer of employment", Strong),
            (r"congratulations.{0,40}offer", Strong),
            (r"compensation package", Strong),
            (r"welcome to the team", Strong),
            (r"job offer", Weak),
            (r"start date", Weak),
            (r"onboarding", Weak),
        ],
    ),
    (
        Category::AssessmentInvite,
        &[
            (r"online assessment", Strong),
            (r"coding challenge", Strong),
            (r"technical assessment", Strong),
            (r"skills assessment", Strong),
            (r"take[- ]home (?:assignment|exercise|test)", Strong),
            (r"assessment link", Strong),
            (r"programming test", Strong),
            (r"hackerrank", Weak),
            (r"codesignal", Weak),
            (r"codility", Weak),
            (r"coding test", Weak),
            (r"take-home", Weak),
        ],
    ),
    (
        Category::InterviewInvite,
        &[
            (r"interview (?:request|invitation|invite)", Strong),
            (r"invit\w* (?:you )?to (?:an? )?interview", Strong),
            (r"schedule (?:a |an )?(?:call|interview|time)", Strong),
            (r"set up a call", Strong),
            (r"phone screen", Strong),
            (r"like to speak with you", Strong),
            (r"meet (?:with )?the team", Strong),
            (r"next round", Strong),
            (r"interview", Weak),
            (r"calendly", Weak),
            (r"zoom meeting", Weak),
            (r"google meet", Weak),
            (r"hiring manager", Weak),
        ],
    ),
    (
        Category::FollowUp,
        &[
            (r"following up on your application", Strong),
            (r"checking in on your application", Strong),
            (r"status of your application", Strong),
            (r"following up", Weak),
            (r"follow-up", Weak),
            (r"checking in", Weak),
        ],
    ),
    (
        Category::ApplicationReceived,
        &[
            (r"thank(?:s| you) for applying", Strong),
            (r"received your application", Strong),
            (r"application (?:has been |was )?(?:received|submitted)", Strong),
            (r"your application (?:was sent|to)", Strong),
            (r"application is under review", Strong),
            (r"reviewing your application", Strong),
            (r"you applied", Weak),
            (r"successfully applied", Weak),
            (r"applied for", Weak),
        ],
    ),
];

const CANDIDATE_LIST_PATTERNS: &[&str] = &[
    r"list\s+of.*(?:accepted|selected|shortlisted|eligible)\s+(?:candidates|students|applicants|aspirants)",
    r"following\s+(?:candidates|students|applicants|aspirants)",
    r"here\s+are\s+(?:the\s+)?(?:selected|accepted|shortlisted)",
    r"(?:selected|accepted|shortlisted|eligible)\s+(?:candidates|students|applicants)\s*:",
    r"congratulations\s+to\s+(?:the\s+following|all)",
    r"(?:find|see)\s+(?:below|attached)\s+the\s+names",
    r"regret\s+to\s+inform\s+(?:the\s+)?following",
    r"(?:candidates|applicants)\s+(?:not|who\s+were\s+not)\s+selected",
];

pub struct CategoryPatterns {
    pub category: Category,
    pub patterns: Vec<Pattern>,
}

pub struct Pattern {
    pub source: &'static str,
    pub regex: Regex,
    pub strength: Strength,
}

static PATTERN_TABLE: Lazy<Vec<CategoryPatterns>> = Lazy::new(|| {
    PATTERN_ROWS
        .iter()
        .map(|(category, rows)| CategoryPatterns {
            category: *category,
            patterns: rows
                .iter()
                .map(|&(source, strength)| Pattern {
                    source,
                    regex: Regex::new(source).expect("valid category pattern"),
                    strength,
                })
                .collect(),
        })
        .collect()
});

static CANDIDATE_LIST_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    CANDIDATE_LIST_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("valid candidate list pattern"))
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternVerdict {
    pub category: Category,
    pub confidence: f64,
    /// Pattern source that decided the verdict, if any did.
    pub matched: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PatternClassifier;

impl PatternClassifier {
    pub fn table() -> &'static [CategoryPatterns] {
        &PATTERN_TABLE
    }

    /// Classifies `text` (subject plus body) using the signal report for the
    /// no-match fallback. `user_address` enables the mass-mailing check.
    pub fn classify(
        &self,
        text: &str,
        signals: &SignalReport,
        user_address: Option<&str>,
    ) -> PatternVerdict {
        let text = text.to_lowercase();

        if let Some(address) = user_address {
            if is_candidate_list(&text) && !mentions_user(&text, address) {
                return PatternVerdict {
                    category: Category::NotJobRelated,
                    confidence: CANDIDATE_LIST_CONFIDENCE,
                    matched: None,
                };
            }
        }

        for row in PATTERN_TABLE.iter() {
            if let Some(pattern) = row.patterns.iter().find(|p| p.regex.is_match(&text)) {
                return PatternVerdict {
                    category: row.category,
                    confidence: pattern.strength.confidence(),
                    matched: Some(pattern.source),
                };
            }
        }

        if signals.is_likely_job_related() {
            PatternVerdict {
                category: Category::GeneralHr,
                confidence: GENERAL_HR_CONFIDENCE,
                matched: None,
            }
        } else {
            PatternVerdict {
                category: Category::NotJobRelated,
                confidence: NOT_JOB_RELATED_CONFIDENCE,
                matched: None,
            }
        }
    }
}

fn is_candidate_list(text: &str) -> bool {
    CANDIDATE_LIST_REGEXES.iter().any(|regex| regex.is_match(text))
}

fn mentions_user(text: &str, address: &str) -> bool {
    let address = address.trim().to_lowercase();
    if address.is_empty() {
        return true;
    }
    let local = address.split('@').next().unwrap_or_default();
    text.contains(&address) || (local.len() >= 4 && text.contains(local))
}
