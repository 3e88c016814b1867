use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ceiling applied to job-related verdicts that carry no extracted evidence.
pub const LOW_EVIDENCE_CONFIDENCE_CAP: f64 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ApplicationReceived,
    ApplicationRejected,
    InterviewInvite,
    AssessmentInvite,
    OfferLetter,
    FollowUp,
    GeneralHr,
    NotJobRelated,
    Unknown,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::ApplicationReceived,
        Category::ApplicationRejected,
        Category::InterviewInvite,
        Category::AssessmentInvite,
        Category::OfferLetter,
        Category::FollowUp,
        Category::GeneralHr,
        Category::NotJobRelated,
        Category::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::ApplicationReceived => "application_received",
            Category::ApplicationRejected => "application_rejected",
            Category::InterviewInvite => "interview_invite",
            Category::AssessmentInvite => "assessment_invite",
            Category::OfferLetter => "offer_letter",
            Category::FollowUp => "follow_up",
            Category::GeneralHr => "general_hr",
            Category::NotJobRelated => "not_job_related",
            Category::Unknown => "unknown",
        }
    }

    pub fn is_job_related(&self) -> bool {
        !matches!(self, Category::NotJobRelated | Category::Unknown)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognised value `{}`", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for Category {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| UnknownVariant(value.to_string()))
    }
}

/// Which stage produced the final verdict for a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    QuickFilter,
    Pattern,
    Escalation,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::QuickFilter => "quick_filter",
            Provenance::Pattern => "pattern",
            Provenance::Escalation => "escalation",
        }
    }
}

impl FromStr for Provenance {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "quick_filter" => Ok(Provenance::QuickFilter),
            "pattern" => Ok(Provenance::Pattern),
            "escalation" => Ok(Provenance::Escalation),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    pub organizations: Vec<String>,
    pub persons: Vec<String>,
    pub dates: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        [&self.organizations, &self.persons, &self.dates]
            .iter()
            .all(|spans| spans.iter().all(|span| span.trim().is_empty()))
    }
}

/// Only constructed through [`ClassificationResult::new`], so stored verdicts
/// always carry a clamped and evidence-capped confidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    category: Category,
    confidence: f64,
    entities: Entities,
    provenance: Provenance,
}

impl ClassificationResult {
    /// Builds a verdict, clamping confidence into [0, 1].
    ///
    /// Job-related verdicts without any extracted entity are capped below 0.5.
    pub fn new(
        category: Category,
        confidence: f64,
        entities: Entities,
        provenance: Provenance,
    ) -> Self {
        let mut confidence = clamp_unit(confidence);
        if category.is_job_related() && entities.is_empty() {
            confidence = confidence.min(LOW_EVIDENCE_CONFIDENCE_CAP);
        }
        Self {
            category,
            confidence,
            entities,
            provenance,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchDecision {
    Matched {
        application_id: String,
        confidence: f64,
    },
    NoMatch,
}

impl MatchDecision {
    pub fn application_id(&self) -> Option<&str> {
        match self {
            MatchDecision::Matched { application_id, .. } => Some(application_id),
            MatchDecision::NoMatch => None,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            MatchDecision::Matched { confidence, .. } => *confidence,
            MatchDecision::NoMatch => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Warning,
    Tip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_its_own_names() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
        assert_eq!(" Offer_Letter ".parse::<Category>(), Ok(Category::OfferLetter));
        assert!("spam".parse::<Category>().is_err());
    }

    #[test]
    fn evidence_free_job_verdicts_are_capped() {
        let capped = ClassificationResult::new(
            Category::InterviewInvite,
            0.9,
            Entities::default(),
            Provenance::Pattern,
        );
        assert!(capped.confidence() < 0.5);

        let entities = Entities {
            organizations: vec!["Acme".into()],
            ..Default::default()
        };
        let kept = ClassificationResult::new(
            Category::InterviewInvite,
            0.9,
            entities,
            Provenance::Pattern,
        );
        assert_eq!(kept.confidence(), 0.9);
    }

    #[test]
    fn non_job_verdicts_keep_confidence_and_are_clamped() {
        let result = ClassificationResult::new(
            Category::NotJobRelated,
            1.7,
            Entities::default(),
            Provenance::Pattern,
        );
        assert_eq!(result.confidence(), 1.0);
    }

    #[test]
    fn whitespace_spans_do_not_count_as_evidence() {
        let entities = Entities {
            persons: vec!["  ".into()],
            ..Default::default()
        };
        assert!(entities.is_empty());
    }
}
