use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Category, UnknownVariant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Screening,
    Assessment,
    Interview,
    Offer,
    Accepted,
    Rejected,
    Withdrawn,
    Ghosted,
}

impl ApplicationStatus {
    pub const GHOSTABLE: [ApplicationStatus; 2] =
        [ApplicationStatus::Applied, ApplicationStatus::Screening];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Screening => "screening",
            ApplicationStatus::Assessment => "assessment",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
            ApplicationStatus::Ghosted => "ghosted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted
                | ApplicationStatus::Rejected
                | ApplicationStatus::Withdrawn
                | ApplicationStatus::Ghosted
        )
    }

    pub fn is_ghostable(&self) -> bool {
        Self::GHOSTABLE.contains(self)
    }

    /// Reached at least the interview stage.
    pub fn reached_interview(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Interview | ApplicationStatus::Offer | ApplicationStatus::Accepted
        )
    }

    /// Status a freshly confirmed lead starts in.
    pub fn from_category(category: Category) -> Self {
        match category {
            Category::ApplicationRejected => ApplicationStatus::Rejected,
            Category::InterviewInvite => ApplicationStatus::Interview,
            Category::AssessmentInvite => ApplicationStatus::Assessment,
            Category::OfferLetter => ApplicationStatus::Offer,
            _ => ApplicationStatus::Applied,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let status = match value {
            "applied" => ApplicationStatus::Applied,
            "screening" => ApplicationStatus::Screening,
            "assessment" => ApplicationStatus::Assessment,
            "interview" => ApplicationStatus::Interview,
            "offer" => ApplicationStatus::Offer,
            "accepted" => ApplicationStatus::Accepted,
            "rejected" => ApplicationStatus::Rejected,
            "withdrawn" => ApplicationStatus::Withdrawn,
            "ghosted" => ApplicationStatus::Ghosted,
            other => return Err(UnknownVariant(other.to_string())),
        };
        Ok(status)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedApplication {
    pub id: String,
    pub user_id: String,
    pub company_name: String,
    pub role_title: String,
    pub status: ApplicationStatus,
    pub status_changed_at: DateTime<Utc>,
    pub applied_at: DateTime<Utc>,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub linked_message_ids: Vec<String>,
    pub last_linked_at: Option<DateTime<Utc>>,
}

/// A status change the ghost sweep applied, kept for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GhostTransition {
    pub application_id: String,
    pub company_name: String,
    pub role_title: String,
    pub previous_status: ApplicationStatus,
    pub days_since_update: i64,
    pub reason: String,
}
