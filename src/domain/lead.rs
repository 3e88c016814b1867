use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    message::InboundMessage,
    types::{ClassificationResult, MatchDecision, UnknownVariant},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadState {
    Pending,
    Confirmed,
    Rejected,
}

impl LeadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadState::Pending => "pending",
            LeadState::Confirmed => "confirmed",
            LeadState::Rejected => "rejected",
        }
    }
}

impl FromStr for LeadState {
    type Err = UnknownVariant;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(LeadState::Pending),
            "confirmed" => Ok(LeadState::Confirmed),
            "rejected" => Ok(LeadState::Rejected),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// A job-related message waiting for the user to confirm or dismiss it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingLead {
    pub id: String,
    pub user_id: String,
    pub message: InboundMessage,
    pub classification: ClassificationResult,
    pub decision: MatchDecision,
    pub company_guess: Option<String>,
    pub role_guess: Option<String>,
    pub state: LeadState,
    pub created_at: DateTime<Utc>,
}
