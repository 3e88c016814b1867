use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db::{
        applications::{ApplicationRepository, NewApplication},
        leads::LeadRepository,
    },
    detection::{GhostSweeper, SweepOutcome},
    domain::{ApplicationStatus, Insight, LeadState, PendingLead, TrackedApplication},
    insights::{InsightCache, InsightGenerator},
};

pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_ROLE: &str = "Unknown Role";
pub const LEAD_SOURCE: &str = "email";

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("lead {0} not found")]
    NotFound(String),
    #[error("lead {0} was already resolved")]
    AlreadyResolved(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Read side and user actions exposed to the API layer.
pub struct TrackerService {
    applications: ApplicationRepository,
    leads: LeadRepository,
    sweeper: Arc<GhostSweeper>,
    generator: InsightGenerator,
    cache: InsightCache,
}

impl TrackerService {
    pub fn new(
        applications: ApplicationRepository,
        leads: LeadRepository,
        sweeper: Arc<GhostSweeper>,
        cache: InsightCache,
    ) -> Self {
        Self {
            applications,
            leads,
            sweeper,
            generator: InsightGenerator,
            cache,
        }
    }

    pub async fn get_insights(&self, user_id: &str) -> anyhow::Result<Vec<Insight>> {
        if let Some(cached) = self.cache.get(user_id) {
            tracing::debug!(target: "insights", user_id, "serving cached insights");
            return Ok(cached);
        }
        let applications = self.applications.all_for_user(user_id).await?;
        let insights = self.generator.generate(&applications, Utc::now());
        tracing::debug!(
            target: "insights",
            user_id,
            applications = applications.len(),
            insights = insights.len(),
            "insights generated"
        );
        self.cache.put(user_id, insights.clone());
        Ok(insights)
    }

    pub async fn get_pending_leads(&self, user_id: &str) -> anyhow::Result<Vec<PendingLead>> {
        self.leads.pending_for_user(user_id).await
    }

    /// Creates an application from the lead and links its message.
    pub async fn confirm_lead(&self, lead_id: &str) -> Result<TrackedApplication, LeadError> {
        let lead = self.pending_lead(lead_id).await?;
        let new = NewApplication {
            user_id: lead.user_id.clone(),
            company_name: non_blank(lead.company_guess.as_deref())
                .unwrap_or(UNKNOWN_COMPANY)
                .to_string(),
            role_title: non_blank(lead.role_guess.as_deref())
                .unwrap_or(UNKNOWN_ROLE)
                .to_string(),
            status: ApplicationStatus::from_category(lead.classification.category()),
            applied_at: lead.message.received_at,
            source: Some(LEAD_SOURCE.to_string()),
        };

        let application = self
            .leads
            .confirm(&lead, new, Utc::now())
            .await?
            .ok_or_else(|| LeadError::AlreadyResolved(lead_id.to_string()))?;
        self.cache.invalidate(&lead.user_id);

        tracing::info!(
            target: "insights",
            lead_id,
            application_id = %application.id,
            company = %application.company_name,
            status = %application.status,
            "lead confirmed"
        );
        Ok(application)
    }

    pub async fn reject_lead(&self, lead_id: &str, reason: &str) -> Result<(), LeadError> {
        let lead = self.pending_lead(lead_id).await?;
        if !self.leads.reject(lead_id, reason, Utc::now()).await? {
            return Err(LeadError::AlreadyResolved(lead_id.to_string()));
        }
        self.cache.invalidate(&lead.user_id);
        tracing::info!(target: "insights", lead_id, reason, "lead rejected");
        Ok(())
    }

    /// Scheduler entry point for one user's ghost sweep.
    pub async fn run_sweep(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<SweepOutcome> {
        let outcome = self.sweeper.run_sweep(user_id, now).await?;
        if matches!(&outcome, SweepOutcome::Completed(ghosted) if !ghosted.is_empty()) {
            self.cache.invalidate(user_id);
        }
        Ok(outcome)
    }

    pub async fn sweep_users(&self) -> anyhow::Result<Vec<String>> {
        self.applications.users().await
    }

    async fn pending_lead(&self, lead_id: &str) -> Result<PendingLead, LeadError> {
        let lead = self
            .leads
            .get(lead_id)
            .await?
            .ok_or_else(|| LeadError::NotFound(lead_id.to_string()))?;
        if lead.state != LeadState::Pending {
            return Err(LeadError::AlreadyResolved(lead_id.to_string()));
        }
        Ok(lead)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
