use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::{
    config::{GhostConfig, MAX_GHOST_WINDOW_DAYS},
    db::applications::ApplicationRepository,
    domain::{GhostTransition, TrackedApplication},
};

/// Pure staleness rule over a snapshot of applications.
#[derive(Debug, Clone)]
pub struct GhostDetector {
    window: Duration,
}

impl GhostDetector {
    pub fn new(config: &GhostConfig) -> Self {
        Self::with_window_days(config.window_days)
    }

    pub fn with_window_days(days: i64) -> Self {
        Self {
            window: Duration::days(days.clamp(0, MAX_GHOST_WINDOW_DAYS)),
        }
    }

    pub fn window_days(&self) -> i64 {
        self.window.num_days()
    }

    /// An application is stale when it sits in `applied` or `screening`,
    /// its status is older than the window, and nothing was linked to it
    /// after the status last changed.
    pub fn is_stale(&self, app: &TrackedApplication, now: DateTime<Utc>) -> bool {
        if !app.status.is_ghostable() {
            return false;
        }
        if app.status_changed_at >= now - self.window {
            return false;
        }
        match app.last_linked_at {
            Some(linked_at) => linked_at <= app.status_changed_at,
            None => true,
        }
    }

    pub fn evaluate(
        &self,
        applications: &[TrackedApplication],
        now: DateTime<Utc>,
    ) -> Vec<GhostTransition> {
        applications
            .iter()
            .filter(|app| self.is_stale(app, now))
            .map(|app| {
                let days = (now - app.status_changed_at).num_days();
                GhostTransition {
                    application_id: app.id.clone(),
                    company_name: app.company_name.clone(),
                    role_title: app.role_title.clone(),
                    previous_status: app.status,
                    days_since_update: days,
                    reason: format!(
                        "No response for {days} days (threshold: {} days)",
                        self.window_days()
                    ),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Completed(Vec<GhostTransition>),
    /// Another sweep for the same user was already running.
    Skipped,
}

/// Applies the staleness rule to stored applications, one user at a time.
pub struct GhostSweeper {
    detector: GhostDetector,
    applications: ApplicationRepository,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl GhostSweeper {
    pub fn new(detector: GhostDetector, applications: ApplicationRepository) -> Self {
        Self {
            detector,
            applications,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Applications the next sweep would ghost, without changing anything.
    pub async fn preview(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<GhostTransition>> {
        let candidates = self.applications.ghostable_for_user(user_id).await?;
        Ok(self.detector.evaluate(&candidates, now))
    }

    pub async fn run_sweep(&self, user_id: &str, now: DateTime<Utc>) -> Result<SweepOutcome> {
        let Some(_guard) = SweepGuard::acquire(&self.in_flight, user_id) else {
            tracing::info!(target: "ghost", user_id, "sweep already running, skipping");
            return Ok(SweepOutcome::Skipped);
        };

        let candidates = self.applications.ghostable_for_user(user_id).await?;
        let transitions = self.detector.evaluate(&candidates, now);
        let mut applied = Vec::with_capacity(transitions.len());

        for transition in transitions {
            match self.applications.mark_ghosted(&transition, now).await {
                Ok(true) => {
                    tracing::info!(
                        target: "ghost",
                        user_id,
                        application_id = %transition.application_id,
                        company = %transition.company_name,
                        days = transition.days_since_update,
                        "application marked as ghosted"
                    );
                    applied.push(transition);
                }
                Ok(false) => {
                    tracing::debug!(
                        target: "ghost",
                        application_id = %transition.application_id,
                        "status changed before ghosting, left untouched"
                    );
                }
                Err(err) => {
                    tracing::error!(
                        target: "ghost",
                        error = %err,
                        application_id = %transition.application_id,
                        "failed to ghost application"
                    );
                }
            }
        }

        tracing::info!(
            target: "ghost",
            user_id,
            examined = candidates.len(),
            ghosted = applied.len(),
            "ghost sweep finished"
        );
        Ok(SweepOutcome::Completed(applied))
    }
}

struct SweepGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    user_id: String,
}

impl SweepGuard {
    fn acquire(in_flight: &Arc<Mutex<HashSet<String>>>, user_id: &str) -> Option<Self> {
        if !in_flight.lock().insert(user_id.to_string()) {
            return None;
        }
        Some(Self {
            in_flight: in_flight.clone(),
            user_id: user_id.to_string(),
        })
    }
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{applications::testing::seed, memory_pool},
        domain::ApplicationStatus,
    };

    fn app(status: ApplicationStatus, days_ago: i64, now: DateTime<Utc>) -> TrackedApplication {
        TrackedApplication {
            id: format!("app-{days_ago}"),
            user_id: "u1".to_string(),
            company_name: "Acme".to_string(),
            role_title: "Engineer".to_string(),
            status,
            status_changed_at: now - Duration::days(days_ago),
            applied_at: now - Duration::days(days_ago),
            source: None,
            created_at: now - Duration::days(days_ago),
            linked_message_ids: Vec::new(),
            last_linked_at: None,
        }
    }

    #[test]
    fn only_stale_early_applications_qualify() {
        let now = Utc::now();
        let detector = GhostDetector::with_window_days(14);

        assert!(detector.is_stale(&app(ApplicationStatus::Applied, 20, now), now));
        assert!(detector.is_stale(&app(ApplicationStatus::Screening, 15, now), now));
        assert!(!detector.is_stale(&app(ApplicationStatus::Applied, 10, now), now));
        assert!(!detector.is_stale(&app(ApplicationStatus::Interview, 40, now), now));
        assert!(!detector.is_stale(&app(ApplicationStatus::Ghosted, 40, now), now));
    }

    #[test]
    fn recent_link_keeps_application_alive() {
        let now = Utc::now();
        let detector = GhostDetector::with_window_days(14);
        let mut fresh = app(ApplicationStatus::Applied, 20, now);
        fresh.last_linked_at = Some(now - Duration::days(3));
        assert!(!detector.is_stale(&fresh, now));

        let mut old_link = app(ApplicationStatus::Applied, 20, now);
        old_link.last_linked_at = Some(now - Duration::days(25));
        assert!(detector.is_stale(&old_link, now));
    }

    #[test]
    fn transitions_carry_audit_details() {
        let now = Utc::now();
        let detector = GhostDetector::with_window_days(14);
        let transitions = detector.evaluate(&[app(ApplicationStatus::Applied, 20, now)], now);

        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].previous_status, ApplicationStatus::Applied);
        assert_eq!(transitions[0].days_since_update, 20);
        assert_eq!(transitions[0].reason, "No response for 20 days (threshold: 14 days)");
    }

    #[tokio::test]
    async fn second_sweep_changes_nothing() {
        let pool = memory_pool().await.unwrap();
        let now = Utc::now();
        let applied = ApplicationStatus::Applied;
        let stale = seed(&pool, "u1", "Acme", applied, now - Duration::days(20)).await;
        seed(&pool, "u1", "Globex", applied, now - Duration::days(2)).await;

        let repo = ApplicationRepository::new(pool);
        let sweeper = GhostSweeper::new(GhostDetector::with_window_days(14), repo.clone());

        let preview = sweeper.preview("u1", now).await.unwrap();
        assert_eq!(preview.len(), 1);

        let SweepOutcome::Completed(first) = sweeper.run_sweep("u1", now).await.unwrap() else {
            panic!("first sweep skipped");
        };
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].application_id, stale.id);

        let SweepOutcome::Completed(second) = sweeper.run_sweep("u1", now).await.unwrap() else {
            panic!("second sweep skipped");
        };
        assert!(second.is_empty());
        assert_eq!(repo.events_for(&stale.id).await.unwrap().len(), 1);
        assert!(sweeper.preview("u1", now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_sweep_for_same_user_is_skipped() {
        let pool = memory_pool().await.unwrap();
        let sweeper = GhostSweeper::new(
            GhostDetector::with_window_days(14),
            ApplicationRepository::new(pool),
        );

        let held = SweepGuard::acquire(&sweeper.in_flight, "u1");
        assert!(held.is_some());
        assert_eq!(
            sweeper.run_sweep("u1", Utc::now()).await.unwrap(),
            SweepOutcome::Skipped
        );
        assert!(matches!(
            sweeper.run_sweep("u2", Utc::now()).await.unwrap(),
            SweepOutcome::Completed(_)
        ));

        drop(held);
        assert!(matches!(
            sweeper.run_sweep("u1", Utc::now()).await.unwrap(),
            SweepOutcome::Completed(_)
        ));
    }
}
