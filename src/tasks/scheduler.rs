use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{detection::SweepOutcome, tracker::TrackerService};

/// Registers the daily ghost sweep and starts the scheduler.
pub async fn configure_ghost_sweep(
    cron_spec: &str,
    timezone: Tz,
    tracker: Arc<TrackerService>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;
    let label = cron_spec.to_string();
    let job = Job::new_async_tz(cron_spec, timezone, move |_id, _l| {
        let tracker = tracker.clone();
        let cron_label = label.clone();
        Box::pin(async move {
            tracing::info!(target: "scheduler", cron = %cron_label, "ghost sweep triggered");
            sweep_all(&tracker).await;
        })
    })?;
    scheduler.add(job).await?;
    tracing::info!(
        target: "scheduler",
        cron = %cron_spec,
        timezone = %timezone,
        "ghost sweep registered"
    );
    scheduler.start().await?;
    Ok(scheduler)
}

/// Sweeps every known user; one user's failure does not stop the rest.
pub async fn sweep_all(tracker: &TrackerService) -> usize {
    let users = match tracker.sweep_users().await {
        Ok(users) => users,
        Err(err) => {
            tracing::error!(target: "scheduler", error = %err, "failed to list users for sweep");
            return 0;
        }
    };

    let mut ghosted = 0;
    for user_id in &users {
        match tracker.run_sweep(user_id, Utc::now()).await {
            Ok(SweepOutcome::Completed(transitions)) => ghosted += transitions.len(),
            Ok(SweepOutcome::Skipped) => {}
            Err(err) => {
                tracing::error!(
                    target: "scheduler",
                    user_id = %user_id,
                    error = %err,
                    "ghost sweep failed"
                );
            }
        }
    }
    tracing::info!(target: "scheduler", users = users.len(), ghosted, "ghost sweep pass done");
    ghosted
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::Duration;

    use super::*;
    use crate::{
        db::{
            applications::{testing::seed, ApplicationRepository},
            leads::LeadRepository,
            memory_pool,
        },
        detection::{GhostDetector, GhostSweeper},
        domain::ApplicationStatus,
        insights::InsightCache,
    };

    #[tokio::test]
    async fn sweep_all_covers_every_user_once() {
        let pool = memory_pool().await.unwrap();
        let stale = Utc::now() - Duration::days(30);
        seed(&pool, "u1", "Acme", ApplicationStatus::Applied, stale).await;
        seed(&pool, "u2", "Globex", ApplicationStatus::Screening, stale).await;
        seed(&pool, "u2", "Initech", ApplicationStatus::Interview, stale).await;

        let applications = ApplicationRepository::new(pool.clone());
        let sweeper = GhostSweeper::new(GhostDetector::with_window_days(14), applications.clone());
        let tracker = TrackerService::new(
            applications,
            LeadRepository::new(pool),
            Arc::new(sweeper),
            InsightCache::new(StdDuration::from_secs(60)),
        );

        assert_eq!(sweep_all(&tracker).await, 2);
        assert_eq!(sweep_all(&tracker).await, 0);
    }
}
