use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use reqwest::Client;
use sqlx::sqlite::SqlitePool;
use tokio::{task::JoinHandle, time::timeout};
use tokio_cron_scheduler::JobScheduler;

use crate::{
    ai::{EscalationClassifier, LlmClient, TextClassifier},
    config::AppConfig,
    db::{
        self,
        applications::ApplicationRepository,
        inbox::{CursorRepository, SqliteMailbox},
        leads::LeadRepository,
        outcomes::OutcomeRepository,
    },
    detection::{GhostDetector, GhostSweeper},
    infrastructure::{directories::ResolvedPaths, shutdown::Shutdown},
    insights::InsightCache,
    pipeline::MessagePipeline,
    tasks::{processor::SyncProcessor, scheduler::configure_ghost_sweep},
    tracker::TrackerService,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct JobmailApp {
    _paths: ResolvedPaths,
    pool: SqlitePool,
    scheduler: JobScheduler,
    sync_handle: JoinHandle<()>,
    tracker: Arc<TrackerService>,
    shutdown: Shutdown,
}

impl JobmailApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let pool = db::init_pool(&paths.db_path).await?;

        let http_client = Client::builder()
            .user_agent(format!("jobmail-signal/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let backend: Option<Arc<dyn TextClassifier>> = match config.escalation.api_key {
            Some(_) => Some(Arc::new(LlmClient::new(
                http_client,
                config.escalation.clone(),
            ))),
            None => {
                tracing::info!(
                    target: "escalation",
                    "LLM_API_KEY not set; low-confidence messages keep their pattern verdict"
                );
                None
            }
        };
        let escalation = EscalationClassifier::new(backend, &config.escalation);
        let pipeline = Arc::new(MessagePipeline::new(&config, escalation));

        let applications = ApplicationRepository::new(pool.clone());
        let processor = Arc::new(SyncProcessor::new(
            pipeline,
            Arc::new(SqliteMailbox::new(pool.clone())),
            applications.clone(),
            OutcomeRepository::new(pool.clone()),
            CursorRepository::new(pool.clone()),
            config.sync.clone(),
        ));
        let sync_handle = processor.spawn(shutdown.subscribe());

        let sweeper = GhostSweeper::new(GhostDetector::new(&config.ghost), applications.clone());
        let tracker = Arc::new(TrackerService::new(
            applications,
            LeadRepository::new(pool.clone()),
            Arc::new(sweeper),
            InsightCache::new(config.insights.cache_ttl),
        ));

        let timezone: Tz = config
            .timezone
            .parse()
            .map_err(|err| anyhow!("invalid timezone {}: {err}", config.timezone))?;
        let scheduler =
            configure_ghost_sweep(&config.ghost.sweep_cron, timezone, tracker.clone()).await?;

        Ok(Self {
            _paths: paths,
            pool,
            scheduler,
            sync_handle,
            tracker,
            shutdown,
        })
    }

    /// Query and user-action surface for an API layer.
    pub fn tracker(&self) -> Arc<TrackerService> {
        self.tracker.clone()
    }

    pub async fn run(self) -> Result<()> {
        let JobmailApp {
            _paths: _,
            pool,
            mut scheduler,
            mut sync_handle,
            tracker: _,
            shutdown,
        } = self;

        tracing::info!("jobmail signal service started");

        let mut shutdown_listener = shutdown.subscribe();
        shutdown_listener.notified().await;
        tracing::info!("shutdown requested");
        shutdown.trigger();

        match timeout(SHUTDOWN_TIMEOUT, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(target: "scheduler", ?err, "failed to stop scheduler");
            }
            Err(_) => {
                tracing::warn!(
                    target: "scheduler",
                    "scheduler did not stop within {:?}",
                    SHUTDOWN_TIMEOUT
                );
            }
        }

        let sync_sleep = tokio::time::sleep(SHUTDOWN_TIMEOUT);
        tokio::pin!(sync_sleep);
        tokio::select! {
            res = &mut sync_handle => {
                if let Err(err) = res {
                    if err.is_panic() {
                        tracing::error!(target: "sync", "sync task panicked");
                    }
                }
            }
            _ = &mut sync_sleep => {
                tracing::warn!(
                    target: "sync",
                    "sync task did not stop within {:?}; aborting",
                    SHUTDOWN_TIMEOUT
                );
                sync_handle.abort();
            }
        }

        if timeout(SHUTDOWN_TIMEOUT, pool.close()).await.is_err() {
            tracing::warn!(
                target: "db",
                "database pool did not close within {:?}",
                SHUTDOWN_TIMEOUT
            );
        }

        tracing::info!("jobmail signal service stopped");
        Ok(())
    }
}
