use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::{stream, StreamExt};
use tokio::{task::JoinHandle, time::sleep};

use crate::{
    config::SyncConfig,
    db::{
        applications::ApplicationRepository,
        inbox::{CursorRepository, MailItem, MailSource},
        outcomes::{Disposition, OutcomeRepository},
    },
    infrastructure::shutdown::ShutdownListener,
    pipeline::MessagePipeline,
};

/// Counters for one user's sync pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    pub fetched: usize,
    pub linked: usize,
    pub leads: usize,
    pub ignored: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub cursor: i64,
}

impl SyncReport {
    fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::AutoLinked { .. } => self.linked += 1,
            Disposition::Lead { .. } => self.leads += 1,
            Disposition::Ignored => self.ignored += 1,
            Disposition::Duplicate => self.duplicates += 1,
        }
    }
}

/// Pulls new mail per user, runs it through the pipeline and persists the
/// outcomes in mailbox order.
pub struct SyncProcessor {
    pipeline: Arc<MessagePipeline>,
    mailbox: Arc<dyn MailSource>,
    applications: ApplicationRepository,
    outcomes: OutcomeRepository,
    cursors: CursorRepository,
    config: SyncConfig,
}

impl SyncProcessor {
    pub fn new(
        pipeline: Arc<MessagePipeline>,
        mailbox: Arc<dyn MailSource>,
        applications: ApplicationRepository,
        outcomes: OutcomeRepository,
        cursors: CursorRepository,
        config: SyncConfig,
    ) -> Self {
        Self {
            pipeline,
            mailbox,
            applications,
            outcomes,
            cursors,
            config,
        }
    }

    pub fn spawn(self: Arc<Self>, mut shutdown: ShutdownListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run_loop(&mut shutdown).await;
        })
    }

    async fn run_loop(&self, shutdown: &mut ShutdownListener) {
        loop {
            if shutdown.is_triggered() {
                break;
            }
            if let Err(err) = self.sync_all(shutdown).await {
                tracing::error!(target: "sync", error = %err, "sync pass failed");
            }
            tokio::select! {
                _ = sleep(self.config.interval) => {}
                _ = shutdown.notified() => break,
            }
        }
        tracing::info!(target: "sync", "sync processor stopped");
    }

    pub async fn sync_all(&self, shutdown: &mut ShutdownListener) -> Result<()> {
        let users = self.mailbox.users().await.context("listing mailbox users")?;
        for user_id in users {
            if shutdown.is_triggered() {
                break;
            }
            match self.sync_user(&user_id, shutdown).await {
                Ok(report) if report.fetched > 0 => {
                    tracing::info!(
                        target: "sync",
                        user_id = %user_id,
                        fetched = report.fetched,
                        linked = report.linked,
                        leads = report.leads,
                        ignored = report.ignored,
                        failed = report.failed,
                        cursor = report.cursor,
                        "user synced"
                    );
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(
                        target: "sync",
                        user_id = %user_id,
                        error = %err,
                        "user sync failed"
                    );
                }
            }
        }
        Ok(())
    }

    /// Drains the user's backlog batch by batch. Stops early after a batch
    /// with a persistence failure so the failed message is retried next time.
    pub async fn sync_user(
        &self,
        user_id: &str,
        shutdown: &mut ShutdownListener,
    ) -> Result<SyncReport> {
        let mut report = SyncReport {
            cursor: self.cursors.get(user_id).await?,
            ..SyncReport::default()
        };

        loop {
            let batch = self
                .mailbox
                .fetch_batch(user_id, report.cursor, self.config.batch_size)
                .await
                .with_context(|| format!("fetching mail for {user_id}"))?;
            if batch.is_empty() {
                break;
            }
            let full_batch = batch.len() >= self.config.batch_size;
            report.fetched += batch.len();

            let failed_before = report.failed;
            let completed = self.process_batch(user_id, batch, &mut report, shutdown).await?;
            if !completed || report.failed > failed_before || !full_batch {
                break;
            }
        }
        Ok(report)
    }

    /// Returns false when shutdown interrupted the batch.
    async fn process_batch(
        &self,
        user_id: &str,
        batch: Vec<MailItem>,
        report: &mut SyncReport,
        shutdown: &mut ShutdownListener,
    ) -> Result<bool> {
        let snapshot = self
            .applications
            .open_for_user(user_id)
            .await
            .context("loading open applications")?;
        let user_address = user_id.contains('@').then_some(user_id);
        let pipeline = self.pipeline.as_ref();
        let snapshot = snapshot.as_slice();
        let listener = shutdown.clone();

        let mut outcomes = stream::iter(batch)
            .map(|item| {
                let mut listener = listener.clone();
                async move {
                    let outcome = pipeline
                        .process(item.message, user_address, snapshot, &mut listener)
                        .await;
                    (item.seq, outcome)
                }
            })
            .buffered(self.config.concurrency.max(1));

        let mut contiguous = true;
        loop {
            let next = tokio::select! {
                next = outcomes.next() => next,
                _ = shutdown.notified() => {
                    tracing::info!(target: "sync", user_id, "shutdown requested mid-batch");
                    return Ok(false);
                }
            };
            let Some((seq, outcome)) = next else {
                break;
            };
            if shutdown.is_triggered() {
                return Ok(false);
            }

            match self.outcomes.persist(user_id, &outcome, Utc::now()).await {
                Ok(disposition) => {
                    report.record(&disposition);
                    if contiguous {
                        self.cursors.advance(user_id, seq, Utc::now()).await?;
                        report.cursor = seq;
                    }
                }
                Err(err) => {
                    contiguous = false;
                    report.failed += 1;
                    tracing::warn!(
                        target: "sync",
                        user_id,
                        mailbox_id = %outcome.message.mailbox_id,
                        seq,
                        error = %err,
                        "failed to persist outcome, will retry on next sync"
                    );
                }
            }
        }
        Ok(true)
    }
}
