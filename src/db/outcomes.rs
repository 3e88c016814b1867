use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{query, query_as, sqlite::SqlitePool};

use super::{
    applications::{insert_event, insert_link},
    leads::insert_lead,
};
use crate::{
    domain::{LeadState, MatchDecision, PendingLead},
    pipeline::MessageOutcome,
};

/// What became of a message once its outcome was written.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// The message had already been persisted by an earlier run.
    Duplicate,
    AutoLinked { application_id: String },
    Lead { lead_id: String },
    /// Recorded as processed, nothing else to do.
    Ignored,
}

#[derive(Clone)]
pub struct OutcomeRepository {
    pool: SqlitePool,
}

impl OutcomeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Writes one message outcome atomically. Retrying a message that was
    /// already written is a no-op.
    pub async fn persist(
        &self,
        user_id: &str,
        outcome: &MessageOutcome,
        now: DateTime<Utc>,
    ) -> Result<Disposition> {
        let message = &outcome.message;
        let classification = &outcome.classification;
        let mut tx = self.pool.begin().await?;

        let inserted = query(
            r#"INSERT OR IGNORE INTO processed_messages
                (user_id, mailbox_id, category, confidence, provenance, entities,
                 match_application_id, match_confidence, processed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
        )
        .bind(user_id)
        .bind(&message.mailbox_id)
        .bind(classification.category().as_str())
        .bind(classification.confidence())
        .bind(classification.provenance().as_str())
        .bind(serde_json::to_string(&classification.entities())?)
        .bind(outcome.decision.application_id())
        .bind(outcome.decision.confidence())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            tx.rollback().await?;
            return Ok(Disposition::Duplicate);
        }

        let disposition = if !classification.category().is_job_related() {
            Disposition::Ignored
        } else if let MatchDecision::Matched {
            application_id,
            confidence,
        } = &outcome.decision
        {
            let linked = insert_link(
                &mut *tx,
                user_id,
                &message.mailbox_id,
                application_id,
                *confidence,
                now,
            )
            .await?;
            if linked {
                insert_event(
                    &mut *tx,
                    application_id,
                    "email_linked",
                    None,
                    "message matched automatically",
                    &json!({
                        "mailbox_id": message.mailbox_id,
                        "category": classification.category().as_str(),
                        "confidence": confidence,
                    }),
                    now,
                )
                .await?;
            }
            Disposition::AutoLinked {
                application_id: application_id.clone(),
            }
        } else {
            let lead = PendingLead {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                message: message.clone(),
                classification: classification.clone(),
                decision: outcome.decision.clone(),
                company_guess: outcome.company_guess.clone(),
                role_guess: outcome.role_guess.clone(),
                state: LeadState::Pending,
                created_at: now,
            };
            insert_lead(&mut *tx, &lead).await?;
            Disposition::Lead { lead_id: lead.id }
        };

        tx.commit().await?;
        Ok(disposition)
    }

    #[cfg(test)]
    pub(crate) async fn is_processed(&self, user_id: &str, mailbox_id: &str) -> Result<bool> {
        let row: Option<(String,)> = query_as(
            r#"SELECT mailbox_id FROM processed_messages WHERE user_id = ?1 AND mailbox_id = ?2"#,
        )
        .bind(user_id)
        .bind(mailbox_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}
