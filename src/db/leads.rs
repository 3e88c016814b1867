use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnection, SqlitePool, SqliteRow},
    FromRow, Row,
};

use super::applications::{insert_application, insert_event, insert_link, NewApplication};
use crate::domain::{
    Category, ClassificationResult, LeadState, PendingLead, Provenance, TrackedApplication,
};

const LEAD_COLUMNS: &str = "id, user_id, message, category, confidence, provenance, entities, \
     decision, company_guess, role_guess, state, created_at";

#[derive(Clone)]
pub struct LeadRepository {
    pool: SqlitePool,
}

impl LeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, lead_id: &str) -> Result<Option<PendingLead>> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM pending_leads WHERE id = ?1");
        let row = query_as::<_, LeadRow>(&sql)
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LeadRow::into_lead).transpose()
    }

    /// Unresolved leads, newest first.
    pub async fn pending_for_user(&self, user_id: &str) -> Result<Vec<PendingLead>> {
        let sql = format!(
            "SELECT {LEAD_COLUMNS} FROM pending_leads WHERE user_id = ?1 AND state = 'pending' \
             ORDER BY created_at DESC, id ASC"
        );
        let rows = query_as::<_, LeadRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LeadRow::into_lead).collect()
    }

    /// Turns a pending lead into an application and links the lead's message
    /// to it. Returns `None` when the lead is no longer pending.
    pub async fn confirm(
        &self,
        lead: &PendingLead,
        new: NewApplication,
        now: DateTime<Utc>,
    ) -> Result<Option<TrackedApplication>> {
        let mut tx = self.pool.begin().await?;
        let mut application = insert_application(&mut *tx, new, now).await?;

        let affected = query(
            r#"UPDATE pending_leads SET state = 'confirmed', application_id = ?1, resolved_at = ?2
                WHERE id = ?3 AND state = 'pending'"#,
        )
        .bind(&application.id)
        .bind(now)
        .bind(&lead.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        insert_link(
            &mut *tx,
            &lead.user_id,
            &lead.message.mailbox_id,
            &application.id,
            lead.classification.confidence(),
            now,
        )
        .await?;
        insert_event(
            &mut *tx,
            &application.id,
            "created_from_lead",
            None,
            "lead confirmed by user",
            &json!({
                "lead_id": lead.id,
                "mailbox_id": lead.message.mailbox_id,
                "category": lead.classification.category().as_str(),
            }),
            now,
        )
        .await?;
        tx.commit().await?;

        application.linked_message_ids.push(lead.message.mailbox_id.clone());
        application.last_linked_at = Some(now);
        Ok(Some(application))
    }

    /// Dismisses a pending lead. Returns false when it was already resolved.
    pub async fn reject(&self, lead_id: &str, reason: &str, now: DateTime<Utc>) -> Result<bool> {
        let affected = query(
            r#"UPDATE pending_leads SET state = 'rejected', reason = ?1, resolved_at = ?2
                WHERE id = ?3 AND state = 'pending'"#,
        )
        .bind(reason)
        .bind(now)
        .bind(lead_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }
}

/// Stores a lead. A message that already produced a lead is ignored.
pub(crate) async fn insert_lead(conn: &mut SqliteConnection, lead: &PendingLead) -> Result<bool> {
    let affected = query(
        r#"INSERT OR IGNORE INTO pending_leads
            (id, user_id, mailbox_id, message, category, confidence, provenance, entities,
             decision, company_guess, role_guess, state, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"#,
    )
    .bind(&lead.id)
    .bind(&lead.user_id)
    .bind(&lead.message.mailbox_id)
    .bind(serde_json::to_string(&lead.message)?)
    .bind(lead.classification.category().as_str())
    .bind(lead.classification.confidence())
    .bind(lead.classification.provenance().as_str())
    .bind(serde_json::to_string(&lead.classification.entities())?)
    .bind(serde_json::to_string(&lead.decision)?)
    .bind(&lead.company_guess)
    .bind(&lead.role_guess)
    .bind(lead.state.as_str())
    .bind(lead.created_at)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

struct LeadRow {
    id: String,
    user_id: String,
    message: String,
    category: String,
    confidence: f64,
    provenance: String,
    entities: String,
    decision: String,
    company_guess: Option<String>,
    role_guess: Option<String>,
    state: String,
    created_at: DateTime<Utc>,
}

impl LeadRow {
    fn into_lead(self) -> Result<PendingLead> {
        let context = || format!("decoding lead {}", self.id);
        let category: Category = self.category.parse().with_context(context)?;
        let provenance: Provenance = self.provenance.parse().with_context(context)?;
        let classification = ClassificationResult::new(
            category,
            self.confidence,
            serde_json::from_str(&self.entities).with_context(context)?,
            provenance,
        );
        Ok(PendingLead {
            message: serde_json::from_str(&self.message).with_context(context)?,
            decision: serde_json::from_str(&self.decision).with_context(context)?,
            state: self.state.parse::<LeadState>().with_context(context)?,
            classification,
            company_guess: self.company_guess,
            role_guess: self.role_guess,
            created_at: self.created_at,
            user_id: self.user_id,
            id: self.id,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for LeadRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            message: row.try_get("message")?,
            category: row.try_get("category")?,
            confidence: row.try_get("confidence")?,
            provenance: row.try_get("provenance")?,
            entities: row.try_get("entities")?,
            decision: row.try_get("decision")?,
            company_guess: row.try_get("company_guess")?,
            role_guess: row.try_get("role_guess")?,
            state: row.try_get("state")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{applications::ApplicationRepository, inbox::testing::message, memory_pool},
        domain::{ApplicationStatus, Entities, MatchDecision},
    };

    fn lead(id: &str, mailbox_id: &str) -> PendingLead {
        PendingLead {
            id: id.to_string(),
            user_id: "u1".to_string(),
            message: message(mailbox_id, "talent@globex.com", "Interview", "Let's talk"),
            classification: ClassificationResult::new(
                Category::InterviewInvite,
                0.9,
                Entities {
                    organizations: vec!["Globex".to_string()],
                    ..Entities::default()
                },
                Provenance::Pattern,
            ),
            decision: MatchDecision::NoMatch,
            company_guess: Some("Globex".to_string()),
            role_guess: None,
            state: LeadState::Pending,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn leads_are_unique_per_message() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        assert!(insert_lead(&mut conn, &lead("l1", "m1")).await.unwrap());
        assert!(!insert_lead(&mut conn, &lead("l2", "m1")).await.unwrap());
        drop(conn);

        let repo = LeadRepository::new(pool);
        let pending = repo.pending_for_user("u1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "l1");
        assert_eq!(pending[0].classification.entities().organizations, ["Globex"]);
    }

    #[tokio::test]
    async fn confirm_creates_linked_application_once() {
        let pool = memory_pool().await.unwrap();
        let pending = lead("l1", "m1");
        let mut conn = pool.acquire().await.unwrap();
        insert_lead(&mut conn, &pending).await.unwrap();
        drop(conn);

        let repo = LeadRepository::new(pool.clone());
        let new = NewApplication {
            user_id: "u1".to_string(),
            company_name: "Globex".to_string(),
            role_title: "Unknown Role".to_string(),
            status: ApplicationStatus::Interview,
            applied_at: Utc::now(),
            source: Some("email".to_string()),
        };
        let app = repo
            .confirm(&pending, new.clone(), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(repo.confirm(&pending, new, Utc::now()).await.unwrap().is_none());

        let apps = ApplicationRepository::new(pool);
        assert_eq!(apps.all_for_user("u1").await.unwrap().len(), 1);
        let stored = apps.get(&app.id).await.unwrap().unwrap();
        assert_eq!(stored.linked_message_ids, ["m1"]);
        assert!(repo.pending_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reject_only_resolves_pending_leads() {
        let pool = memory_pool().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        insert_lead(&mut conn, &lead("l1", "m1")).await.unwrap();
        drop(conn);

        let repo = LeadRepository::new(pool);
        assert!(repo.reject("l1", "not mine", Utc::now()).await.unwrap());
        assert!(!repo.reject("l1", "again", Utc::now()).await.unwrap());
        assert_eq!(repo.get("l1").await.unwrap().unwrap().state, LeadState::Rejected);
    }

    #[test]
    fn decoded_leads_keep_the_evidence_cap() {
        let row = LeadRow {
            id: "l1".to_string(),
            user_id: "u1".to_string(),
            message: serde_json::to_string(&message("m1", "a@b.com", "Interview", "hi")).unwrap(),
            category: Category::InterviewInvite.as_str().to_string(),
            confidence: 0.9,
            provenance: Provenance::Pattern.as_str().to_string(),
            entities: serde_json::to_string(&Entities::default()).unwrap(),
            decision: serde_json::to_string(&MatchDecision::NoMatch).unwrap(),
            company_guess: None,
            role_guess: None,
            state: LeadState::Pending.as_str().to_string(),
            created_at: Utc::now(),
        };
        let lead = row.into_lead().unwrap();
        assert_eq!(lead.classification.category(), Category::InterviewInvite);
        assert!(lead.classification.confidence() < 0.5);
    }
}
