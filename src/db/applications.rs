use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnection, SqlitePool, SqliteRow},
    FromRow, Row,
};

use crate::domain::{ApplicationStatus, GhostTransition, TrackedApplication};

const APPLICATION_COLUMNS: &str = "id, user_id, company_name, role_title, status, \
     status_changed_at, applied_at, source, created_at";

#[derive(Clone)]
pub struct ApplicationRepository {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_id: String,
    pub company_name: String,
    pub role_title: String,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationEvent {
    pub application_id: String,
    pub event_type: String,
    pub previous_status: Option<String>,
    pub reason: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl ApplicationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        new: NewApplication,
        now: DateTime<Utc>,
    ) -> Result<TrackedApplication> {
        let mut conn = self.pool.acquire().await?;
        insert_application(&mut conn, new, now).await
    }

    pub async fn get(&self, application_id: &str) -> Result<Option<TrackedApplication>> {
        let sql = format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1");
        let row = query_as::<_, ApplicationRow>(&sql)
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let mut apps = self.attach_links(row.user_id.clone(), vec![row]).await?;
                Ok(apps.pop())
            }
            None => Ok(None),
        }
    }

    pub async fn all_for_user(&self, user_id: &str) -> Result<Vec<TrackedApplication>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = ?1 \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = query_as::<_, ApplicationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_links(user_id.to_string(), rows).await
    }

    /// Applications that can still receive mail: every non-terminal status.
    pub async fn open_for_user(&self, user_id: &str) -> Result<Vec<TrackedApplication>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = ?1 \
             AND status NOT IN ('accepted', 'rejected', 'withdrawn', 'ghosted') \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = query_as::<_, ApplicationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_links(user_id.to_string(), rows).await
    }

    pub async fn ghostable_for_user(&self, user_id: &str) -> Result<Vec<TrackedApplication>> {
        let sql = format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = ?1 \
             AND status IN ('applied', 'screening') ORDER BY created_at ASC, id ASC"
        );
        let rows = query_as::<_, ApplicationRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_links(user_id.to_string(), rows).await
    }

    /// Moves one application to `ghosted` if it is still in the status the
    /// sweep observed. Returns false when a concurrent update got there first.
    pub async fn mark_ghosted(
        &self,
        transition: &GhostTransition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let affected = query(
            r#"UPDATE applications SET status = 'ghosted', status_changed_at = ?1
                WHERE id = ?2 AND status = ?3"#,
        )
        .bind(now)
        .bind(&transition.application_id)
        .bind(transition.previous_status.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        let data = json!({
            "days_since_update": transition.days_since_update,
            "company_name": transition.company_name,
            "role_title": transition.role_title,
        });
        insert_event(
            &mut *tx,
            &transition.application_id,
            "auto_ghosted",
            Some(transition.previous_status.as_str()),
            &transition.reason,
            &data,
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn events_for(&self, application_id: &str) -> Result<Vec<ApplicationEvent>> {
        let rows = query(
            r#"SELECT application_id, event_type, previous_status, reason, data, created_at
                FROM application_events WHERE application_id = ?1 ORDER BY id ASC"#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ApplicationEvent> {
                let data: String = row.try_get("data")?;
                Ok(ApplicationEvent {
                    application_id: row.try_get("application_id")?,
                    event_type: row.try_get("event_type")?,
                    previous_status: row.try_get("previous_status")?,
                    reason: row.try_get("reason")?,
                    data: serde_json::from_str(&data).context("decoding event data")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Every user that owns at least one application.
    pub async fn users(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            query_as(r#"SELECT DISTINCT user_id FROM applications ORDER BY user_id"#)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }

    async fn attach_links(
        &self,
        user_id: String,
        rows: Vec<ApplicationRow>,
    ) -> Result<Vec<TrackedApplication>> {
        let links: Vec<(String, String, DateTime<Utc>)> = query_as(
            r#"SELECT application_id, mailbox_id, linked_at FROM application_messages
                WHERE user_id = ?1 ORDER BY linked_at ASC, mailbox_id ASC"#,
        )
        .bind(&user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_application: HashMap<String, Vec<(String, DateTime<Utc>)>> = HashMap::new();
        for (application_id, mailbox_id, linked_at) in links {
            by_application
                .entry(application_id)
                .or_default()
                .push((mailbox_id, linked_at));
        }

        rows.into_iter()
            .map(|row| {
                let linked = by_application.remove(&row.id).unwrap_or_default();
                row.into_application(linked)
            })
            .collect()
    }
}

pub(crate) async fn insert_application(
    conn: &mut SqliteConnection,
    new: NewApplication,
    now: DateTime<Utc>,
) -> Result<TrackedApplication> {
    let id = uuid::Uuid::new_v4().to_string();
    query(
        r#"INSERT INTO applications
            (id, user_id, company_name, role_title, status, status_changed_at, applied_at,
             source, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
    )
    .bind(&id)
    .bind(&new.user_id)
    .bind(&new.company_name)
    .bind(&new.role_title)
    .bind(new.status.as_str())
    .bind(now)
    .bind(new.applied_at)
    .bind(&new.source)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(TrackedApplication {
        id,
        user_id: new.user_id,
        company_name: new.company_name,
        role_title: new.role_title,
        status: new.status,
        status_changed_at: now,
        applied_at: new.applied_at,
        source: new.source,
        created_at: now,
        linked_message_ids: Vec::new(),
        last_linked_at: None,
    })
}

/// Links a message to an application. Returns false if the message was
/// already linked.
pub(crate) async fn insert_link(
    conn: &mut SqliteConnection,
    user_id: &str,
    mailbox_id: &str,
    application_id: &str,
    confidence: f64,
    now: DateTime<Utc>,
) -> Result<bool> {
    let affected = query(
        r#"INSERT OR IGNORE INTO application_messages
            (user_id, mailbox_id, application_id, confidence, linked_at)
            VALUES (?1, ?2, ?3, ?4, ?5)"#,
    )
    .bind(user_id)
    .bind(mailbox_id)
    .bind(application_id)
    .bind(confidence)
    .bind(now)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    Ok(affected > 0)
}

pub(crate) async fn insert_event(
    conn: &mut SqliteConnection,
    application_id: &str,
    event_type: &str,
    previous_status: Option<&str>,
    reason: &str,
    data: &serde_json::Value,
    now: DateTime<Utc>,
) -> Result<()> {
    query(
        r#"INSERT INTO application_events
            (application_id, event_type, previous_status, reason, data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
    )
    .bind(application_id)
    .bind(event_type)
    .bind(previous_status)
    .bind(reason)
    .bind(data.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

struct ApplicationRow {
    id: String,
    user_id: String,
    company_name: String,
    role_title: String,
    status: String,
    status_changed_at: DateTime<Utc>,
    applied_at: DateTime<Utc>,
    source: Option<String>,
    created_at: DateTime<Utc>,
}

impl ApplicationRow {
    fn into_application(self, linked: Vec<(String, DateTime<Utc>)>) -> Result<TrackedApplication> {
        let status = self
            .status
            .parse::<ApplicationStatus>()
            .with_context(|| format!("application {} has a bad status", self.id))?;
        let last_linked_at = linked.iter().map(|(_, at)| *at).max();
        Ok(TrackedApplication {
            id: self.id,
            user_id: self.user_id,
            company_name: self.company_name,
            role_title: self.role_title,
            status,
            status_changed_at: self.status_changed_at,
            applied_at: self.applied_at,
            source: self.source,
            created_at: self.created_at,
            linked_message_ids: linked.into_iter().map(|(id, _)| id).collect(),
            last_linked_at,
        })
    }
}

impl<'r> FromRow<'r, SqliteRow> for ApplicationRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            company_name: row.try_get("company_name")?,
            role_title: row.try_get("role_title")?,
            status: row.try_get("status")?,
            status_changed_at: row.try_get("status_changed_at")?,
            applied_at: row.try_get("applied_at")?,
            source: row.try_get("source")?,
            created_at: row.try_get("created_at")?,
        })
    }
}


#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn open_applications_exclude_terminal_statuses() {
        let pool = memory_pool().await.unwrap();
        let now = Utc::now();
        testing::seed(&pool, "u1", "Acme", ApplicationStatus::Applied, now).await;
        testing::seed(&pool, "u1", "Globex", ApplicationStatus::Rejected, now).await;
        testing::seed(&pool, "u2", "Initech", ApplicationStatus::Interview, now).await;

        let repo = ApplicationRepository::new(pool);
        let open = repo.open_for_user("u1").await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].company_name, "Acme");
        assert_eq!(repo.users().await.unwrap(), vec!["u1", "u2"]);
    }

    #[tokio::test]
    async fn links_are_attached_and_deduplicated() {
        let pool = memory_pool().await.unwrap();
        let now = Utc::now();
        let app = testing::seed(&pool, "u1", "Acme", ApplicationStatus::Applied, now).await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(insert_link(&mut conn, "u1", "m1", &app.id, 0.95, now).await.unwrap());
        assert!(!insert_link(&mut conn, "u1", "m1", &app.id, 0.95, now).await.unwrap());
        drop(conn);

        let repo = ApplicationRepository::new(pool);
        let loaded = repo.get(&app.id).await.unwrap().unwrap();
        assert_eq!(loaded.linked_message_ids, vec!["m1"]);
        assert!(loaded.last_linked_at.is_some());
    }

    #[tokio::test]
    async fn ghosting_is_conditional_and_audited() {
        let pool = memory_pool().await.unwrap();
        let old = Utc::now() - Duration::days(20);
        let app = testing::seed(&pool, "u1", "Acme", ApplicationStatus::Applied, old).await;
        let repo = ApplicationRepository::new(pool);

        let transition = GhostTransition {
            application_id: app.id.clone(),
            company_name: app.company_name.clone(),
            role_title: app.role_title.clone(),
            previous_status: ApplicationStatus::Applied,
            days_since_update: 20,
            reason: "no response".to_string(),
        };
        assert!(repo.mark_ghosted(&transition, Utc::now()).await.unwrap());
        assert!(!repo.mark_ghosted(&transition, Utc::now()).await.unwrap());

        let stored = repo.get(&app.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Ghosted);

        let events = repo.events_for(&app.id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "auto_ghosted");
        assert_eq!(events[0].previous_status.as_deref(), Some("applied"));
        assert_eq!(events[0].data["days_since_update"], 20);
    }
}
