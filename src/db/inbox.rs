use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use sqlx::{
    query, query_as,
    sqlite::{SqlitePool, SqliteRow},
    FromRow, Row,
};

use crate::domain::InboundMessage;

/// A message together with its position in the user's mailbox stream.
#[derive(Debug, Clone, PartialEq)]
pub struct MailItem {
    pub seq: i64,
    pub message: InboundMessage,
}

/// Where synced mail comes from. Items are returned in ascending `seq`.
pub trait MailSource: Send + Sync {
    fn users(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    fn fetch_batch<'a>(
        &'a self,
        user_id: &'a str,
        after_seq: i64,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<MailItem>>>;
}

/// Mail already pulled from the provider and staged in sqlite.
#[derive(Clone)]
pub struct SqliteMailbox {
    pool: SqlitePool,
}

impl SqliteMailbox {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stages a message. A mailbox id seen before for the same user is ignored.
    pub async fn ingest(&self, user_id: &str, message: &InboundMessage) -> Result<bool> {
        let affected = query(
            r#"INSERT OR IGNORE INTO inbound_messages
                (user_id, mailbox_id, thread_id, subject, sender_address, sender_name,
                 received_at, preview, body)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#,
        )
        .bind(user_id)
        .bind(&message.mailbox_id)
        .bind(&message.thread_id)
        .bind(&message.subject)
        .bind(&message.sender_address)
        .bind(&message.sender_name)
        .bind(message.received_at)
        .bind(&message.preview)
        .bind(&message.body)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn load_users(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            query_as(r#"SELECT DISTINCT user_id FROM inbound_messages ORDER BY user_id"#)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(user_id,)| user_id).collect())
    }

    async fn load_after(
        &self,
        user_id: &str,
        after_seq: i64,
        limit: usize,
    ) -> Result<Vec<MailItem>> {
        let rows = query_as::<_, StagedRow>(
            r#"SELECT seq, mailbox_id, thread_id, subject, sender_address, sender_name,
                      received_at, preview, body
                FROM inbound_messages
                WHERE user_id = ?1 AND seq > ?2
                ORDER BY seq ASC
                LIMIT ?3"#,
        )
        .bind(user_id)
        .bind(after_seq)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|row| row.0).collect())
    }
}

impl MailSource for SqliteMailbox {
    fn users(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(self.load_users())
    }

    fn fetch_batch<'a>(
        &'a self,
        user_id: &'a str,
        after_seq: i64,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<MailItem>>> {
        Box::pin(self.load_after(user_id, after_seq, limit))
    }
}

struct StagedRow(MailItem);

impl<'r> FromRow<'r, SqliteRow> for StagedRow {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        Ok(Self(MailItem {
            seq: row.try_get("seq")?,
            message: InboundMessage {
                mailbox_id: row.try_get("mailbox_id")?,
                thread_id: row.try_get("thread_id")?,
                subject: row.try_get("subject")?,
                sender_address: row.try_get("sender_address")?,
                sender_name: row.try_get("sender_name")?,
                received_at: row.try_get("received_at")?,
                preview: row.try_get("preview")?,
                body: row.try_get("body")?,
            },
        }))
    }
}

/// Per-user high-water mark of fully persisted mail.
#[derive(Clone)]
pub struct CursorRepository {
    pool: SqlitePool,
}

impl CursorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, user_id: &str) -> Result<i64> {
        let row: Option<(i64,)> =
            query_as(r#"SELECT last_seq FROM sync_cursors WHERE user_id = ?1"#)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(seq,)| seq).unwrap_or(0))
    }

    /// Moves the cursor forward. A lower value never rewinds it.
    pub async fn advance(&self, user_id: &str, seq: i64, now: DateTime<Utc>) -> Result<()> {
        query(
            r#"INSERT INTO sync_cursors (user_id, last_seq, updated_at) VALUES (?1, ?2, ?3)
                ON CONFLICT(user_id) DO UPDATE SET
                    last_seq = MAX(sync_cursors.last_seq, excluded.last_seq),
                    updated_at = excluded.updated_at"#,
        )
        .bind(user_id)
        .bind(seq)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
