use std::{path::Path, str::FromStr, time::Duration};

use anyhow::Result;
use sqlx::{
    query,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions},
};

pub mod applications;
pub mod inbox;
pub mod leads;
pub mod outcomes;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS inbound_messages (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        mailbox_id TEXT NOT NULL,
        thread_id TEXT NOT NULL DEFAULT '',
        subject TEXT NOT NULL DEFAULT '',
        sender_address TEXT NOT NULL DEFAULT '',
        sender_name TEXT NOT NULL DEFAULT '',
        received_at TEXT NOT NULL,
        preview TEXT NOT NULL DEFAULT '',
        body TEXT,
        UNIQUE (user_id, mailbox_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sync_cursors (
        user_id TEXT PRIMARY KEY,
        last_seq INTEGER NOT NULL DEFAULT 0,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS applications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        company_name TEXT NOT NULL,
        role_title TEXT NOT NULL,
        status TEXT NOT NULL,
        status_changed_at TEXT NOT NULL,
        applied_at TEXT NOT NULL,
        source TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_applications_user_status ON applications (user_id, status)",
    r#"
    CREATE TABLE IF NOT EXISTS application_messages (
        user_id TEXT NOT NULL,
        mailbox_id TEXT NOT NULL,
        application_id TEXT NOT NULL,
        confidence REAL NOT NULL,
        linked_at TEXT NOT NULL,
        PRIMARY KEY (user_id, mailbox_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS application_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        application_id TEXT NOT NULL,
        event_type TEXT NOT NULL,
        previous_status TEXT,
        reason TEXT NOT NULL,
        data TEXT NOT NULL DEFAULT '{}',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS processed_messages (
        user_id TEXT NOT NULL,
        mailbox_id TEXT NOT NULL,
        category TEXT NOT NULL,
        confidence REAL NOT NULL,
        provenance TEXT NOT NULL,
        entities TEXT NOT NULL,
        match_application_id TEXT,
        match_confidence REAL NOT NULL DEFAULT 0,
        processed_at TEXT NOT NULL,
        PRIMARY KEY (user_id, mailbox_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS pending_leads (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        mailbox_id TEXT NOT NULL,
        message TEXT NOT NULL,
        category TEXT NOT NULL,
        confidence REAL NOT NULL,
        provenance TEXT NOT NULL,
        entities TEXT NOT NULL,
        decision TEXT NOT NULL,
        company_guess TEXT,
        role_guess TEXT,
        state TEXT NOT NULL DEFAULT 'pending',
        reason TEXT,
        application_id TEXT,
        created_at TEXT NOT NULL,
        resolved_at TEXT,
        UNIQUE (user_id, mailbox_id)
    )
    "#,
];

pub async fn init_pool(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database with the schema applied.
pub async fn memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub(crate) async fn migrate(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        query(statement).execute(pool).await?;
    }
    tracing::debug!(target: "db", statements = SCHEMA.len(), "schema ensured");
    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::query_as;

    use super::*;

    #[tokio::test]
    async fn file_pool_creates_schema_idempotently() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(&dir.path().join("jobmail.db")).await.unwrap();
        migrate(&pool).await.unwrap();

        let (tables,): (i64,) =
            query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(tables >= 7);
        pool.close().await;
    }
}
