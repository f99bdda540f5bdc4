//! Database access for callscope
//!
//! SQLite via sqlx. Nested result documents (transcript, analysis, coaching
//! plan) are stored as JSON text columns; the processing history lives in its
//! own append-only table.

pub mod calls;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create callscope tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS calls (
            call_id TEXT PRIMARY KEY,
            user_id TEXT,
            audio_path TEXT NOT NULL,
            audio_name TEXT NOT NULL,
            audio_size INTEGER NOT NULL,
            audio_mime TEXT NOT NULL,
            status TEXT NOT NULL,
            transcript TEXT,
            analysis TEXT,
            coaching_plan TEXT,
            error TEXT,
            performance TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only audit trail. Rows are inserted by the pipeline and only
    // ever read back; no update or delete paths exist.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processing_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            call_id TEXT NOT NULL,
            step TEXT NOT NULL,
            status TEXT NOT NULL,
            message TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            duration_ms INTEGER,
            error TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_history_call_id ON processing_history(call_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (calls, processing_history)");

    Ok(())
}
