//! SQLite schema for conversations, feedback, jobs and results
//!
//! All timestamps are milliseconds since the epoch. Statements created by
//! an analysis are keyed by their representative response id, so feedback
//! recorded against a statement and feedback recorded against a raw
//! response share one id space.

use sqlx::{Pool, Sqlite};
use tracing::info;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        error TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS responses (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        author_id TEXT,
        text TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_responses_conversation ON responses(conversation_id)",
    r#"
    CREATE TABLE IF NOT EXISTS statements (
        id TEXT NOT NULL,
        conversation_id TEXT NOT NULL,
        cluster_index INTEGER NOT NULL,
        bucket_name TEXT NOT NULL,
        text TEXT NOT NULL,
        representative_id TEXT NOT NULL,
        response_ids TEXT NOT NULL,
        PRIMARY KEY (conversation_id, id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feedback (
        statement_id TEXT NOT NULL,
        voter_id TEXT NOT NULL,
        value TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        PRIMARY KEY (statement_id, voter_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analysis_jobs (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        status TEXT NOT NULL,
        strategy TEXT NOT NULL,
        locked_at INTEGER,
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_jobs_status ON analysis_jobs(status)",
    r#"
    CREATE TABLE IF NOT EXISTS analysis_results (
        conversation_id TEXT NOT NULL,
        job_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_results_conversation ON analysis_results(conversation_id, created_at)",
];

/// Create every table and index that does not exist yet.
///
/// Idempotent; safe to run at every startup.
pub async fn initialize(pool: &Pool<Sqlite>) -> Result<(), sqlx::Error> {
    info!("Initializing database schema");
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
