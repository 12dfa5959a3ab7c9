//! SQLite implementation of the job and conversation repositories

use super::schema;
use async_trait::async_trait;
use sensemaker_application::{
    ConversationRepository, JobOutcome, JobRepository, RepositoryError,
};
use sensemaker_domain::{
    AnalysisJob, AnalysisReport, ConversationId, FeedbackValue, FeedbackVote, JobStatus,
    Response, reclaim_cutoff,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite, Transaction};
use std::str::FromStr;
use tracing::{debug, info};

fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Both repositories over one connection pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open a pool for `url`, creating the database file if needed.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(storage)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(storage)?;
        info!("Connected to {}", url);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Create the schema (idempotent).
    pub async fn initialize(&self) -> Result<(), RepositoryError> {
        schema::initialize(&self.pool).await.map_err(storage)
    }

    pub async fn add_response(
        &self,
        conversation_id: &ConversationId,
        response: &Response,
        created_at: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query("INSERT OR IGNORE INTO conversations (id) VALUES (?)")
            .bind(conversation_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        sqlx::query(
            "INSERT INTO responses (id, conversation_id, author_id, text, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(response.id.as_str())
        .bind(conversation_id.as_str())
        .bind(response.author_id.as_deref())
        .bind(&response.text)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    /// Store a vote, replacing the voter's earlier vote on the same
    /// statement only if this one is newer.
    pub async fn record_feedback(&self, vote: &FeedbackVote) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO feedback (statement_id, voter_id, value, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(statement_id, voter_id) DO UPDATE \
             SET value = excluded.value, created_at = excluded.created_at \
             WHERE excluded.created_at >= feedback.created_at",
        )
        .bind(&vote.statement_id)
        .bind(&vote.voter_id)
        .bind(vote.value.as_str())
        .bind(vote.timestamp)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    /// Most recently saved report for a conversation.
    pub async fn latest_report(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<AnalysisReport>, RepositoryError> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM analysis_results WHERE conversation_id = ? \
             ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(conversation_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        payload
            .map(|p| {
                serde_json::from_str(&p).map_err(|e| RepositoryError::Serialization(e.to_string()))
            })
            .transpose()
    }

    pub async fn conversation_error(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<String>, RepositoryError> {
        let error: Option<Option<String>> =
            sqlx::query_scalar("SELECT error FROM conversations WHERE id = ?")
                .bind(conversation_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(storage)?;
        Ok(error.flatten())
    }
}

fn job_from_row(row: &SqliteRow) -> Result<AnalysisJob, RepositoryError> {
    let invalid = |e: sensemaker_domain::DomainError| RepositoryError::Serialization(e.to_string());

    let status: String = row.try_get("status").map_err(storage)?;
    let strategy: String = row.try_get("strategy").map_err(storage)?;
    let conversation_id: String = row.try_get("conversation_id").map_err(storage)?;
    let attempts: i64 = row.try_get("attempts").map_err(storage)?;

    Ok(AnalysisJob {
        id: row.try_get("id").map_err(storage)?,
        conversation_id: ConversationId::new(conversation_id),
        status: JobStatus::from_str(&status).map_err(invalid)?,
        strategy: strategy.parse().map_err(invalid)?,
        locked_at: row.try_get("locked_at").map_err(storage)?,
        attempts: u32::try_from(attempts).unwrap_or(u32::MAX),
        last_error: row.try_get("last_error").map_err(storage)?,
    })
}

#[async_trait]
impl JobRepository for SqliteStore {
    async fn create_job(&self, job: &AnalysisJob) -> Result<(), RepositoryError> {
        let now = now_ms();
        sqlx::query(
            "INSERT INTO analysis_jobs \
             (id, conversation_id, status, strategy, locked_at, attempts, last_error, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(job.conversation_id.as_str())
        .bind(job.status.as_str())
        .bind(job.strategy.as_str())
        .bind(job.locked_at)
        .bind(i64::from(job.attempts))
        .bind(job.last_error.as_deref())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn claim(
        &self,
        job_id: &str,
        now_ms: i64,
        lock_ttl_ms: u64,
    ) -> Result<Option<i64>, RepositoryError> {
        let cutoff = reclaim_cutoff(now_ms, lock_ttl_ms);
        let result = sqlx::query(
            "UPDATE analysis_jobs \
             SET status = 'running', locked_at = ?, attempts = attempts + 1, updated_at = ? \
             WHERE id = ? AND (status = 'queued' \
                OR (status = 'running' AND (locked_at IS NULL OR locked_at < ?)))",
        )
        .bind(now_ms)
        .bind(now_ms)
        .bind(job_id)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        let claimed = result.rows_affected() == 1;
        debug!(job_id, claimed, "Claim attempt");
        Ok(claimed.then_some(now_ms))
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<AnalysisJob>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, conversation_id, status, strategy, locked_at, attempts, last_error \
             FROM analysis_jobs WHERE id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        row.as_ref().map(job_from_row).transpose()
    }

    async fn finish(
        &self,
        job_id: &str,
        token: i64,
        outcome: &JobOutcome,
    ) -> Result<bool, RepositoryError> {
        let (status, error) = match outcome {
            JobOutcome::Succeeded => (JobStatus::Succeeded, None),
            JobOutcome::Failed(e) => (JobStatus::Failed, Some(e.as_str())),
        };
        let result = sqlx::query(
            "UPDATE analysis_jobs SET status = ?, last_error = ?, updated_at = ? \
             WHERE id = ? AND status = 'running' AND locked_at = ?",
        )
        .bind(status.as_str())
        .bind(error)
        .bind(now_ms())
        .bind(job_id)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete(
        &self,
        job_id: &str,
        token: i64,
        report: &AnalysisReport,
    ) -> Result<bool, RepositoryError> {
        let payload = serde_json::to_string(report)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(storage)?;

        let result = sqlx::query(
            "UPDATE analysis_jobs SET status = 'succeeded', last_error = NULL, updated_at = ? \
             WHERE id = ? AND status = 'running' AND locked_at = ?",
        )
        .bind(now_ms())
        .bind(job_id)
        .bind(token)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        if result.rows_affected() != 1 {
            tx.rollback().await.map_err(storage)?;
            debug!(job_id, token, "Completion lost to a newer claim");
            return Ok(false);
        }

        write_report(&mut tx, job_id, report, &payload).await?;
        tx.commit().await.map_err(storage)?;
        info!(
            "Saved {} statements for conversation {}",
            report.bucket_count(),
            report.conversation_id
        );
        Ok(true)
    }
}

/// Replace the conversation's statements and append the report row.
async fn write_report(
    tx: &mut Transaction<'_, Sqlite>,
    job_id: &str,
    report: &AnalysisReport,
    payload: &str,
) -> Result<(), RepositoryError> {
    let conversation = report.conversation_id.as_str();

    sqlx::query("DELETE FROM statements WHERE conversation_id = ?")
        .bind(conversation)
        .execute(&mut **tx)
        .await
        .map_err(storage)?;

    for result in &report.consolidations {
        for bucket in &result.buckets {
            let Some(representative) = bucket.representative_id() else {
                continue;
            };
            let ids = serde_json::to_string(&bucket.response_ids)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
            sqlx::query(
                "INSERT OR REPLACE INTO statements \
                 (id, conversation_id, cluster_index, bucket_name, text, representative_id, response_ids) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(representative.as_str())
            .bind(conversation)
            .bind(result.cluster_index as i64)
            .bind(&bucket.bucket_name)
            .bind(&bucket.consolidated_statement)
            .bind(representative.as_str())
            .bind(ids)
            .execute(&mut **tx)
            .await
            .map_err(storage)?;
        }
    }

    sqlx::query(
        "INSERT INTO analysis_results (conversation_id, job_id, payload, created_at) \
         VALUES (?, ?, ?, ?)",
    )
    .bind(conversation)
    .bind(job_id)
    .bind(payload)
    .bind(now_ms())
    .execute(&mut **tx)
    .await
    .map_err(storage)?;
    Ok(())
}

#[async_trait]
impl ConversationRepository for SqliteStore {
    async fn responses(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<Response>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, author_id, text FROM responses WHERE conversation_id = ? \
             ORDER BY created_at, id",
        )
        .bind(conversation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(storage)?;
                let text: String = row.try_get("text").map_err(storage)?;
                let author: Option<String> = row.try_get("author_id").map_err(storage)?;
                let response = Response::new(id, text);
                Ok(match author {
                    Some(author) => response.with_author(author),
                    None => response,
                })
            })
            .collect()
    }

    async fn feedback(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<FeedbackVote>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT statement_id, voter_id, value, created_at FROM feedback \
             WHERE statement_id IN (SELECT id FROM responses WHERE conversation_id = ?) \
                OR statement_id IN (SELECT id FROM statements WHERE conversation_id = ?) \
             ORDER BY created_at",
        )
        .bind(conversation_id.as_str())
        .bind(conversation_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| {
                let value: String = row.try_get("value").map_err(storage)?;
                Ok(FeedbackVote {
                    statement_id: row.try_get("statement_id").map_err(storage)?,
                    voter_id: row.try_get("voter_id").map_err(storage)?,
                    value: FeedbackValue::from_str(&value)
                        .map_err(RepositoryError::Serialization)?,
                    timestamp: row.try_get("created_at").map_err(storage)?,
                })
            })
            .collect()
    }

    async fn set_conversation_error(
        &self,
        conversation_id: &ConversationId,
        error: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO conversations (id, error) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET error = excluded.error",
        )
        .bind(conversation_id.as_str())
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensemaker_domain::{
        AnalysisStrategy, ClusteringOutcome, ClusteringSummary, ConsensusMetrics,
        ConsolidationResult, KSelection, ResponseId, SemanticBucket,
    };

    const TTL: u64 = 60_000;

    async fn store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteStore::from_pool(pool);
        store.initialize().await.unwrap();
        store
    }

    async fn queued(store: &SqliteStore, id: &str) {
        let job = AnalysisJob::new(id, ConversationId::new("c1"), AnalysisStrategy::Full);
        store.create_job(&job).await.unwrap();
    }

    fn report(conversation: &str) -> AnalysisReport {
        let outcome = ClusteringOutcome {
            assignments: vec![0, 0, 0],
            k: 1,
            distortions: vec![],
            selection: KSelection::TooSmall,
        };
        let mut result = ConsolidationResult::empty(0);
        result.buckets.push(SemanticBucket::new(
            "Transit",
            "More buses are needed",
            vec![ResponseId::new("r1"), ResponseId::new("r2")],
        ));
        result.unconsolidated_ids.push(ResponseId::new("r3"));
        AnalysisReport {
            conversation_id: ConversationId::new(conversation),
            response_count: 3,
            clustering: ClusteringSummary::new(&outcome, vec![]),
            consolidations: vec![result],
            metrics: ConsensusMetrics::default(),
            agreements: vec![],
        }
    }

    #[tokio::test]
    async fn test_claim_queued_job() {
        let store = store().await;
        queued(&store, "j1").await;

        let token = store.claim("j1", 1_000, TTL).await.unwrap();
        assert_eq!(token, Some(1_000));

        let job = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.locked_at, Some(1_000));
        assert_eq!(job.attempts, 1);
    }

    #[tokio::test]
    async fn test_fresh_lock_blocks_second_claim() {
        let store = store().await;
        queued(&store, "j1").await;

        assert!(store.claim("j1", 1_000, TTL).await.unwrap().is_some());
        assert!(store.claim("j1", 2_000, TTL).await.unwrap().is_none());
        // exactly at the cutoff the lock is still fresh
        assert!(store.claim("j1", 1_000 + TTL as i64, TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_lock_is_reclaimed() {
        let store = store().await;
        queued(&store, "j1").await;

        store.claim("j1", 1_000, TTL).await.unwrap();
        let token = store.claim("j1", 1_001 + TTL as i64, TTL).await.unwrap();
        assert_eq!(token, Some(1_001 + TTL as i64));
        assert_eq!(store.get_job("j1").await.unwrap().unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let store = store().await;
        queued(&store, "j1").await;

        let (a, b, c) = tokio::join!(
            store.claim("j1", 5_000, TTL),
            store.claim("j1", 5_001, TTL),
            store.claim("j1", 5_002, TTL),
        );
        let winners = [a.unwrap(), b.unwrap(), c.unwrap()]
            .iter()
            .filter(|t| t.is_some())
            .count();
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_terminal_jobs_are_not_claimable() {
        let store = store().await;
        queued(&store, "j1").await;

        let token = store.claim("j1", 1_000, TTL).await.unwrap().unwrap();
        assert!(store.finish("j1", token, &JobOutcome::Succeeded).await.unwrap());
        assert!(store.claim("j1", i64::MAX, TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_superseded_worker_cannot_finish() {
        let store = store().await;
        queued(&store, "j1").await;

        let old = store.claim("j1", 1_000, TTL).await.unwrap().unwrap();
        let new = store
            .claim("j1", 2_000 + TTL as i64, TTL)
            .await
            .unwrap()
            .unwrap();

        let written = store
            .finish("j1", old, &JobOutcome::Failed("late".into()))
            .await
            .unwrap();
        assert!(!written);
        let job = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.is_owned_by(new));

        assert!(store
            .finish("j1", new, &JobOutcome::Failed("boom".into()))
            .await
            .unwrap());
        let job = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let store = store().await;
        assert!(store.get_job("nope").await.unwrap().is_none());
        assert!(store.claim("nope", 1, TTL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_responses_in_insertion_order() {
        let store = store().await;
        let conv = ConversationId::new("c1");
        store
            .add_response(&conv, &Response::new("r2", "second").with_author("u2"), 20)
            .await
            .unwrap();
        store
            .add_response(&conv, &Response::new("r1", "first"), 10)
            .await
            .unwrap();
        store
            .add_response(&ConversationId::new("other"), &Response::new("x", "x"), 5)
            .await
            .unwrap();

        let responses = store.responses(&conv).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].id.as_str(), "r1");
        assert_eq!(responses[1].author_id.as_deref(), Some("u2"));
        assert!(!responses[0].is_embedded());
    }

    #[tokio::test]
    async fn test_feedback_keeps_newest_vote() {
        let store = store().await;
        let conv = ConversationId::new("c1");
        store
            .add_response(&conv, &Response::new("r1", "text"), 1)
            .await
            .unwrap();

        store
            .record_feedback(&FeedbackVote::agree("r1", "alice", 20))
            .await
            .unwrap();
        store
            .record_feedback(&FeedbackVote::disagree("r1", "alice", 10))
            .await
            .unwrap();
        store
            .record_feedback(&FeedbackVote::pass("elsewhere", "bob", 30))
            .await
            .unwrap();

        let votes = store.feedback(&conv).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].value, FeedbackValue::Agree);
        assert_eq!(votes[0].timestamp, 20);
    }

    async fn running(store: &SqliteStore, id: &str, now: i64) -> i64 {
        queued(store, id).await;
        store.claim(id, now, TTL).await.unwrap().unwrap()
    }

    async fn result_rows(store: &SqliteStore) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM analysis_results")
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_complete_replaces_statements() {
        let store = store().await;
        let conv = ConversationId::new("c1");

        let t1 = running(&store, "j1", 1_000).await;
        let t2 = running(&store, "j2", 1_000).await;
        assert!(store.complete("j1", t1, &report("c1")).await.unwrap());
        assert!(store.complete("j2", t2, &report("c1")).await.unwrap());

        let statements: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM statements WHERE conversation_id = ?")
                .bind("c1")
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(statements, 1);

        let ids: String = sqlx::query_scalar("SELECT response_ids FROM statements WHERE id = 'r1'")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(ids, r#"["r1","r2"]"#);

        let latest = store.latest_report(&conv).await.unwrap().unwrap();
        assert_eq!(latest, report("c1"));
        let job = store.get_job("j2").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_reclaimed_job_completion_writes_nothing() {
        let store = store().await;
        let conv = ConversationId::new("c1");

        let old = running(&store, "j1", 1_000).await;
        let new = store
            .claim("j1", 2_000 + TTL as i64, TTL)
            .await
            .unwrap()
            .unwrap();

        assert!(!store.complete("j1", old, &report("c1")).await.unwrap());
        assert_eq!(result_rows(&store).await, 0);
        assert!(store.latest_report(&conv).await.unwrap().is_none());
        let job = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.is_owned_by(new));

        assert!(store.complete("j1", new, &report("c1")).await.unwrap());
        assert_eq!(result_rows(&store).await, 1);
    }

    #[tokio::test]
    async fn test_finished_job_cannot_complete() {
        let store = store().await;
        let token = running(&store, "j1", 1_000).await;
        assert!(store
            .finish("j1", token, &JobOutcome::Failed("boom".into()))
            .await
            .unwrap());

        assert!(!store.complete("j1", token, &report("c1")).await.unwrap());
        assert_eq!(result_rows(&store).await, 0);
    }

    #[tokio::test]
    async fn test_statement_feedback_is_loaded() {
        let store = store().await;
        let conv = ConversationId::new("c1");
        let token = running(&store, "j1", 1_000).await;
        store.complete("j1", token, &report("c1")).await.unwrap();
        store
            .record_feedback(&FeedbackVote::agree("r1", "alice", 1))
            .await
            .unwrap();

        let votes = store.feedback(&conv).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].statement_id, "r1");
    }

    #[tokio::test]
    async fn test_conversation_error_set_and_cleared() {
        let store = store().await;
        let conv = ConversationId::new("c1");

        store
            .set_conversation_error(&conv, Some("embedding failed"))
            .await
            .unwrap();
        assert_eq!(
            store.conversation_error(&conv).await.unwrap().as_deref(),
            Some("embedding failed")
        );

        store.set_conversation_error(&conv, None).await.unwrap();
        assert!(store.conversation_error(&conv).await.unwrap().is_none());
    }
}
