use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::AppError;

/// Audit/claim-queue row shared by the Collector Scheduler's regular ticks
/// and the Backfill Planner's one-shot combination fetches (`run_kind`
/// distinguishes `"scheduled"` from `"backfill"`).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SourceFetchRun {
    pub id: i32,
    pub adapter_name: String,
    pub run_kind: String,
    pub status: String,
    pub combo_key: Option<String>,
    pub jobs_found: Option<i32>,
    pub jobs_new: Option<i32>,
    pub error: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SourceFetchRun {
    pub async fn enqueue(
        pool: &PgPool,
        adapter_name: &str,
        run_kind: &str,
        combo_key: Option<&str>,
    ) -> Result<SourceFetchRun, AppError> {
        let run = sqlx::query_as::<_, SourceFetchRun>(
            "INSERT INTO source_fetch_runs (adapter_name, run_kind, combo_key) VALUES ($1, $2, $3) RETURNING *",
        )
.bind(adapter_name)
.bind(run_kind)
.bind(combo_key)
.fetch_one(pool)
.await?;
        Ok(run)
    }

    /// Atomically claims the oldest pending run for an adapter+kind via
    /// `FOR UPDATE SKIP LOCKED`, so multiple scheduler/backfill workers never
    /// claim the same row twice.
    pub async fn claim_next(
        pool: &PgPool,
        adapter_name: &str,
        run_kind: &str,
    ) -> Result<Option<SourceFetchRun>, AppError> {
        let run = sqlx::query_as::<_, SourceFetchRun>(
            "UPDATE source_fetch_runs SET status = 'running', started_at = now()
             WHERE id = (
                 SELECT id FROM source_fetch_runs
                 WHERE adapter_name = $1 AND run_kind = $2 AND status = 'pending'
                 ORDER BY requested_at
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
.bind(adapter_name)
.bind(run_kind)
.fetch_optional(pool)
.await?;
        Ok(run)
    }

    /// Claims the oldest pending run for a specific adapter+kind+combo,
    /// rather than any pending run for the adapter — so that two callers
    /// racing to backfill the *same* combination contend on the same row,
    /// while unrelated combinations never block each other.
    pub async fn claim_next_for_combo(
        pool: &PgPool,
        adapter_name: &str,
        run_kind: &str,
        combo_key: &str,
    ) -> Result<Option<SourceFetchRun>, AppError> {
        let run = sqlx::query_as::<_, SourceFetchRun>(
            "UPDATE source_fetch_runs SET status = 'running', started_at = now()
             WHERE id = (
                 SELECT id FROM source_fetch_runs
                 WHERE adapter_name = $1 AND run_kind = $2 AND combo_key = $3 AND status = 'pending'
                 ORDER BY requested_at
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING *",
        )
.bind(adapter_name)
.bind(run_kind)
.bind(combo_key)
.fetch_optional(pool)
.await?;
        Ok(run)
    }

    pub async fn mark_succeeded(
        pool: &PgPool,
        id: i32,
        jobs_found: i32,
        jobs_new: i32,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE source_fetch_runs SET status = 'succeeded', jobs_found = $2, jobs_new = $3, finished_at = now() WHERE id = $1",
        )
.bind(id)
.bind(jobs_found)
.bind(jobs_new)
.execute(pool)
.await?;
        Ok(())
    }

    pub async fn mark_failed(pool: &PgPool, id: i32, error: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE source_fetch_runs SET status = 'failed', error = $2, finished_at = now() WHERE id = $1",
        )
.bind(id)
.bind(error)
.execute(pool)
.await?;
        Ok(())
    }

    pub async fn recent(
        pool: &PgPool,
        adapter_name: Option<&str>,
        limit: i64,
    ) -> Result<Vec<SourceFetchRun>, AppError> {
        let runs = sqlx::query_as::<_, SourceFetchRun>(
            "SELECT * FROM source_fetch_runs WHERE ($1::text IS NULL OR adapter_name = $1) ORDER BY requested_at DESC LIMIT $2",
        )
.bind(adapter_name)
.bind(limit)
.fetch_all(pool)
.await?;
        Ok(runs)
    }
}
