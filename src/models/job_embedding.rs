use sqlx::PgPool;

use crate::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct EmbeddingRow {
    job_id: i32,
    embedding: Vec<f32>,
}

/// Cached vectors for a set of jobs, keyed by the embedder version that
/// produced them. A version bump orphans old rows rather than silently
/// mixing vectors from two models.
pub async fn get_many(
    pool: &PgPool,
    job_ids: &[i32],
    model_version: &str,
) -> Result<std::collections::HashMap<i32, Vec<f32>>, AppError> {
    if job_ids.is_empty() {
        return Ok(std::collections::HashMap::new());
    }
    let rows = sqlx::query_as::<_, EmbeddingRow>(
        "SELECT job_id, embedding FROM job_embeddings WHERE model_version = $1 AND job_id = ANY($2)",
    )
    .bind(model_version)
    .bind(job_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|r| (r.job_id, r.embedding)).collect())
}

pub async fn upsert(pool: &PgPool, job_id: i32, model_version: &str, embedding: &[f32]) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO job_embeddings (job_id, model_version, embedding) VALUES ($1, $2, $3)
         ON CONFLICT (job_id, model_version) DO UPDATE SET embedding = EXCLUDED.embedding",
    )
    .bind(job_id)
    .bind(model_version)
    .bind(embedding)
    .execute(pool)
    .await?;
    Ok(())
}

/// Drops every cached vector that doesn't belong to the currently
/// configured model, run once at startup so a version bump can't leave a
/// stale vector silently scored against a fresh one.
pub async fn invalidate_stale(pool: &PgPool, model_version: &str) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM job_embeddings WHERE model_version != $1")
        .bind(model_version)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
