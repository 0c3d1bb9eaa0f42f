use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;

/// Global job row, shared across every user. AI metadata is explicit
/// `Option<T>` absence rather than a sentinel string or dynamic field
/// presence.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Job {
    pub id: i32,
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
    pub discovered_date: DateTime<Utc>,

    pub ai_key_skills: Option<Vec<String>>,
    pub ai_keywords: Option<Vec<String>>,
    pub ai_taxonomies: Option<Vec<String>>,
    pub ai_work_arrangement: Option<String>,
    pub ai_experience_level: Option<String>,
    pub ai_employment_type: Option<Vec<String>>,
    pub ai_core_responsibilities: Option<String>,
    pub ai_requirements_summary: Option<String>,
    pub ai_benefits: Option<Vec<String>>,
    pub ai_salary_min: Option<i32>,
    pub ai_salary_max: Option<i32>,
    pub ai_salary_currency: Option<String>,
    pub semantic_summary: Option<String>,
    pub enrichment_failed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Text the Embedder consumes. Falls back to title + company + location
    /// when the Enricher hasn't produced a `semantic_summary` yet, so a job
    /// can still be matched (at a coarser quality) before enrichment runs.
    pub fn embeddable_text(&self) -> String {
        match &self.semantic_summary {
            Some(s) if !s.is_empty() => s.clone(),
            _ => format!(
                "{} at {}{}",
                self.title,
                self.company,
                self.location
.as_deref()
.map(|l| format!(" ({l})"))
.unwrap_or_default()
            ),
        }
    }

    pub fn has_ai_metadata(&self) -> bool {
        self.ai_key_skills.is_some()
    }
}

/// Canonical job record produced by a source adapter's `normalize()`,
/// ready for `Job::upsert`.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
}

/// AI metadata produced by the Enricher for `Job::save_ai_metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiMetadata {
    pub ai_key_skills: Vec<String>,
    pub ai_keywords: Vec<String>,
    pub ai_taxonomies: Vec<String>,
    pub ai_work_arrangement: Option<String>,
    pub ai_experience_level: Option<String>,
    pub ai_employment_type: Vec<String>,
    pub ai_core_responsibilities: Option<String>,
    pub ai_requirements_summary: Option<String>,
    pub ai_benefits: Vec<String>,
    pub ai_salary_min: Option<i32>,
    pub ai_salary_max: Option<i32>,
    pub ai_salary_currency: Option<String>,
    pub semantic_summary: String,
}

#[derive(Debug, Deserialize)]
pub struct JobFilters {
    pub source: Option<String>,
    pub search: Option<String>,
}

/// Keyset pagination cursor over `(discovered_date DESC, id DESC)`.
#[derive(Debug, Clone, Copy)]
pub struct JobCursor {
    pub discovered_date: DateTime<Utc>,
    pub id: i32,
}

impl Job {
    /// Insert a new job on first sight; on `(source, external_id)` conflict,
    /// update only the fields that were previously null. A present AI field
    /// is never overwritten with an absent one.
    pub async fn upsert(pool: &PgPool, job: NewJob) -> Result<(Job, bool), AppError> {
        let row: (i32, bool) = sqlx::query_as(
            r#"
            INSERT INTO jobs (source, external_id, title, company, location, description, url, posted_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (source, external_id) DO UPDATE SET
                title = EXCLUDED.title,
                company = EXCLUDED.company,
                location = COALESCE(jobs.location, EXCLUDED.location),
                description = COALESCE(jobs.description, EXCLUDED.description),
                url = COALESCE(jobs.url, EXCLUDED.url),
                posted_date = COALESCE(jobs.posted_date, EXCLUDED.posted_date),
                updated_at = now()
            RETURNING id, (xmax = 0) AS inserted
            "#,
        )
.bind(&job.source)
.bind(&job.external_id)
.bind(&job.title)
.bind(&job.company)
.bind(&job.location)
.bind(&job.description)
.bind(&job.url)
.bind(job.posted_date)
.fetch_one(pool)
.await?;

        let (id, inserted) = row;
        let saved = Self::get(pool, id).await?;
        Ok((saved, inserted))
    }

    pub async fn get(pool: &PgPool, id: i32) -> Result<Job, AppError> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
.bind(id)
.fetch_optional(pool)
.await?
.ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
    }

    pub async fn list(pool: &PgPool, filters: &JobFilters, limit: i64) -> Result<Vec<Job>, AppError> {
        let jobs = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE ($1::text IS NULL OR source = $1) AND ($2::text IS NULL OR title ILIKE '%' || $2 || '%') ORDER BY discovered_date DESC LIMIT $3",
        )
.bind(&filters.source)
.bind(&filters.search)
.bind(limit)
.fetch_all(pool)
.await?;
        Ok(jobs)
    }

    /// Jobs the Enricher hasn't successfully processed yet, honoring the
    /// 24h cool-down after a failed enrichment attempt.
    pub async fn missing_ai(pool: &PgPool, limit: i64) -> Result<Vec<Job>, AppError> {
        let jobs = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs
             WHERE ai_key_skills IS NULL
               AND (enrichment_failed_at IS NULL OR enrichment_failed_at < now() - interval '24 hours')
             ORDER BY discovered_date DESC
             LIMIT $1",
        )
.bind(limit)
.fetch_all(pool)
.await?;
        Ok(jobs)
    }

    pub async fn save_ai_metadata(pool: &PgPool, job_id: i32, meta: &AiMetadata) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE jobs SET
                ai_key_skills = $2,
                ai_keywords = $3,
                ai_taxonomies = $4,
                ai_work_arrangement = $5,
                ai_experience_level = $6,
                ai_employment_type = $7,
                ai_core_responsibilities = $8,
                ai_requirements_summary = $9,
                ai_benefits = $10,
                ai_salary_min = $11,
                ai_salary_max = $12,
                ai_salary_currency = $13,
                semantic_summary = $14,
                enrichment_failed_at = NULL,
                updated_at = now()
            WHERE id = $1
            "#,
        )
.bind(job_id)
.bind(&meta.ai_key_skills)
.bind(&meta.ai_keywords)
.bind(&meta.ai_taxonomies)
.bind(&meta.ai_work_arrangement)
.bind(&meta.ai_experience_level)
.bind(&meta.ai_employment_type)
.bind(&meta.ai_core_responsibilities)
.bind(&meta.ai_requirements_summary)
.bind(&meta.ai_benefits)
.bind(meta.ai_salary_min)
.bind(meta.ai_salary_max)
.bind(&meta.ai_salary_currency)
.bind(&meta.semantic_summary)
.execute(pool)
.await?;
        Ok(())
    }

    /// Marks a job as having failed enrichment, starting its 24h cool-down.
    pub async fn mark_enrichment_failed(pool: &PgPool, job_id: i32) -> Result<(), AppError> {
        sqlx::query("UPDATE jobs SET enrichment_failed_at = now() WHERE id = $1")
.bind(job_id)
.execute(pool)
.await?;
        Ok(())
    }

    /// Keyset-paginated candidate jobs for a user: matches the location /
    /// work-arrangement filters and has no existing `UserJobMatch` row yet.
    /// Callers page with the last row's cursor until an empty page comes
    /// back; the full candidate set is never materialized at once.
    pub async fn for_user(
        pool: &PgPool,
        user_id: i32,
        since: DateTime<Utc>,
        locations: &[String],
        arrangements: &[String],
        cursor: Option<JobCursor>,
        page_size: i64,
    ) -> Result<Vec<Job>, AppError> {
        let (cursor_date, cursor_id) = match cursor {
            Some(c) => (Some(c.discovered_date), Some(c.id)),
            None => (None, None),
        };

        let jobs = sqlx::query_as::<_, Job>(
            r#"
            SELECT j.* FROM jobs j
            WHERE j.discovered_date >= $1
              AND (cardinality($2::text[]) = 0 OR EXISTS (
                    SELECT 1 FROM unnest($2::text[]) AS loc
                    WHERE j.location ILIKE '%' || loc || '%'
              ))
              AND (cardinality($3::text[]) = 0
                    OR j.ai_work_arrangement IS NULL
                    OR j.ai_work_arrangement = ANY($3::text[]))
              AND NOT EXISTS (
                    SELECT 1 FROM user_job_matches m
                    WHERE m.user_id = $4 AND m.job_id = j.id
              )
              AND ($5::timestamptz IS NULL OR (j.discovered_date, j.id) < ($5, $6))
            ORDER BY j.discovered_date DESC, j.id DESC
            LIMIT $7
            "#,
        )
.bind(since)
.bind(locations)
.bind(arrangements)
.bind(user_id)
.bind(cursor_date)
.bind(cursor_id)
.bind(page_size)
.fetch_all(pool)
.await?;
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddable_text_prefers_semantic_summary() {
        let mut job = sample_job();
        job.semantic_summary = Some("Rust backend engineer, remote-friendly".to_string());
        assert_eq!(job.embeddable_text(), "Rust backend engineer, remote-friendly");
    }

    #[test]
    fn embeddable_text_falls_back_before_enrichment() {
        let job = sample_job();
        assert_eq!(job.embeddable_text(), "Backend Engineer at Acme (Berlin)");
    }

    fn sample_job() -> Job {
        Job {
            id: 1,
            source: "adzuna".into(),
            external_id: "abc123".into(),
            title: "Backend Engineer".into(),
            company: "Acme".into(),
            location: Some("Berlin".into()),
            description: None,
            url: None,
            posted_date: None,
            discovered_date: Utc::now(),
            ai_key_skills: None,
            ai_keywords: None,
            ai_taxonomies: None,
            ai_work_arrangement: None,
            ai_experience_level: None,
            ai_employment_type: None,
            ai_core_responsibilities: None,
            ai_requirements_summary: None,
            ai_benefits: None,
            ai_salary_min: None,
            ai_salary_max: None,
            ai_salary_currency: None,
            semantic_summary: None,
            enrichment_failed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
