use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppError;

/// Canonical form of a combination: nullable fields participate via empty
/// string, never SQL `NULL` — Postgres treats `NULL`s as distinct under a
/// unique index, which would silently defeat the dedup invariant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Combination {
    pub title_keyword: String,
    pub location: String,
    pub work_arrangement: String,
    pub employment_type: String,
    pub seniority: String,
    pub industry: String,
}

impl Combination {
    pub fn new(title_keyword: &str, location: &str, work_arrangement: &str) -> Self {
        Self {
            title_keyword: title_keyword.to_string(),
            location: location.to_string(),
            work_arrangement: work_arrangement.to_string(),
            employment_type: String::new(),
            seniority: String::new(),
            industry: String::new(),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BackfillTracking {
    pub id: i32,
    pub title_keyword: String,
    pub location: String,
    pub work_arrangement: String,
    pub employment_type: String,
    pub seniority: String,
    pub industry: String,
    pub backfilled_date: DateTime<Utc>,
    pub jobs_found: i32,
}

impl BackfillTracking {
    pub async fn is_backfilled(pool: &PgPool, combo: &Combination) -> Result<bool, AppError> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM backfill_tracking
             WHERE title_keyword = $1 AND location = $2 AND work_arrangement = $3
               AND employment_type = $4 AND seniority = $5 AND industry = $6)",
        )
.bind(&combo.title_keyword)
.bind(&combo.location)
.bind(&combo.work_arrangement)
.bind(&combo.employment_type)
.bind(&combo.seniority)
.bind(&combo.industry)
.fetch_one(pool)
.await?;
        Ok(row.0)
    }

    /// Idempotent: a second mark for an already-tracked combination just
    /// refreshes `jobs_found`/`backfilled_date` rather than erroring, since
    /// two concurrent backfill claims can both reach completion.
    pub async fn mark(pool: &PgPool, combo: &Combination, jobs_found: i32) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO backfill_tracking
                (title_keyword, location, work_arrangement, employment_type, seniority, industry, jobs_found)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (title_keyword, location, work_arrangement, employment_type, seniority, industry)
            DO UPDATE SET jobs_found = EXCLUDED.jobs_found, backfilled_date = now()
            "#,
        )
.bind(&combo.title_keyword)
.bind(&combo.location)
.bind(&combo.work_arrangement)
.bind(&combo.employment_type)
.bind(&combo.seniority)
.bind(&combo.industry)
.bind(jobs_found)
.execute(pool)
.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_with_same_fields_are_equal() {
        let a = Combination::new("Data Scientist", "Berlin", "remote");
        let b = Combination::new("Data Scientist", "Berlin", "remote");
        assert_eq!(a, b);
    }

    #[test]
    fn combinations_differ_on_arrangement() {
        let a = Combination::new("Data Scientist", "Berlin", "remote");
        let b = Combination::new("Data Scientist", "Berlin", "hybrid");
        assert_ne!(a, b);
    }
}
