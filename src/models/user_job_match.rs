use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// §4.6 calibration: derived purely from score, never chosen freely.
    pub fn from_score(score: i32) -> Self {
        if score >= 85 {
            Priority::High
        } else if score >= 65 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

/// Per-user analysis result. A row exists only once `semantic_score` has
/// been computed; `claude_score` present implies `match_reasoning` present.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserJobMatch {
    pub id: i32,
    pub user_id: i32,
    pub job_id: i32,
    pub semantic_score: i32,
    pub claude_score: Option<i32>,
    pub priority: Option<String>,
    pub match_reasoning: Option<String>,
    pub key_alignments: Vec<String>,
    pub potential_gaps: Vec<String>,
    pub status: String,
    pub matched_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stage 1 write: semantic score only. `claude_score` and friends are left
/// untouched by `upsert` when they're `None` in a later call so Stage 2
/// never clobbers an earlier analysis with nulls.
#[derive(Debug, Clone, Default)]
pub struct MatchUpdate {
    pub user_id: i32,
    pub job_id: i32,
    pub semantic_score: i32,
    pub claude_score: Option<i32>,
    pub priority: Option<Priority>,
    pub match_reasoning: Option<String>,
    pub key_alignments: Vec<String>,
    pub potential_gaps: Vec<String>,
}

impl UserJobMatch {
    /// Unique on `(user_id, job_id)`. On conflict, score fields are updated
    /// but a user-managed `status` is never downgraded back to `'new'`
    /// — only the Matching Engine ever writes `'new'`, so
    /// any other status the user set survives a re-run.
    pub async fn upsert(pool: &PgPool, update: &MatchUpdate) -> Result<UserJobMatch, AppError> {
        let priority = update.priority.map(|p| p.as_str().to_string());
        let row = sqlx::query_as::<_, UserJobMatch>(
            r#"
            INSERT INTO user_job_matches
                (user_id, job_id, semantic_score, claude_score, priority, match_reasoning, key_alignments, potential_gaps, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'new')
            ON CONFLICT (user_id, job_id) DO UPDATE SET
                semantic_score = EXCLUDED.semantic_score,
                claude_score = COALESCE(EXCLUDED.claude_score, user_job_matches.claude_score),
                priority = COALESCE(EXCLUDED.priority, user_job_matches.priority),
                match_reasoning = COALESCE(EXCLUDED.match_reasoning, user_job_matches.match_reasoning),
                key_alignments = CASE WHEN EXCLUDED.claude_score IS NOT NULL THEN EXCLUDED.key_alignments ELSE user_job_matches.key_alignments END,
                potential_gaps = CASE WHEN EXCLUDED.claude_score IS NOT NULL THEN EXCLUDED.potential_gaps ELSE user_job_matches.potential_gaps END,
                updated_at = now()
            RETURNING *
            "#,
        )
.bind(update.user_id)
.bind(update.job_id)
.bind(update.semantic_score)
.bind(update.claude_score)
.bind(&priority)
.bind(&update.match_reasoning)
.bind(&update.key_alignments)
.bind(&update.potential_gaps)
.fetch_one(pool)
.await?;
        Ok(row)
    }

    pub async fn get(pool: &PgPool, user_id: i32, job_id: i32) -> Result<Option<UserJobMatch>, AppError> {
        let row = sqlx::query_as::<_, UserJobMatch>(
            "SELECT * FROM user_job_matches WHERE user_id = $1 AND job_id = $2",
        )
.bind(user_id)
.bind(job_id)
.fetch_optional(pool)
.await?;
        Ok(row)
    }

    pub async fn list_for_user(pool: &PgPool, user_id: i32) -> Result<Vec<UserJobMatch>, AppError> {
        let rows = sqlx::query_as::<_, UserJobMatch>(
            "SELECT * FROM user_job_matches WHERE user_id = $1 ORDER BY COALESCE(claude_score, semantic_score) DESC",
        )
.bind(user_id)
.fetch_all(pool)
.await?;
        Ok(rows)
    }

    pub async fn set_status(pool: &PgPool, user_id: i32, job_id: i32, status: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE user_job_matches SET status = $3, updated_at = now() WHERE user_id = $1 AND job_id = $2",
        )
.bind(user_id)
.bind(job_id)
.bind(status)
.execute(pool)
.await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No match for user {user_id} / job {job_id}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_thresholds_match_calibration() {
        assert_eq!(Priority::from_score(100), Priority::High);
        assert_eq!(Priority::from_score(85), Priority::High);
        assert_eq!(Priority::from_score(84), Priority::Medium);
        assert_eq!(Priority::from_score(65), Priority::Medium);
        assert_eq!(Priority::from_score(64), Priority::Low);
        assert_eq!(Priority::from_score(0), Priority::Low);
    }
}
