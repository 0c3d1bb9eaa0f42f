use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;

/// Ambient registry + quota state for a source adapter, carrying the rolling
/// quota window a `QuotaPolicy` needs alongside enable/disable bookkeeping.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SourceAdapterState {
    pub name: String,
    pub enabled: bool,
    pub config: serde_json::Value,
    pub requests_per_period: i32,
    pub remaining: i32,
    pub period_resets_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSourceAdapterState {
    pub enabled: Option<bool>,
    pub config: Option<serde_json::Value>,
}

impl SourceAdapterState {
    pub async fn list(pool: &PgPool) -> Result<Vec<SourceAdapterState>, AppError> {
        let rows = sqlx::query_as::<_, SourceAdapterState>(
            "SELECT * FROM source_adapter_state ORDER BY name",
        )
.fetch_all(pool)
.await?;
        Ok(rows)
    }

    pub async fn get(pool: &PgPool, name: &str) -> Result<SourceAdapterState, AppError> {
        sqlx::query_as::<_, SourceAdapterState>("SELECT * FROM source_adapter_state WHERE name = $1")
.bind(name)
.fetch_optional(pool)
.await?
.ok_or_else(|| AppError::NotFound(format!("source adapter '{name}' not registered")))
    }

    /// Creates the row on first sight of an adapter name; leaves existing
    /// quota state alone on a second registration.
    pub async fn ensure_registered(
        pool: &PgPool,
        name: &str,
        requests_per_period: i32,
    ) -> Result<SourceAdapterState, AppError> {
        let row = sqlx::query_as::<_, SourceAdapterState>(
            r#"
            INSERT INTO source_adapter_state (name, requests_per_period, remaining, period_resets_at)
            VALUES ($1, $2, $2, now() + interval '1 day')
            ON CONFLICT (name) DO UPDATE SET updated_at = source_adapter_state.updated_at
            RETURNING *
            "#,
        )
.bind(name)
.bind(requests_per_period)
.fetch_one(pool)
.await?;
        Ok(row)
    }

    pub async fn update(
        pool: &PgPool,
        name: &str,
        input: UpdateSourceAdapterState,
    ) -> Result<SourceAdapterState, AppError> {
        let existing = Self::get(pool, name).await?;
        let row = sqlx::query_as::<_, SourceAdapterState>(
            "UPDATE source_adapter_state SET enabled = $2, config = $3, updated_at = now() WHERE name = $1 RETURNING *",
        )
.bind(name)
.bind(input.enabled.unwrap_or(existing.enabled))
.bind(input.config.unwrap_or(existing.config))
.fetch_one(pool)
.await?;
        Ok(row)
    }

    /// Decrements `remaining` by one, resetting the window first if it has
    /// elapsed. Returns `false` without decrementing when quota is exhausted,
    /// which is the Scheduler's signal to skip this adapter this tick.
    pub async fn try_consume(pool: &PgPool, name: &str) -> Result<bool, AppError> {
        let row: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE source_adapter_state SET
                remaining = CASE WHEN period_resets_at <= now() THEN requests_per_period - 1 ELSE remaining - 1 END,
                period_resets_at = CASE WHEN period_resets_at <= now() THEN now() + interval '1 day' ELSE period_resets_at END,
                updated_at = now()
            WHERE name = $1
              AND (period_resets_at <= now() OR remaining > 0)
            RETURNING remaining
            "#,
        )
.bind(name)
.fetch_optional(pool)
.await?;
        Ok(row.is_some())
    }

    pub async fn record_run(pool: &PgPool, name: &str, error: Option<&str>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE source_adapter_state SET last_run_at = now(), last_error = $2, updated_at = now() WHERE name = $1",
        )
.bind(name)
.bind(error)
.execute(pool)
.await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_input_defaults_to_none() {
        let input = UpdateSourceAdapterState {
            enabled: None,
            config: None,
        };
        assert!(input.enabled.is_none());
        assert!(input.config.is_none());
    }
}
