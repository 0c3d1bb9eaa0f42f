use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;

/// Normalized one-row-per-combination search query.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserSearchQuery {
    pub id: i32,
    pub user_id: i32,
    pub title_keyword: String,
    pub location: String,
    pub work_arrangement: String,
    pub priority: i32,
    pub is_active: bool,
}

impl UserSearchQuery {
    /// The distinct `(keyword, location, arrangement)` tuple this row
    /// contributes to the Scheduler's collection plan.
    pub fn combination(&self) -> (String, String, String) {
        (
            self.title_keyword.clone(),
            self.location.clone(),
            self.work_arrangement.clone(),
        )
    }

    pub fn arrangements(&self) -> Vec<String> {
        if self.work_arrangement.is_empty() {
            Vec::new()
        } else {
            self.work_arrangement.split('|').map(str::to_string).collect()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterQueriesInput {
    pub titles: Vec<String>,
    pub locations: Vec<String>,
    pub arrangements: Vec<String>,
}

impl UserSearchQuery {
    /// Replaces every active row for the user with the new combination set
    /// (cross product of titles × locations, each carrying the full
    /// arrangement set pipe-joined), which also triggers the Backfill
    /// Planner.
    pub async fn replace_for_user(
        pool: &PgPool,
        user_id: i32,
        input: &RegisterQueriesInput,
    ) -> Result<Vec<UserSearchQuery>, AppError> {
        if input.titles.is_empty() || input.locations.is_empty() {
            return Err(AppError::BadRequest(
                "at least one title and one location are required".to_string(),
            ));
        }

        let arrangement = input.arrangements.join("|");
        let mut tx = pool.begin().await?;

        sqlx::query("UPDATE user_search_queries SET is_active = false WHERE user_id = $1")
.bind(user_id)
.execute(&mut *tx)
.await?;

        let mut created = Vec::with_capacity(input.titles.len() * input.locations.len());
        for title in &input.titles {
            for location in &input.locations {
                let row = sqlx::query_as::<_, UserSearchQuery>(
                    r#"
                    INSERT INTO user_search_queries (user_id, title_keyword, location, work_arrangement, is_active)
                    VALUES ($1, $2, $3, $4, true)
                    RETURNING *
                    "#,
                )
.bind(user_id)
.bind(title)
.bind(location)
.bind(&arrangement)
.fetch_one(&mut *tx)
.await?;
                created.push(row);
            }
        }

        tx.commit().await?;
        Ok(created)
    }

    pub async fn active(pool: &PgPool) -> Result<Vec<UserSearchQuery>, AppError> {
        let rows = sqlx::query_as::<_, UserSearchQuery>(
            "SELECT * FROM user_search_queries WHERE is_active ORDER BY user_id",
        )
.fetch_all(pool)
.await?;
        Ok(rows)
    }

    pub async fn active_for_user(pool: &PgPool, user_id: i32) -> Result<Vec<UserSearchQuery>, AppError> {
        let rows = sqlx::query_as::<_, UserSearchQuery>(
            "SELECT * FROM user_search_queries WHERE user_id = $1 AND is_active",
        )
.bind(user_id)
.fetch_all(pool)
.await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(arrangement: &str) -> UserSearchQuery {
        UserSearchQuery {
            id: 1,
            user_id: 1,
            title_keyword: "Data Scientist".into(),
            location: "Berlin".into(),
            work_arrangement: arrangement.into(),
            priority: 0,
            is_active: true,
        }
    }

    #[test]
    fn arrangements_splits_pipe_joined_set() {
        assert_eq!(query("remote|hybrid").arrangements(), vec!["remote", "hybrid"]);
    }

    #[test]
    fn arrangements_empty_means_no_constraint() {
        assert!(query("").arrangements().is_empty());
    }
}
