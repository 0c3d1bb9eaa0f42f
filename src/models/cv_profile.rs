use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashSet;

use crate::error::AppError;

/// Read-only input produced by the (out-of-scope) CV Parser collaborator.
/// The core never writes this table; it only reads rows seeded by that
/// collaborator.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CvProfile {
    pub user_id: i32,
    pub technical_skills: Vec<String>,
    pub soft_skills: Vec<String>,
    pub domain_expertise: Vec<String>,
    pub derived_seniority: Option<String>,
    pub total_years_experience: Option<f32>,
    pub semantic_summary: String,
    pub search_keywords_abstract: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CvProfile {
    pub async fn get(pool: &PgPool, user_id: i32) -> Result<Option<CvProfile>, AppError> {
        let row = sqlx::query_as::<_, CvProfile>("SELECT * FROM cv_profiles WHERE user_id = $1")
.bind(user_id)
.fetch_optional(pool)
.await?;
        Ok(row)
    }

    /// All of the user's skills as a case-folded set, for the LLM
    /// Analyzer's skill-overlap pre-computation.
    pub fn skill_set(&self) -> HashSet<String> {
        self.technical_skills
.iter()
.chain(self.soft_skills.iter())
.map(|s| s.to_lowercase())
.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CvProfile {
        CvProfile {
            user_id: 1,
            technical_skills: vec!["Rust".into(), "PostgreSQL".into()],
            soft_skills: vec!["Communication".into()],
            domain_expertise: vec![],
            derived_seniority: Some("5-10".into()),
            total_years_experience: Some(7.0),
            semantic_summary: "Backend engineer".into(),
            search_keywords_abstract: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn skill_set_is_case_folded_union() {
        let skills = sample().skill_set();
        assert!(skills.contains("rust"));
        assert!(skills.contains("communication"));
        assert_eq!(skills.len(), 3);
    }
}
