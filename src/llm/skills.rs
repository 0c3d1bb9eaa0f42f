use std::collections::HashSet;

use crate::models::{CvProfile, Job};

/// Pre-computed before the LLM prompt is built, so the model reasons over a
/// structured summary instead of two raw skill lists.
#[derive(Debug, Clone)]
pub struct SkillOverlap {
    pub skill_match_pct: f32,
    pub matching_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    pub extra_skills: Vec<String>,
    pub industry_match: bool,
}

const MAX_LISTED_SKILLS: usize = 20;

pub fn compute_overlap(profile: &CvProfile, job: &Job) -> SkillOverlap {
    let user_skills = profile.skill_set();
    let job_skills: HashSet<String> = job
.ai_key_skills
.as_ref()
.map(|skills| skills.iter().map(|s| s.to_lowercase()).collect())
.unwrap_or_default();

    let matching: Vec<String> = job_skills.intersection(&user_skills).cloned().take(MAX_LISTED_SKILLS).collect();
    let missing: Vec<String> = job_skills.difference(&user_skills).cloned().take(MAX_LISTED_SKILLS).collect();
    let extra: Vec<String> = user_skills.difference(&job_skills).cloned().take(MAX_LISTED_SKILLS).collect();

    let skill_match_pct = if job_skills.is_empty() {
        0.0
    } else {
        matching.len() as f32 / job_skills.len().max(1) as f32
    };

    let industry_match = job
.ai_taxonomies
.as_ref()
.map(|taxonomies| {
            taxonomies
.iter()
.any(|t| profile.domain_expertise.iter().any(|d| d.eq_ignore_ascii_case(t)))
        })
.unwrap_or(false);

    SkillOverlap {
        skill_match_pct,
        matching_skills: matching,
        missing_skills: missing,
        extra_skills: extra,
        industry_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile() -> CvProfile {
        CvProfile {
            user_id: 1,
            technical_skills: vec!["Rust".into(), "PostgreSQL".into()],
            soft_skills: vec![],
            domain_expertise: vec!["fintech".into()],
            derived_seniority: Some("5-10".into()),
            total_years_experience: Some(7.0),
            semantic_summary: "Backend engineer".into(),
            search_keywords_abstract: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn job(key_skills: Option<Vec<&str>>, taxonomies: Option<Vec<&str>>) -> Job {
        Job {
            id: 1,
            source: "adzuna".into(),
            external_id: "x".into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            location: None,
            description: None,
            url: None,
            posted_date: None,
            discovered_date: Utc::now(),
            ai_key_skills: key_skills.map(|v| v.into_iter().map(String::from).collect()),
            ai_keywords: None,
            ai_taxonomies: taxonomies.map(|v| v.into_iter().map(String::from).collect()),
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

    #[test]
    fn full_overlap_is_one() {
        let overlap = compute_overlap(&profile(), &job(Some(vec!["Rust", "PostgreSQL"]), None));
        assert_eq!(overlap.skill_match_pct, 1.0);
        assert!(overlap.missing_skills.is_empty());
    }

    #[test]
    fn partial_overlap_computes_fraction() {
        let overlap = compute_overlap(&profile(), &job(Some(vec!["Rust", "Kubernetes"]), None));
        assert_eq!(overlap.skill_match_pct, 0.5);
        assert_eq!(overlap.missing_skills, vec!["kubernetes".to_string()]);
    }

    #[test]
    fn no_job_skills_gives_zero_match() {
        let overlap = compute_overlap(&profile(), &job(None, None));
        assert_eq!(overlap.skill_match_pct, 0.0);
    }

    #[test]
    fn industry_match_is_case_insensitive() {
        let overlap = compute_overlap(&profile(), &job(None, Some(vec!["FinTech"])));
        assert!(overlap.industry_match);
    }
}
