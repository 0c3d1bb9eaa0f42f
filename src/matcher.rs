use std::collections::HashSet;

use crate::embedder::cosine_similarity;
use crate::models::Job;

/// Integer score a job earns against a user's profile vector, clamped to
/// `[0, 100]`.
pub fn score_from_similarity(similarity: f32) -> i32 {
    let clipped = similarity.clamp(0.0, 1.0);
    (clipped * 100.0).round() as i32
}

/// Applies the hard filters (location, work arrangement) ahead of the
/// expensive embedding/cosine step, since jobs that fail them are never
/// scored at all.
pub fn passes_hard_filters(job: &Job, locations: &[String], arrangements: &HashSet<String>) -> bool {
    let location_ok = locations.is_empty()
        || job
.location
.as_deref()
.map(|job_loc| {
                locations
.iter()
.any(|accepted| job_loc.to_lowercase().contains(&accepted.to_lowercase()))
            })
.unwrap_or(false);

    let arrangement_ok = arrangements.is_empty()
        || match &job.ai_work_arrangement {
            Some(arrangement) => arrangements.contains(&arrangement.to_lowercase()),
            None => true,
        };

    location_ok && arrangement_ok
}

#[derive(Debug, Clone)]
pub struct ScoredJob {
    pub job: Job,
    pub semantic_score: i32,
}

/// Scores an already-filtered batch of jobs against a user vector, keeping
/// only those at or above `threshold`. Tie-break is score descending, then
/// `discovered_date` descending.
pub fn score_batch(user_vector: &[f32], jobs: Vec<Job>, job_vectors: &[Vec<f32>], threshold: i32) -> Vec<ScoredJob> {
    let mut scored: Vec<ScoredJob> = jobs
.into_iter()
.zip(job_vectors.iter())
.map(|(job, vector)| {
            let similarity = cosine_similarity(user_vector, vector);
            ScoredJob {
                job,
                semantic_score: score_from_similarity(similarity),
            }
        })
.filter(|scored| scored.semantic_score >= threshold)
.collect();

    scored.sort_by(|a, b| {
        b.semantic_score
.cmp(&a.semantic_score)
.then_with(|| b.job.discovered_date.cmp(&a.job.discovered_date))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_job(location: Option<&str>, arrangement: Option<&str>) -> Job {
        Job {
            id: 1,
            source: "adzuna".into(),
            external_id: "x".into(),
            title: "Engineer".into(),
            company: "Acme".into(),
            location: location.map(String::from),
            description: None,
            url: None,
            posted_date: None,
            discovered_date: Utc::now(),
            ai_key_skills: None,
            ai_keywords: None,
            ai_taxonomies: None,
            ai_work_arrangement: arrangement.map(String::from),
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
    fn score_mapping_clips_and_rounds() {
        assert_eq!(score_from_similarity(1.5), 100);
        assert_eq!(score_from_similarity(-0.5), 0);
        assert_eq!(score_from_similarity(0.755), 76);
    }

    #[test]
    fn hard_filters_reject_mismatched_location() {
        let job = sample_job(Some("Paris"), None);
        let locations = vec!["Berlin".to_string()];
        assert!(!passes_hard_filters(&job, &locations, &HashSet::new()));
    }

    #[test]
    fn hard_filters_accept_substring_match() {
        let job = sample_job(Some("Berlin, Germany"), None);
        let locations = vec!["Berlin".to_string()];
        assert!(passes_hard_filters(&job, &locations, &HashSet::new()));
    }

    #[test]
    fn hard_filters_allow_unset_arrangement_through() {
        let job = sample_job(Some("Berlin"), None);
        let locations = vec!["Berlin".to_string()];
        let mut arrangements = HashSet::new();
        arrangements.insert("remote".to_string());
        assert!(passes_hard_filters(&job, &locations, &arrangements));
    }

    #[test]
    fn hard_filters_reject_mismatched_arrangement() {
        let job = sample_job(Some("Berlin"), Some("onsite"));
        let locations = vec!["Berlin".to_string()];
        let mut arrangements = HashSet::new();
        arrangements.insert("remote".to_string());
        assert!(!passes_hard_filters(&job, &locations, &arrangements));
    }
}
