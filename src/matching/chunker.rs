use chrono::{DateTime, Utc};

use crate::models::Job;

/// Partitions candidate jobs into day-sized chunks ordered newest-first,
/// each capped at `chunk_max_size`. Jobs are assumed to
/// already be sorted by `discovered_date DESC` (the order `Job::for_user`
/// returns), so a single linear pass is enough.
pub fn chunk_by_day(jobs: Vec<Job>, chunk_max_size: usize) -> Vec<Vec<Job>> {
    let mut chunks: Vec<Vec<Job>> = Vec::new();
    let mut current: Vec<Job> = Vec::new();
    let mut current_day: Option<DateTime<Utc>> = None;

    for job in jobs {
        let day = job.discovered_date.date_naive();
        let same_day = current_day.map(|d| d.date_naive() == day).unwrap_or(true);

        if !same_day || current.len() >= chunk_max_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
        }
        current_day = Some(job.discovered_date);
        current.push(job);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Top-K size for Stage 2 within a chunk: top 25% by score, minimum 5,
/// maximum 50.
pub fn top_k_for_chunk(chunk_size: usize) -> usize {
    let quarter = chunk_size / 4;
    quarter.clamp(5.min(chunk_size), 50)
}

/// Pure function computing a monotonically non-decreasing run progress
/// value from structural state, never an incremented counter.
pub fn compute_progress(chunks_completed: u32, total_chunks: u32, sub_stage_fraction: f32) -> u8 {
    if total_chunks == 0 {
        return 0;
    }
    let per_chunk = 100.0 / total_chunks as f32;
    let base = chunks_completed as f32 * per_chunk;
    let within_chunk = per_chunk * sub_stage_fraction.clamp(0.0, 1.0);
    (base + within_chunk).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn job_on(day_offset: i64, id: i32) -> Job {
        let date = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() - chrono::Duration::days(day_offset);
        Job {
            id,
            source: "adzuna".into(),
            external_id: id.to_string(),
            title: "Engineer".into(),
            company: "Acme".into(),
            location: None,
            description: None,
            url: None,
            posted_date: None,
            discovered_date: date,
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
            created_at: date,
            updated_at: date,
        }
    }

    #[test]
    fn splits_on_day_boundary() {
        let jobs = vec![job_on(0, 1), job_on(0, 2), job_on(1, 3)];
        let chunks = chunk_by_day(jobs, 500);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn splits_on_max_size_within_same_day() {
        let jobs = vec![job_on(0, 1), job_on(0, 2), job_on(0, 3)];
        let chunks = chunk_by_day(jobs, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2);
        assert_eq!(chunks[1].len(), 1);
    }

    #[test]
    fn top_k_respects_bounds() {
        assert_eq!(top_k_for_chunk(4), 4);
        assert_eq!(top_k_for_chunk(500), 50);
        assert_eq!(top_k_for_chunk(40), 10);
    }

    #[test]
    fn progress_is_monotonic_across_stages_and_chunks() {
        let mut prev = 0;
        for chunks_completed in 0..4 {
            for fraction in [0.0, 0.5, 1.0] {
                let value = compute_progress(chunks_completed, 4, fraction);
                assert!(value >= prev, "{value} should be >= {prev}");
                prev = value;
            }
        }
    }

    #[test]
    fn zero_total_chunks_is_zero_progress() {
        assert_eq!(compute_progress(0, 0, 1.0), 0);
    }
}
