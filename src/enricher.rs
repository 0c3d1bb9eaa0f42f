use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::Semaphore;

use crate::models::{AiMetadata, Job};

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("llm request failed: {0}")]
    RequestFailed(String),
}

/// Given a job lacking AI metadata, derives it via the configured LLM.
/// Shares the repair-pass parsing strategy with `llm::LlmAnalyzer`, but
/// targets a different schema (the job's own AI fields rather than a
/// per-user analysis).
pub struct Enricher {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize, Default)]
struct EnrichmentPayload {
    #[serde(default)]
    ai_key_skills: Vec<String>,
    #[serde(default)]
    ai_keywords: Vec<String>,
    #[serde(default)]
    ai_taxonomies: Vec<String>,
    ai_work_arrangement: Option<String>,
    ai_experience_level: Option<String>,
    #[serde(default)]
    ai_employment_type: Vec<String>,
    ai_core_responsibilities: Option<String>,
    ai_requirements_summary: Option<String>,
    #[serde(default)]
    ai_benefits: Vec<String>,
    ai_salary_min: Option<i32>,
    ai_salary_max: Option<i32>,
    ai_salary_currency: Option<String>,
    #[serde(default)]
    semantic_summary: String,
}

impl Enricher {
    pub fn new(api_key: String, base_url: String) -> Result<Self, EnrichError> {
        let client = reqwest::Client::builder()
.timeout(std::time::Duration::from_secs(60))
.build()
.map_err(|e| EnrichError::RequestFailed(format!("failed to build llm client: {e}")))?;
        Ok(Enricher { client, api_key, base_url })
    }

    /// Idempotent: checked before any LLM call.
    pub async fn enrich_one(&self, pool: &PgPool, job: &Job) -> Result<(), EnrichError> {
        if job.has_ai_metadata() {
            return Ok(());
        }

        match self.call_llm(job).await {
            Ok(Some(metadata)) => {
                let _ = Job::save_ai_metadata(pool, job.id, &metadata).await;
            }
            Ok(None) | Err(_) => {
                let _ = Job::mark_enrichment_failed(pool, job.id).await;
            }
        }
        Ok(())
    }

    /// Runs the Enricher over up to `limit` jobs missing AI metadata, at
    /// most `concurrency` at a time.
    pub async fn enrich_batch(&self, pool: &PgPool, limit: i64, concurrency: usize) -> usize {
        let jobs = match Job::missing_ai(pool, limit).await {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(component = "enricher", kind = "store", "failed to load jobs missing ai: {e}");
                return 0;
            }
        };

        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let permit = semaphore.clone();
            let pool = pool.clone();
            let client = self.client.clone();
            let api_key = self.api_key.clone();
            let base_url = self.base_url.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let enricher = Enricher { client, api_key, base_url };
                if let Err(e) = enricher.enrich_one(&pool, &job).await {
                    tracing::warn!(component = "enricher", job_id = job.id, "enrichment failed: {e}");
                }
            }));
        }

        let count = handles.len();
        futures::future::join_all(handles).await;
        count
    }

    async fn call_llm(&self, job: &Job) -> Result<Option<AiMetadata>, EnrichError> {
        let prompt = build_enrichment_prompt(job);
        let body = serde_json::json!({
            "model": "claude-haiku-4-5",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
.client
.post(format!("{}/messages", self.base_url))
.header("x-api-key", &self.api_key)
.header("anthropic-version", "2023-06-01")
.json(&body)
.send()
.await
.map_err(|e| EnrichError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(EnrichError::RequestFailed(format!("llm returned {}", resp.status())));
        }

        let raw_text = extract_text(
            &resp
.json::<Value>()
.await
.map_err(|e| EnrichError::RequestFailed(e.to_string()))?,
        );

        Ok(parse_payload(&raw_text).map(to_metadata))
    }
}

fn extract_text(body: &Value) -> String {
    body.get("content")
.and_then(|c| c.as_array())
.and_then(|a| a.first())
.and_then(|block| block.get("text"))
.and_then(|v| v.as_str())
.unwrap_or_default()
.to_string()
}

fn parse_payload(raw_text: &str) -> Option<EnrichmentPayload> {
    if let Ok(payload) = serde_json::from_str::<EnrichmentPayload>(raw_text) {
        return Some(payload);
    }
    let repaired = strip_code_fences(raw_text);
    serde_json::from_str::<EnrichmentPayload>(&repaired).ok()
}

fn strip_code_fences(raw_text: &str) -> String {
    raw_text
.trim()
.trim_start_matches("```json")
.trim_start_matches("```")
.trim_end_matches("```")
.trim()
.to_string()
}

fn to_metadata(payload: EnrichmentPayload) -> AiMetadata {
    AiMetadata {
        ai_key_skills: payload.ai_key_skills,
        ai_keywords: payload.ai_keywords,
        ai_taxonomies: payload.ai_taxonomies,
        ai_work_arrangement: payload.ai_work_arrangement,
        ai_experience_level: payload.ai_experience_level,
        ai_employment_type: payload.ai_employment_type,
        ai_core_responsibilities: payload.ai_core_responsibilities,
        ai_requirements_summary: payload.ai_requirements_summary,
        ai_benefits: payload.ai_benefits,
        ai_salary_min: payload.ai_salary_min,
        ai_salary_max: payload.ai_salary_max,
        ai_salary_currency: payload.ai_salary_currency,
        semantic_summary: payload.semantic_summary,
    }
}

fn build_enrichment_prompt(job: &Job) -> String {
    format!(
        r#"Extract structured metadata from this job posting. Respond with ONLY a JSON object with these exact fields: ai_key_skills (array of strings), ai_keywords (array), ai_taxonomies (array of industry labels), ai_work_arrangement (one of "onsite", "hybrid", "remote"), ai_experience_level (one of "0-2", "2-5", "5-10", "10+"), ai_employment_type (array), ai_core_responsibilities (string), ai_requirements_summary (string), ai_benefits (array), ai_salary_min (int or null), ai_salary_max (int or null), ai_salary_currency (string or null), semantic_summary (a dense one-paragraph summary for semantic search).

Title: {}
Company: {}
Location: {}
Description: {}"#,
        job.title,
        job.company,
        job.location.as_deref().unwrap_or("unspecified"),
        job.description.as_deref().unwrap_or("none provided"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload_accepts_clean_json() {
        let raw = r#"{"ai_key_skills": ["Rust"], "semantic_summary": "A backend role"}"#;
        let payload = parse_payload(raw).expect("parses");
        assert_eq!(payload.ai_key_skills, vec!["Rust".to_string()]);
    }

    #[test]
    fn parse_payload_strips_code_fences() {
        let raw = "```json\n{\"semantic_summary\": \"ok\"}\n```";
        let payload = parse_payload(raw).expect("parses");
        assert_eq!(payload.semantic_summary, "ok");
    }

    #[test]
    fn parse_payload_returns_none_on_garbage() {
        assert!(parse_payload("definitely not json").is_none());
    }
}
