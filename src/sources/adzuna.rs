use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::common::round_posted_within_hours;
use super::{QuotaPolicy, RawJob, SearchCriteria, SearchOutcome, SourceAdapter, SourceError};

const BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";

/// Query-param API keyed by `app_id`/`app_key`.
pub struct Adzuna {
    client: reqwest::Client,
    app_id: String,
    app_key: String,
    country: String,
}

impl Adzuna {
    pub fn new(app_id: String, app_key: String, country: String) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
.user_agent("jobmatch/0.1")
.timeout(std::time::Duration::from_secs(30))
.build()
.map_err(|e| SourceError::permanent(format!("failed to build adzuna client: {e}")))?;
        Ok(Adzuna {
            client,
            app_id,
            app_key,
            country,
        })
    }
}

#[async_trait]
impl SourceAdapter for Adzuna {
    fn name(&self) -> &'static str {
        "adzuna"
    }

    fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            requests_per_period: 250,
            results_per_request_max: 50,
        }
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SourceError> {
        let resolved_hours = round_posted_within_hours(criteria.posted_within_hours);
        let url = format!("{BASE_URL}/{}/search/1", self.country);

        let resp = self
.client
.get(&url)
.query(&[
                ("app_id", self.app_id.as_str()),
                ("app_key", self.app_key.as_str()),
                ("what", criteria.keyword.as_str()),
                ("where", criteria.location.as_str()),
                ("max_days_old", &(resolved_hours / 24).max(1).to_string()),
                ("results_per_page", &criteria.max_results.to_string()),
            ])
.send()
.await
.map_err(|e| SourceError::transient(format!("adzuna request failed: {e}")))?;

        if resp.status().as_u16() == 429 {
            return Err(SourceError::rate_limited("adzuna rate limited"));
        }
        if !resp.status().is_success() {
            return Err(SourceError::transient(format!(
                "adzuna returned {}",
                resp.status()
            )));
        }

        let data: Value = resp
.json()
.await
.map_err(|e| SourceError::transient(format!("adzuna response parse failed: {e}")))?;

        let mut jobs = Vec::new();
        let mut warnings = Vec::new();
        for raw in data.get("results").and_then(|v| v.as_array()).into_iter().flatten() {
            match parse_job(raw) {
                Some(job) => jobs.push(job),
                None => warnings.push("skipped malformed adzuna result".to_string()),
            }
        }

        Ok(SearchOutcome {
            quota_used: 1,
            resolved_posted_within_hours: resolved_hours,
            jobs,
            warnings,
        })
    }
}

fn parse_job(raw: &Value) -> Option<RawJob> {
    let title = raw.get("title").and_then(|v| v.as_str())?.to_string();
    let company = raw
.get("company")
.and_then(|c| c.get("display_name"))
.and_then(|v| v.as_str())
.unwrap_or("Unknown")
.to_string();
    let upstream_id = raw.get("id").and_then(|v| v.as_str()).map(String::from);
    let location = raw
.get("location")
.and_then(|l| l.get("display_name"))
.and_then(|v| v.as_str())
.map(String::from);
    let url = raw.get("redirect_url").and_then(|v| v.as_str()).map(String::from);
    let description = raw.get("description").and_then(|v| v.as_str()).map(String::from);
    let posted_date = raw
.get("created")
.and_then(|v| v.as_str())
.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
.map(|d| d.with_timezone(&Utc));

    Some(RawJob {
        upstream_id,
        title,
        company,
        location,
        country: None,
        description,
        url,
        posted_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_result() {
        let raw = serde_json::json!({
            "id": "123",
            "title": "Backend Engineer",
            "company": {"display_name": "Acme"},
            "location": {"display_name": "Berlin"},
        });
        let job = parse_job(&raw).expect("parses");
        assert_eq!(job.upstream_id.as_deref(), Some("123"));
        assert_eq!(job.company, "Acme");
    }

    #[test]
    fn missing_title_is_skipped() {
        let raw = serde_json::json!({"id": "123"});
        assert!(parse_job(&raw).is_none());
    }
}
