use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::common::round_posted_within_hours;
use super::{QuotaPolicy, RawJob, SearchCriteria, SearchOutcome, SourceAdapter, SourceError};

const BASE_URL: &str = "https://active-jobs-db.p.rapidapi.com/active-ats-7d";
const RAPIDAPI_HOST: &str = "active-jobs-db.p.rapidapi.com";

/// RapidAPI-hosted catalog, header-based key, plain JSON array response.
pub struct ActiveJobsDb {
    client: reqwest::Client,
    rapidapi_key: String,
}

impl ActiveJobsDb {
    pub fn new(rapidapi_key: String) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
.user_agent("jobmatch/0.1")
.timeout(std::time::Duration::from_secs(30))
.build()
.map_err(|e| SourceError::permanent(format!("failed to build activejobs client: {e}")))?;
        Ok(ActiveJobsDb { client, rapidapi_key })
    }
}

#[async_trait]
impl SourceAdapter for ActiveJobsDb {
    fn name(&self) -> &'static str {
        "activejobs"
    }

    fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            requests_per_period: 150,
            results_per_request_max: 100,
        }
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SourceError> {
        let resolved_hours = round_posted_within_hours(criteria.posted_within_hours);

        let resp = self
.client
.get(BASE_URL)
.header("X-RapidAPI-Key", &self.rapidapi_key)
.header("X-RapidAPI-Host", RAPIDAPI_HOST)
.query(&[
                ("title_filter", criteria.keyword.as_str()),
                ("location_filter", criteria.location.as_str()),
                ("limit", &criteria.max_results.to_string()),
            ])
.send()
.await
.map_err(|e| SourceError::transient(format!("activejobs request failed: {e}")))?;

        if resp.status().as_u16() == 429 {
            return Err(SourceError::rate_limited("activejobs rate limited"));
        }
        if !resp.status().is_success() {
            return Err(SourceError::transient(format!(
                "activejobs returned {}",
                resp.status()
            )));
        }

        let data: Vec<Value> = resp
.json()
.await
.map_err(|e| SourceError::transient(format!("activejobs response parse failed: {e}")))?;

        let mut jobs = Vec::new();
        let mut warnings = Vec::new();
        for raw in &data {
            match parse_job(raw) {
                Some(job) => jobs.push(job),
                None => warnings.push("skipped malformed activejobs result".to_string()),
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
.get("organization")
.and_then(|v| v.as_str())
.unwrap_or("Unknown")
.to_string();
    let upstream_id = raw.get("id").and_then(|v| v.as_str()).map(String::from);
    let location = raw
.get("locations_derived")
.and_then(|v| v.as_array())
.and_then(|a| a.first())
.and_then(|v| v.as_str())
.map(String::from);
    let url = raw.get("url").and_then(|v| v.as_str()).map(String::from);
    let description = raw.get("description_text").and_then(|v| v.as_str()).map(String::from);
    let posted_date = raw
.get("date_posted")
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
    fn parses_array_entry() {
        let raw = serde_json::json!({
            "id": "abc",
            "title": "Data Scientist",
            "organization": "Beta GmbH",
            "locations_derived": ["Munich, Germany"],
        });
        let job = parse_job(&raw).expect("parses");
        assert_eq!(job.company, "Beta GmbH");
        assert_eq!(job.location.as_deref(), Some("Munich, Germany"));
    }
}
