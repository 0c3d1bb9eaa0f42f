use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::common::round_posted_within_hours;
use super::{QuotaPolicy, RawJob, SearchCriteria, SearchOutcome, SourceAdapter, SourceError};

const BASE_URL: &str = "https://jsearch.p.rapidapi.com/search";
const RAPIDAPI_HOST: &str = "jsearch.p.rapidapi.com";

/// RapidAPI-hosted catalog. `posted_within_hours` rounds to the nearest
/// bucket JSearch's `date_posted` enum actually supports
/// (`all|today|3days|week|month`), with the resolved bucket's hour
/// equivalent surfaced via `resolved_posted_within_hours`.
pub struct JSearch {
    client: reqwest::Client,
    rapidapi_key: String,
}

impl JSearch {
    pub fn new(rapidapi_key: String) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
.user_agent("jobmatch/0.1")
.timeout(std::time::Duration::from_secs(30))
.build()
.map_err(|e| SourceError::permanent(format!("failed to build jsearch client: {e}")))?;
        Ok(JSearch { client, rapidapi_key })
    }
}

fn date_posted_param(resolved_hours: u32) -> &'static str {
    match resolved_hours {
        0 => "today",
        24 => "today",
        h if h <= 7 * 24 => "3days",
        h if h <= 14 * 24 => "week",
        _ => "month",
    }
}

#[async_trait]
impl SourceAdapter for JSearch {
    fn name(&self) -> &'static str {
        "jsearch"
    }

    fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            requests_per_period: 200,
            results_per_request_max: 10,
        }
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SourceError> {
        let resolved_hours = round_posted_within_hours(criteria.posted_within_hours);
        let query = format!("{} in {}", criteria.keyword, criteria.location);

        let resp = self
.client
.get(BASE_URL)
.header("X-RapidAPI-Key", &self.rapidapi_key)
.header("X-RapidAPI-Host", RAPIDAPI_HOST)
.query(&[
                ("query", query.as_str()),
                ("date_posted", date_posted_param(resolved_hours)),
                ("num_pages", "1"),
            ])
.send()
.await
.map_err(|e| SourceError::transient(format!("jsearch request failed: {e}")))?;

        if resp.status().as_u16() == 429 {
            return Err(SourceError::rate_limited("jsearch rate limited"));
        }
        if !resp.status().is_success() {
            return Err(SourceError::transient(format!(
                "jsearch returned {}",
                resp.status()
            )));
        }

        let data: Value = resp
.json()
.await
.map_err(|e| SourceError::transient(format!("jsearch response parse failed: {e}")))?;

        let mut jobs = Vec::new();
        let mut warnings = Vec::new();
        for raw in data.get("data").and_then(|v| v.as_array()).into_iter().flatten() {
            match parse_job(raw) {
                Some(job) => jobs.push(job),
                None => warnings.push("skipped malformed jsearch result".to_string()),
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
    let title = raw.get("job_title").and_then(|v| v.as_str())?.to_string();
    let company = raw
.get("employer_name")
.and_then(|v| v.as_str())
.unwrap_or("Unknown")
.to_string();
    let upstream_id = raw.get("job_id").and_then(|v| v.as_str()).map(String::from);
    let city = raw.get("job_city").and_then(|v| v.as_str());
    let country = raw.get("job_country").and_then(|v| v.as_str());
    let location = city.map(|c| match country {
        Some(country) => format!("{c}, {country}"),
        None => c.to_string(),
    });
    let url = raw.get("job_apply_link").and_then(|v| v.as_str()).map(String::from);
    let description = raw.get("job_description").and_then(|v| v.as_str()).map(String::from);
    let posted_date = raw
.get("job_posted_at_datetime_utc")
.and_then(|v| v.as_str())
.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
.map(|d| d.with_timezone(&Utc));

    Some(RawJob {
        upstream_id,
        title,
        company,
        location,
        country: country.map(String::from),
        description,
        url,
        posted_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_posted_rounds_to_supported_buckets() {
        assert_eq!(date_posted_param(0), "today");
        assert_eq!(date_posted_param(7 * 24), "3days");
        assert_eq!(date_posted_param(14 * 24), "week");
        assert_eq!(date_posted_param(30 * 24), "month");
    }

    #[test]
    fn parses_minimal_result() {
        let raw = serde_json::json!({
            "job_id": "j-1",
            "job_title": "Platform Engineer",
            "employer_name": "Gamma",
            "job_city": "Remote",
            "job_country": "DE",
        });
        let job = parse_job(&raw).expect("parses");
        assert_eq!(job.location.as_deref(), Some("Remote, DE"));
        assert_eq!(job.country.as_deref(), Some("DE"));
    }
}
