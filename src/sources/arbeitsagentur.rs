use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use super::common::{normalize_country_filter, round_posted_within_hours};
use super::{QuotaPolicy, RawJob, SearchCriteria, SearchOutcome, SourceAdapter, SourceError};

const TOKEN_URL: &str = "https://rest.arbeitsagentur.de/oauth/gettoken_cc";
const SEARCH_URL: &str = "https://rest.arbeitsagentur.de/jobboerse/jobsuche-service/pc/v4/jobs";

struct CachedToken {
    value: String,
    expires_at: std::time::Instant,
}

/// German federal job board. OAuth2 client-credentials token fetch cached
/// for its lifetime, then a bearer-authenticated search call; the upstream
/// has no country parameter so the result set is filtered client-side.
pub struct Arbeitsagentur {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl Arbeitsagentur {
    pub fn new(client_id: String, client_secret: String) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
.user_agent("jobmatch/0.1")
.timeout(std::time::Duration::from_secs(30))
.build()
.map_err(|e| {
                SourceError::permanent(format!("failed to build arbeitsagentur client: {e}"))
            })?;
        Ok(Arbeitsagentur {
            client,
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    async fn fetch_token(&self) -> Result<String, SourceError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref()
            && cached.expires_at > std::time::Instant::now()
        {
            return Ok(cached.value.clone());
        }

        let resp = self
.client
.post(TOKEN_URL)
.form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
.send()
.await
.map_err(|e| SourceError::transient(format!("token request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(SourceError::permanent(format!(
                "token request returned {}",
                resp.status()
            )));
        }

        let body: Value = resp
.json()
.await
.map_err(|e| SourceError::transient(format!("token response parse failed: {e}")))?;

        let access_token = body
.get("access_token")
.and_then(|v| v.as_str())
.ok_or_else(|| SourceError::permanent("token response missing access_token"))?
.to_string();
        let expires_in = body.get("expires_in").and_then(|v| v.as_u64()).unwrap_or(300);

        *guard = Some(CachedToken {
            value: access_token.clone(),
            expires_at: std::time::Instant::now() + std::time::Duration::from_secs(expires_in.saturating_sub(10)),
        });

        Ok(access_token)
    }
}

#[async_trait]
impl SourceAdapter for Arbeitsagentur {
    fn name(&self) -> &'static str {
        "arbeitsagentur"
    }

    fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            requests_per_period: 1000,
            results_per_request_max: 100,
        }
    }

    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SourceError> {
        let resolved_hours = round_posted_within_hours(criteria.posted_within_hours);
        let token = self.fetch_token().await?;

        let resp = self
.client
.get(SEARCH_URL)
.bearer_auth(&token)
.query(&[
                ("was", criteria.keyword.as_str()),
                ("wo", criteria.location.as_str()),
                ("veroeffentlichtseit", &(resolved_hours / 24).max(1).to_string()),
                ("size", &criteria.max_results.to_string()),
            ])
.send()
.await
.map_err(|e| SourceError::transient(format!("arbeitsagentur request failed: {e}")))?;

        if resp.status().as_u16() == 429 {
            return Err(SourceError::rate_limited("arbeitsagentur rate limited"));
        }
        if !resp.status().is_success() {
            return Err(SourceError::transient(format!(
                "arbeitsagentur returned {}",
                resp.status()
            )));
        }

        let data: Value = resp
.json()
.await
.map_err(|e| SourceError::transient(format!("arbeitsagentur response parse failed: {e}")))?;

        let mut jobs = Vec::new();
        let mut warnings = Vec::new();
        for raw in data.get("stellenangebote").and_then(|v| v.as_array()).into_iter().flatten() {
            match parse_job(raw) {
                Some(job) => jobs.push(job),
                None => warnings.push("skipped malformed arbeitsagentur result".to_string()),
            }
        }

        let jobs = normalize_country_filter(jobs, "de");

        Ok(SearchOutcome {
            quota_used: 1,
            resolved_posted_within_hours: resolved_hours,
            jobs,
            warnings,
        })
    }
}

fn parse_job(raw: &Value) -> Option<RawJob> {
    let title = raw.get("titel").and_then(|v| v.as_str())?.to_string();
    let company = raw
.get("arbeitgeber")
.and_then(|v| v.as_str())
.unwrap_or("Unknown")
.to_string();
    let upstream_id = raw.get("refnr").and_then(|v| v.as_str()).map(String::from);
    let location = raw
.get("arbeitsort")
.and_then(|o| o.get("ort"))
.and_then(|v| v.as_str())
.map(String::from);
    let posted_date = raw
.get("aktuelleVeroeffentlichungsdatum")
.and_then(|v| v.as_str())
.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
.map(|d| d.with_timezone(&Utc));

    Some(RawJob {
        upstream_id,
        title,
        company,
        location,
        country: Some("de".to_string()),
        description: None,
        url: None,
        posted_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_result() {
        let raw = serde_json::json!({
            "refnr": "abc-1",
            "titel": "Softwareentwickler",
            "arbeitgeber": "Beispiel GmbH",
            "arbeitsort": {"ort": "Hamburg"},
        });
        let job = parse_job(&raw).expect("parses");
        assert_eq!(job.country.as_deref(), Some("de"));
        assert_eq!(job.location.as_deref(), Some("Hamburg"));
    }
}
