pub mod activejobs;
pub mod adzuna;
pub mod arbeitsagentur;
pub mod common;
pub mod jsearch;

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::NewJob;

/// Adapter-declared quota shape, consulted by the Scheduler before issuing a
/// call. The adapter only describes its budget; enforcement
/// lives in the adapter's backing `TokenBucket`, registered by name in
/// `AppState::token_buckets`.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub requests_per_period: u32,
    pub results_per_request_max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkArrangement {
    Onsite,
    Hybrid,
    Remote,
}

impl WorkArrangement {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkArrangement::Onsite => "onsite",
            WorkArrangement::Hybrid => "hybrid",
            WorkArrangement::Remote => "remote",
        }
    }
}

/// Parameters for one `SourceAdapter::search` call.
#[derive(Debug, Clone)]
pub struct SearchCriteria {
    pub keyword: String,
    pub location: String,
    pub radius_km: Option<u32>,
    pub posted_within_hours: u32,
    pub max_results: u32,
    pub work_arrangement_hint: Option<HashSet<WorkArrangement>>,
}

/// A job as returned by an upstream catalog, before normalization into the
/// canonical `Job` row.
#[derive(Debug, Clone)]
pub struct RawJob {
    pub upstream_id: Option<String>,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub jobs: Vec<RawJob>,
    pub quota_used: u32,
    pub resolved_posted_within_hours: u32,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Transient,
    RateLimited,
    QuotaExhausted,
    Permanent,
}

#[derive(Debug, thiserror::Error)]
#[error("source error ({kind:?}, retryable={retryable}): {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub retryable: bool,
    pub message: String,
}

impl SourceError {
    pub fn transient(message: impl Into<String>) -> Self {
        SourceError {
            kind: SourceErrorKind::Transient,
            retryable: true,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        SourceError {
            kind: SourceErrorKind::RateLimited,
            retryable: false,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        SourceError {
            kind: SourceErrorKind::Permanent,
            retryable: false,
            message: message.into(),
        }
    }
}

/// One external job catalog, adapted behind a uniform search/normalize
/// interface.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    fn quota_policy(&self) -> QuotaPolicy;
    async fn search(&self, criteria: &SearchCriteria) -> Result<SearchOutcome, SourceError>;
}

impl RawJob {
    /// Maps an upstream result to the canonical `Job` shape, generating a
    /// stable content-addressed `external_id` when the upstream has none.
    pub fn normalize(&self, source: &str) -> NewJob {
        let external_id = match &self.upstream_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => common::content_address(
                &self.title,
                &self.company,
                self.location.as_deref().unwrap_or(""),
                self.posted_date,
            ),
        };

        NewJob {
            source: source.to_string(),
            external_id,
            title: self.title.clone(),
            company: self.company.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            url: self.url.clone(),
            posted_date: self.posted_date,
        }
    }
}
