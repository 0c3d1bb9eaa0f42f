use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::RawJob;

/// `external_id = sha256(title|company|location|posted_date)[..32]` hex,
/// used when an upstream catalog has no stable identifier.
pub fn content_address(
    title: &str,
    company: &str,
    location: &str,
    posted_date: Option<DateTime<Utc>>,
) -> String {
    let posted = posted_date.map(|d| d.to_rfc3339()).unwrap_or_default();
    let input = format!("{title}|{company}|{location}|{posted}");
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// Rounds a requested recency window to an adapter's nearest supported
/// bucket, returning the bucket actually used. Buckets
/// are hours; `{0, 1, 7, 14, 30} * 24`.
pub fn round_posted_within_hours(requested_hours: u32) -> u32 {
    const BUCKETS_DAYS: [u32; 5] = [0, 1, 7, 14, 30];
    let requested_days = requested_hours / 24;
    let resolved_days = BUCKETS_DAYS
.iter()
.copied()
.min_by_key(|&bucket| (bucket as i64 - requested_days as i64).abs())
.unwrap_or(0);
    resolved_days * 24
}

/// Drops results whose upstream-reported country doesn't match the
/// expected one, for adapters whose search API ignores a country
/// constraint.
pub fn normalize_country_filter(jobs: Vec<RawJob>, expected_country: &str) -> Vec<RawJob> {
    let expected = expected_country.to_lowercase();
    jobs.into_iter()
.filter(|j| match &j.country {
            Some(c) => c.to_lowercase() == expected,
            None => true,
        })
.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_address_is_stable_for_same_inputs() {
        let a = content_address("Backend Engineer", "Acme", "Berlin", None);
        let b = content_address("Backend Engineer", "Acme", "Berlin", None);
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn content_address_differs_on_title() {
        let a = content_address("Backend Engineer", "Acme", "Berlin", None);
        let b = content_address("Frontend Engineer", "Acme", "Berlin", None);
        assert_ne!(a, b);
    }

    #[test]
    fn rounds_to_nearest_supported_bucket() {
        assert_eq!(round_posted_within_hours(0), 0);
        assert_eq!(round_posted_within_hours(20), 24);
        assert_eq!(round_posted_within_hours(10 * 24), 7 * 24);
        assert_eq!(round_posted_within_hours(20 * 24), 14 * 24);
        assert_eq!(round_posted_within_hours(100 * 24), 30 * 24);
    }

    #[test]
    fn country_filter_drops_mismatches_keeps_unknown() {
        let jobs = vec![
            RawJob {
                upstream_id: None,
                title: "A".into(),
                company: "X".into(),
                location: None,
                country: Some("DE".into()),
                description: None,
                url: None,
                posted_date: None,
            },
            RawJob {
                upstream_id: None,
                title: "B".into(),
                company: "X".into(),
                location: None,
                country: Some("FR".into()),
                description: None,
                url: None,
                posted_date: None,
            },
            RawJob {
                upstream_id: None,
                title: "C".into(),
                company: "X".into(),
                location: None,
                country: None,
                description: None,
                url: None,
                posted_date: None,
            },
        ];
        let filtered = normalize_country_filter(jobs, "de");
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].title, "A");
        assert_eq!(filtered[1].title, "C");
    }
}
