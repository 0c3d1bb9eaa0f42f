use std::collections::HashSet;
use std::time::Duration;

use crate::models::{Job, SourceAdapterState, UserSearchQuery};
use crate::sources::{SearchCriteria, WorkArrangement};
use crate::state::AppState;

/// Hourly cron driving the Scheduler's ingest + enrich cycle. Runs as a
/// dedicated background task from `main`, with a `tokio::select! { biased;
/// ctrl_c() }` shutdown so an in-flight tick finishes before the process
/// exits.
pub async fn run(state: AppState) {
    let mut interval = tokio::time::interval(Duration::from_secs(state.config.collector_interval_minutes * 60));
    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!(component = "scheduler", "shutdown signal received, exiting gracefully");
                break;
            }
            _ = interval.tick() => {
                scheduler_tick(&state).await;
            }
        }
    }
}

/// One collection cycle. Exposed standalone (not only timer-driven) so it
/// can be invoked from `POST /scheduler/tick` and from tests.
pub async fn scheduler_tick(state: &AppState) {
    let queries = match UserSearchQuery::active(&state.pool).await {
        Ok(q) => q,
        Err(e) => {
            tracing::error!(component = "scheduler", kind = "store", "failed to load active queries: {e}");
            return;
        }
    };

    let mut combinations: HashSet<(String, String, String)> = HashSet::new();
    for query in &queries {
        combinations.insert(query.combination());
    }

    let grace_hours = 1;
    let posted_within_hours = state.config.collector_interval_minutes / 60 + grace_hours;

    for (keyword, location, arrangement_set) in combinations {
        let arrangements = parse_arrangements(&arrangement_set);
        let criteria = SearchCriteria {
            keyword,
            location,
            radius_km: None,
            posted_within_hours: posted_within_hours as u32,
            max_results: 50,
            work_arrangement_hint: if arrangements.is_empty() { None } else { Some(arrangements) },
        };

        for adapter in state.adapters.iter() {
            if !state.config.sources_enabled.iter().any(|s| s == adapter.name()) {
                continue;
            }
            let Some(bucket) = state.adapter_buckets.get(adapter.name()) else {
                continue;
            };
            if !bucket.try_acquire() {
                continue;
            }

            match adapter.search(&criteria).await {
                Ok(outcome) => {
                    let mut new_count = 0;
                    for raw in &outcome.jobs {
                        let new_job = raw.normalize(adapter.name());
                        match Job::upsert(&state.pool, new_job).await {
                            Ok((_, inserted)) => {
                                if inserted {
                                    new_count += 1;
                                }
                            }
                            Err(e) => tracing::warn!(
                                component = "scheduler",
                                adapter = adapter.name(),
                                "failed to upsert job: {e}"
                            ),
                        }
                    }
                    let _ = SourceAdapterState::record_run(&state.pool, adapter.name(), None).await;
                    tracing::info!(
                        component = "scheduler",
                        adapter = adapter.name(),
                        found = outcome.jobs.len(),
                        new = new_count,
                        "adapter search complete"
                    );
                }
                Err(e) => {
                    let _ = SourceAdapterState::record_run(&state.pool, adapter.name(), Some(&e.message)).await;
                    tracing::warn!(
                        component = "scheduler",
                        adapter = adapter.name(),
                        kind = ?e.kind,
                        retryable = e.retryable,
                        "adapter search failed: {}",
                        e.message
                    );
                }
            }
        }
    }

    let enriched = state
.enricher
.enrich_batch(&state.pool, state.config.enrich_per_tick, state.config.enrich_workers)
.await;
    tracing::info!(component = "scheduler", enriched, "enrichment batch complete");
}

fn parse_arrangements(pipe_joined: &str) -> HashSet<WorkArrangement> {
    pipe_joined
.split('|')
.filter_map(|s| match s.to_lowercase().as_str() {
            "onsite" => Some(WorkArrangement::Onsite),
            "hybrid" => Some(WorkArrangement::Hybrid),
            "remote" => Some(WorkArrangement::Remote),
            _ => None,
        })
.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_arrangements_and_skips_unknown() {
        let set = parse_arrangements("remote|onsite|bogus");
        assert!(set.contains(&WorkArrangement::Remote));
        assert!(set.contains(&WorkArrangement::Onsite));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn empty_string_yields_empty_set() {
        assert!(parse_arrangements("").is_empty());
    }
}
