use crate::models::{BackfillTracking, Combination, Job, SourceFetchRun, UserSearchQuery};
use crate::sources::SearchCriteria;
use crate::state::AppState;

/// Triggered when a user's queries are (re)registered.
/// Enumerates the user's combinations, skips any already backfilled
/// globally, and runs the remainder as one-shot historical fetches claimed
/// through `source_fetch_runs` so concurrent overlapping registrations
/// don't double-fetch.
pub async fn plan_and_run(state: &AppState, user_id: i32) {
    let queries = match UserSearchQuery::active_for_user(&state.pool, user_id).await {
        Ok(q) => q,
        Err(e) => {
            tracing::error!(component = "backfill_planner", user_id, kind = "store", "failed to load queries: {e}");
            return;
        }
    };

    for query in &queries {
        let combo = Combination::new(&query.title_keyword, &query.location, &query.work_arrangement);
        match BackfillTracking::is_backfilled(&state.pool, &combo).await {
            Ok(true) => continue,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(component = "backfill_planner", user_id, "is_backfilled check failed: {e}");
                continue;
            }
        }

        run_combination(state, &combo).await;
    }
}

async fn run_combination(state: &AppState, combo: &Combination) {
    let combo_key = format!("{}|{}|{}", combo.title_keyword, combo.location, combo.work_arrangement);

    for adapter in state.adapters.iter() {
        if !state.config.sources_enabled.iter().any(|s| s == adapter.name()) {
            continue;
        }

        if let Err(e) = SourceFetchRun::enqueue(&state.pool, adapter.name(), "backfill", Some(&combo_key)).await {
            tracing::warn!(component = "backfill_planner", "failed to enqueue fetch run: {e}");
            continue;
        }

        // Claim our own or a concurrent caller's row for this exact combo;
        // a caller that loses the race simply observes nothing pending and
        // moves on, while the winner executes the fetch once.
        let claimed = match SourceFetchRun::claim_next_for_combo(&state.pool, adapter.name(), "backfill", &combo_key).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(component = "backfill_planner", "failed to claim fetch run: {e}");
                continue;
            }
        };

        let Some(bucket) = state.adapter_buckets.get(adapter.name()) else {
            continue;
        };
        if !bucket.try_acquire() {
            let _ = SourceFetchRun::mark_failed(&state.pool, claimed.id, "quota exhausted").await;
            continue;
        }

        let criteria = SearchCriteria {
            keyword: combo.title_keyword.clone(),
            location: combo.location.clone(),
            radius_km: None,
            posted_within_hours: 30 * 24,
            max_results: 50,
            work_arrangement_hint: None,
        };

        match adapter.search(&criteria).await {
            Ok(outcome) => {
                let mut new_count = 0;
                for raw in &outcome.jobs {
                    let new_job = raw.normalize(adapter.name());
                    if let Ok((_, inserted)) = Job::upsert(&state.pool, new_job).await
                        && inserted
                    {
                        new_count += 1;
                    }
                }
                let _ = SourceFetchRun::mark_succeeded(&state.pool, claimed.id, outcome.jobs.len() as i32, new_count).await;
                let _ = BackfillTracking::mark(&state.pool, combo, outcome.jobs.len() as i32).await;
            }
            Err(e) => {
                // Persistent failure: leave the combination unmarked so a
                // later registration can retry it.
                let _ = SourceFetchRun::mark_failed(&state.pool, claimed.id, &e.message).await;
            }
        }
    }
}
