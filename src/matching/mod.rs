pub mod chunker;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::embedder::Embedder;
use crate::matcher;
use crate::models::{CvProfile, Job, JobCursor, MatchUpdate, UserJobMatch, UserSearchQuery, job_embedding};
use crate::progress::ProgressEvent;
use crate::state::AppState;
use chunker::{chunk_by_day, compute_progress, top_k_for_chunk};

/// Legal states for a single user's matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchingStage {
    Idle,
    Initializing,
    LoadingModel,
    FetchingJobs,
    SemanticFiltering,
    SavingMatches,
    Analyzing,
    Done,
    Error,
    Cancelled,
}

impl MatchingStage {
    /// Whether `to` is a legal transition from `self`. Enforced by the
    /// orchestration loop below rather than left implicit.
    pub fn can_transition_to(self, to: MatchingStage) -> bool {
        use MatchingStage::*;
        matches!(
            (self, to),
            (Idle, Initializing)
                | (Initializing, LoadingModel)
                | (LoadingModel, FetchingJobs)
                | (FetchingJobs, SemanticFiltering)
                | (SemanticFiltering, SavingMatches)
                | (SavingMatches, Analyzing)
                | (SavingMatches, FetchingJobs)
                | (Analyzing, FetchingJobs)
                | (Analyzing, Done)
                | (_, Error)
                | (_, Cancelled)
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub force_reanalyze: bool,
    pub latest_day_only: bool,
}

struct RunHandle {
    cancel: Arc<AtomicBool>,
    #[allow(dead_code)]
    task: JoinHandle<()>,
}

/// Enforces "only one run per user_id may be active". A
/// plain `tokio::sync::Mutex<HashMap<..>>` rather than `dashmap`: the
/// registry's check-then-insert needs one exclusive critical section
/// anyway, so a sharded map buys nothing here.
pub struct RunRegistry {
    handles: tokio::sync::Mutex<HashMap<i32, RunHandle>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        RunRegistry {
            handles: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if a new run was started, `false` if one was already
    /// active (no-op in that case).
    pub async fn try_start(&self, user_id: i32, state: AppState, opts: RunOptions) -> bool {
        let mut guard = self.handles.lock().await;
        if let Some(existing) = guard.get(&user_id)
            && !existing.task.is_finished()
        {
            return false;
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = cancel.clone();
        let task_state = state.clone();
        let task = tokio::spawn(async move {
            run_matching(task_state, user_id, opts, task_cancel).await;
        });

        guard.insert(user_id, RunHandle { cancel, task });
        true
    }

    pub async fn cancel(&self, user_id: i32) -> bool {
        let guard = self.handles.lock().await;
        match guard.get(&user_id) {
            Some(handle) => {
                handle.cancel.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Orchestrates the per-user two-stage pipeline. Runs as a
/// background Tokio task; `run_matching` itself never panics on recoverable
/// errors — it always resolves the progress event into `DONE`, `ERROR`, or
/// `CANCELLED`.
pub async fn run_matching(state: AppState, user_id: i32, opts: RunOptions, cancel: Arc<AtomicBool>) {
    state.progress.set(
        user_id,
        ProgressEvent {
            status: "running".to_string(),
            stage: MatchingStage::Initializing,
..ProgressEvent::idle()
        },
    );

    let profile = match CvProfile::get(&state.pool, user_id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            emit_error(&state, user_id, "no cv profile found for this user");
            return;
        }
        Err(e) => {
            emit_error(&state, user_id, &format!("store error loading profile: {e}"));
            return;
        }
    };

    let queries = match UserSearchQuery::active_for_user(&state.pool, user_id).await {
        Ok(q) => q,
        Err(e) => {
            emit_error(&state, user_id, &format!("store error loading queries: {e}"));
            return;
        }
    };

    let locations: Vec<String> = queries.iter().map(|q| q.location.clone()).collect();
    let arrangements: HashSet<String> = queries
.iter()
.flat_map(|q| q.arrangements())
.map(|a| a.to_lowercase())
.collect();

    set_stage(&state, user_id, MatchingStage::LoadingModel, 0, 0, 0, "loading embedding model");
    let embedder = match Embedder::get().await {
        Ok(e) => e,
        Err(e) => {
            emit_error(&state, user_id, &format!("embedder failed to load: {e}"));
            return;
        }
    };

    let user_vector = match embedder.embed(profile.semantic_summary.clone()).await {
        Ok(v) => v,
        Err(e) => {
            emit_error(&state, user_id, &format!("failed to embed profile: {e}"));
            return;
        }
    };

    let since = if opts.latest_day_only {
        Utc::now() - chrono::Duration::days(1)
    } else {
        Utc::now() - chrono::Duration::days(90)
    };

    set_stage(&state, user_id, MatchingStage::FetchingJobs, 0, 0, 0, "fetching candidate jobs");
    let mut candidates = Vec::new();
    let mut cursor: Option<JobCursor> = None;
    loop {
        let page = match Job::for_user(&state.pool, user_id, since, &locations, &[], cursor, 500).await {
            Ok(page) => page,
            Err(e) => {
                emit_error(&state, user_id, &format!("store error paging jobs: {e}"));
                return;
            }
        };
        if page.is_empty() {
            break;
        }
        cursor = page.last().map(|j| JobCursor {
            discovered_date: j.discovered_date,
            id: j.id,
        });
        candidates.extend(page);
        if cancel.load(Ordering::Relaxed) {
            break;
        }
    }

    if cancel.load(Ordering::Relaxed) {
        set_stage(&state, user_id, MatchingStage::Cancelled, 0, 0, 0, "cancelled before analysis began");
        return;
    }

    let chunks = chunk_by_day(candidates, state.config.chunk_max_size);
    let total_chunks = chunks.len() as u32;
    let mut matches_found = 0u32;
    let mut jobs_analyzed = 0u32;

    for (chunk_index, chunk) in chunks.into_iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            set_stage(
                &state,
                user_id,
                MatchingStage::Cancelled,
                chunk_index as u32,
                total_chunks,
                matches_found,
                "cancelled between chunks",
            );
            return;
        }

        let chunk_size = chunk.len();
        set_progress(
            &state,
            user_id,
            MatchingStage::SemanticFiltering,
            chunk_index as u32,
            total_chunks,
            0.0,
            matches_found,
            jobs_analyzed,
            "embedding chunk",
        );

        let arrangement_filtered: Vec<Job> = chunk
            .into_iter()
            .filter(|job| matcher::passes_hard_filters(job, &locations, &arrangements))
            .collect();

        let job_ids: Vec<i32> = arrangement_filtered.iter().map(|j| j.id).collect();
        let cached = job_embedding::get_many(&state.pool, &job_ids, &state.config.embedder_model_version)
            .await
            .unwrap_or_default();

        let mut vectors: Vec<Vec<f32>> = Vec::with_capacity(arrangement_filtered.len());
        let mut to_embed_idx = Vec::new();
        let mut to_embed_text = Vec::new();
        for (i, job) in arrangement_filtered.iter().enumerate() {
            match cached.get(&job.id) {
                Some(v) => vectors.push(v.clone()),
                None => {
                    vectors.push(Vec::new());
                    to_embed_idx.push(i);
                    to_embed_text.push(job.embeddable_text());
                }
            }
        }

        if !to_embed_text.is_empty() {
            let fresh = match embedder.embed_batch(to_embed_text).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(component = "matching_engine", user_id, "embedding failed for chunk: {e}");
                    continue;
                }
            };
            for (idx, vector) in to_embed_idx.into_iter().zip(fresh.into_iter()) {
                let job_id = arrangement_filtered[idx].id;
                if let Err(e) =
                    job_embedding::upsert(&state.pool, job_id, &state.config.embedder_model_version, &vector).await
                {
                    tracing::warn!(component = "matching_engine", user_id, job_id, "failed to cache embedding: {e}");
                }
                vectors[idx] = vector;
            }
        }

        let scored = matcher::score_batch(&user_vector, arrangement_filtered, &vectors, state.config.semantic_threshold);

        set_progress(
            &state,
            user_id,
            MatchingStage::SavingMatches,
            chunk_index as u32,
            total_chunks,
            0.5,
            matches_found,
            jobs_analyzed,
            "saving semantic matches",
        );

        for scored_job in &scored {
            let update = MatchUpdate {
                user_id,
                job_id: scored_job.job.id,
                semantic_score: scored_job.semantic_score,
..MatchUpdate::default()
            };
            match UserJobMatch::upsert(&state.pool, &update).await {
                Ok(_) => matches_found += 1,
                Err(e) => tracing::warn!(component = "matching_engine", user_id, "failed to save match: {e}"),
            }
        }

        set_progress(
            &state,
            user_id,
            MatchingStage::Analyzing,
            chunk_index as u32,
            total_chunks,
            0.7,
            matches_found,
            jobs_analyzed,
            "analyzing top candidates",
        );

        if cancel.load(Ordering::Relaxed) {
            set_stage(
                &state,
                user_id,
                MatchingStage::Cancelled,
                chunk_index as u32,
                total_chunks,
                matches_found,
                "cancelled before analysis",
            );
            return;
        }

        let k = top_k_for_chunk(chunk_size);
        let to_analyze: Vec<_> = scored
            .into_iter()
            .filter(|s| s.semantic_score >= state.config.llm_threshold)
            .take(k)
            .collect();

        let semaphore = Arc::new(Semaphore::new(state.config.llm_workers));
        let mut handles = Vec::with_capacity(to_analyze.len());
        for scored_job in to_analyze {
            if !opts.force_reanalyze {
                match UserJobMatch::get(&state.pool, user_id, scored_job.job.id).await {
                    Ok(Some(existing)) if existing.claude_score.is_some() => continue,
                    _ => {}
                }
            }
            if !state.llm_bucket.try_acquire() {
                continue;
            }
            let permit = semaphore.clone();
            let pool = state.pool.clone();
            let profile = profile.clone();
            let analyzer = state.llm_analyzer.clone();
            handles.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let analysis = analyzer.analyze(&profile, &scored_job.job).await;
                match analysis {
                    Ok(Some(result)) => {
                        let update = MatchUpdate {
                            user_id,
                            job_id: scored_job.job.id,
                            semantic_score: scored_job.semantic_score,
                            claude_score: Some(result.score),
                            priority: Some(result.priority),
                            match_reasoning: Some(result.reasoning),
                            key_alignments: result.alignments,
                            potential_gaps: result.gaps,
                        };
                        let _ = UserJobMatch::upsert(&pool, &update).await;
                        true
                    }
                    Ok(None) => {
                        let update = MatchUpdate {
                            user_id,
                            job_id: scored_job.job.id,
                            semantic_score: scored_job.semantic_score,
                            match_reasoning: Some("analysis unavailable".to_string()),
..MatchUpdate::default()
                        };
                        let _ = UserJobMatch::upsert(&pool, &update).await;
                        false
                    }
                    Err(e) => {
                        tracing::warn!(component = "llm_analyzer", job_id = scored_job.job.id, "analysis failed: {e}");
                        false
                    }
                }
            }));
        }

        // In-flight LLM calls are allowed to complete even after a cancel
        // flip, and their results are persisted.
        let results = futures::future::join_all(handles).await;
        jobs_analyzed += results.into_iter().filter_map(Result::ok).filter(|done| *done).count() as u32;
    }

    if cancel.load(Ordering::Relaxed) {
        set_stage(&state, user_id, MatchingStage::Cancelled, total_chunks, total_chunks, matches_found, "cancelled");
        return;
    }

    set_progress(
        &state,
        user_id,
        MatchingStage::Done,
        total_chunks,
        total_chunks,
        1.0,
        matches_found,
        jobs_analyzed,
        "matching run complete",
    );
}

fn emit_error(state: &AppState, user_id: i32, message: &str) {
    tracing::error!(component = "matching_engine", user_id, kind = "internal", "{message}");
    state.progress.set(
        user_id,
        ProgressEvent {
            status: "error".to_string(),
            stage: MatchingStage::Error,
            progress: 0,
            matches_found: 0,
            jobs_analyzed: 0,
            chunks_completed: 0,
            total_chunks: 0,
            message: message.to_string(),
            news_snippets: None,
        },
    );
}

fn set_stage(
    state: &AppState,
    user_id: i32,
    stage: MatchingStage,
    chunks_completed: u32,
    total_chunks: u32,
    matches_found: u32,
    message: &str,
) {
    set_progress(state, user_id, stage, chunks_completed, total_chunks, 0.0, matches_found, 0, message);
}

#[allow(clippy::too_many_arguments)]
fn set_progress(
    state: &AppState,
    user_id: i32,
    stage: MatchingStage,
    chunks_completed: u32,
    total_chunks: u32,
    sub_stage_fraction: f32,
    matches_found: u32,
    jobs_analyzed: u32,
    message: &str,
) {
    let status = match stage {
        MatchingStage::Done => "done",
        MatchingStage::Error => "error",
        MatchingStage::Cancelled => "cancelled",
        _ => "running",
    };
    state.progress.set(
        user_id,
        ProgressEvent {
            status: status.to_string(),
            stage,
            progress: compute_progress(chunks_completed, total_chunks.max(1), sub_stage_fraction),
            matches_found,
            jobs_analyzed,
            chunks_completed,
            total_chunks,
            message: message.to_string(),
            news_snippets: None,
        },
    );
}
