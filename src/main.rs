mod auth;
mod backfill;
mod config;
mod db;
mod embedder;
mod enricher;
mod error;
mod llm;
mod matcher;
mod matching;
mod models;
mod progress;
mod routes;
mod scheduler;
mod sources;
mod state;
mod token_bucket;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use clap::Parser;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::sources::SourceAdapter;
use crate::sources::activejobs::ActiveJobsDb;
use crate::sources::adzuna::Adzuna;
use crate::sources::arbeitsagentur::Arbeitsagentur;
use crate::sources::jsearch::JSearch;
use crate::state::AppState;

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz(pool: PgPool) -> impl IntoResponse {
    let result: Result<(i32,), _> = sqlx::query_as("SELECT 1").fetch_one(&pool).await;
    match result {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready"),
    }
}

/// Builds the enabled subset of source adapters from config, skipping any
/// whose required credentials aren't set. A misconfigured
/// adapter is logged and dropped rather than failing startup.
fn build_adapters(config: &Config) -> Vec<Arc<dyn SourceAdapter>> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();

    if let (Some(app_id), Some(app_key)) = (&config.adzuna_app_id, &config.adzuna_app_key) {
        match Adzuna::new(app_id.clone(), app_key.clone(), config.adzuna_country.clone()) {
            Ok(a) => adapters.push(Arc::new(a)),
            Err(e) => tracing::warn!(component = "startup", "failed to build adzuna adapter: {e}"),
        }
    }

    if let Some(key) = &config.rapidapi_key {
        match ActiveJobsDb::new(key.clone()) {
            Ok(a) => adapters.push(Arc::new(a)),
            Err(e) => tracing::warn!(component = "startup", "failed to build activejobs adapter: {e}"),
        }
        match JSearch::new(key.clone()) {
            Ok(a) => adapters.push(Arc::new(a)),
            Err(e) => tracing::warn!(component = "startup", "failed to build jsearch adapter: {e}"),
        }
    }

    if let (Some(client_id), Some(client_secret)) =
        (&config.arbeitsagentur_client_id, &config.arbeitsagentur_client_secret)
    {
        match Arbeitsagentur::new(client_id.clone(), client_secret.clone()) {
            Ok(a) => adapters.push(Arc::new(a)),
            Err(e) => tracing::warn!(component = "startup", "failed to build arbeitsagentur adapter: {e}"),
        }
    }

    adapters
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
.with_env_filter(
            EnvFilter::try_from_default_env()
.unwrap_or_else(|_| EnvFilter::new("jobmatch=info,tower_http=info")),
        )
.init();

    let config = Config::parse();

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;
        tracing::info!("Migrations complete");
    }

    match models::job_embedding::invalidate_stale(&pool, &config.embedder_model_version).await {
        Ok(dropped) => tracing::info!(dropped, "invalidated stale cached embeddings"),
        Err(e) => tracing::warn!("failed to invalidate stale embeddings: {e}"),
    }

    let adapters = build_adapters(&config);
    tracing::info!(count = adapters.len(), "source adapters configured");

    let state = AppState::new(pool.clone(), Arc::new(config.clone()), adapters)?;

    tokio::spawn(scheduler::run(state.clone()));

    let readyz_pool = pool.clone();
    let app = Router::new()
.route("/healthz", get(healthz))
.route("/readyz", get(move || readyz(readyz_pool.clone())))
.merge(routes::api::router(state))
.layer(TraceLayer::new_for_http())
.layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!("Listening on {}", config.listen_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
