use std::collections::HashMap;
use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::enricher::Enricher;
use crate::llm::LlmAnalyzer;
use crate::matching::RunRegistry;
use crate::progress::ProgressBroker;
use crate::sources::SourceAdapter;
use crate::token_bucket::TokenBucket;

/// Shared application state, injected into HTTP handlers and background
/// tasks alike. Constructed once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub progress: Arc<ProgressBroker>,
    pub run_registry: Arc<RunRegistry>,
    pub adapters: Arc<Vec<Arc<dyn SourceAdapter>>>,
    pub adapter_buckets: Arc<HashMap<String, Arc<TokenBucket>>>,
    pub llm_bucket: Arc<TokenBucket>,
    pub llm_analyzer: Arc<LlmAnalyzer>,
    pub enricher: Arc<Enricher>,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: Arc<Config>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> anyhow::Result<Self> {
        let mut adapter_buckets = HashMap::new();
        for adapter in &adapters {
            let policy = adapter.quota_policy();
            adapter_buckets.insert(
                adapter.name().to_string(),
                Arc::new(TokenBucket::new(policy.requests_per_period, 24 * 3600)),
            );
        }

        let llm_api_key = config.llm_api_key.clone().unwrap_or_default();
        let llm_analyzer = LlmAnalyzer::new(llm_api_key.clone(), config.llm_api_base_url.clone())?;
        let enricher = Enricher::new(llm_api_key, config.llm_api_base_url.clone())?;

        Ok(AppState {
            pool,
            progress: Arc::new(ProgressBroker::new()),
            run_registry: Arc::new(RunRegistry::new()),
            adapters: Arc::new(adapters),
            adapter_buckets: Arc::new(adapter_buckets),
            llm_bucket: Arc::new(TokenBucket::new(60, 60)),
            llm_analyzer: Arc::new(llm_analyzer),
            enricher: Arc::new(enricher),
            config,
        })
    }
}
