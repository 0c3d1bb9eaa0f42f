use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobmatch", about = "Job-matching engine and ingestion pipeline")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Listen address for the matching API
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// Shared bearer token required on the matching API (access control only,
    /// not a substitute for the OAuth layer that lives outside the core).
    #[arg(long, env = "API_TOKEN")]
    pub api_token: String,

    /// Minimum semantic score persisted by the Semantic Matcher.
    #[arg(long, env = "SEMANTIC_THRESHOLD", default_value_t = 30)]
    pub semantic_threshold: i32,

    /// Minimum semantic score required to enter Stage 2 (LLM analysis).
    #[arg(long, env = "LLM_THRESHOLD", default_value_t = 50)]
    pub llm_threshold: i32,

    /// Maximum number of jobs in a single day-chunk.
    #[arg(long, env = "CHUNK_MAX_SIZE", default_value_t = 500)]
    pub chunk_max_size: usize,

    /// Worker count for the Embedder's per-chunk batch.
    #[arg(long, env = "EMBED_WORKERS", default_value_t = 4)]
    pub embed_workers: usize,

    /// Worker count for the LLM Analyzer's per-chunk Stage 2 pass.
    #[arg(long, env = "LLM_WORKERS", default_value_t = 3)]
    pub llm_workers: usize,

    /// Worker count for the Enricher's bounded pool.
    #[arg(long, env = "ENRICH_WORKERS", default_value_t = 4)]
    pub enrich_workers: usize,

    /// Maximum jobs enriched per Scheduler tick.
    #[arg(long, env = "ENRICH_PER_TICK", default_value_t = 50)]
    pub enrich_per_tick: i64,

    /// Interval between Collector Scheduler ticks, in minutes.
    #[arg(long, env = "COLLECTOR_INTERVAL_MINUTES", default_value_t = 60)]
    pub collector_interval_minutes: u64,

    /// Comma-separated set of enabled source adapter names.
    #[arg(
        long,
        env = "SOURCES_ENABLED",
        default_value = "adzuna,activejobs,arbeitsagentur,jsearch",
        value_delimiter = ','
    )]
    pub sources_enabled: Vec<String>,

    /// LLM provider API key. Never logged.
    #[arg(long, env = "LLM_API_KEY")]
    pub llm_api_key: Option<String>,

    /// LLM provider base URL.
    #[arg(
        long,
        env = "LLM_API_BASE_URL",
        default_value = "https://api.anthropic.com/v1"
    )]
    pub llm_api_base_url: String,

    /// Cache key for pre-computed job embeddings; bumping this invalidates
    /// every cached vector.
    #[arg(
        long,
        env = "EMBEDDER_MODEL_VERSION",
        default_value = "multilingual-e5-small-v1"
    )]
    pub embedder_model_version: String,

    /// Adzuna application id / key (secrets, env only).
    #[arg(long, env = "ADZUNA_APP_ID")]
    pub adzuna_app_id: Option<String>,
    #[arg(long, env = "ADZUNA_APP_KEY")]
    pub adzuna_app_key: Option<String>,
    #[arg(long, env = "ADZUNA_COUNTRY", default_value = "de")]
    pub adzuna_country: String,

    /// RapidAPI key shared by ActiveJobs and JSearch.
    #[arg(long, env = "RAPIDAPI_KEY")]
    pub rapidapi_key: Option<String>,

    /// Arbeitsagentur OAuth2 client credentials.
    #[arg(long, env = "ARBEITSAGENTUR_CLIENT_ID")]
    pub arbeitsagentur_client_id: Option<String>,
    #[arg(long, env = "ARBEITSAGENTUR_CLIENT_SECRET")]
    pub arbeitsagentur_client_secret: Option<String>,
}
