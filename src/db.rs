use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connection pool sized min 2, max 20; each worker borrows a connection
/// per operation rather than holding one across awaits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
.min_connections(2)
.max_connections(20)
.connect(database_url)
.await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
