use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    create_study_schema(&pool).await?;
    pool.close().await;

    let cache = db::connect(&config.cache.path).await?;
    create_cache_schema(&cache).await?;
    cache.close().await;

    Ok(())
}

pub async fn create_study_schema(pool: &SqlitePool) -> Result<()> {
    // Raw study documents, keyed by aggregator identifier or study number
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS studies (
            id TEXT PRIMARY KEY,
            study_number TEXT,
            body TEXT NOT NULL,
            imported_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_studies_study_number ON studies(study_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_cache_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classification_cache (
            input_key TEXT PRIMARY KEY,
            topics TEXT NOT NULL,
            cached_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
