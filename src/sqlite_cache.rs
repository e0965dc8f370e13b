//! Durable classification cache in its own SQLite database.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;

use skgif_core::cache::{ClassificationCache, ClassificationCacheEntry};

use crate::db;
use crate::migrate::create_cache_schema;

pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open the cache database, creating the table if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        create_cache_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn len(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM classification_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl ClassificationCache for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<ClassificationCacheEntry>> {
        let row = sqlx::query(
            "SELECT input_key, topics, cached_at FROM classification_cache WHERE input_key = ?",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let topics: String = row.get("topics");
        let cached_at: i64 = row.get("cached_at");
        Ok(Some(ClassificationCacheEntry {
            input_key: row.get("input_key"),
            topics: serde_json::from_str(&topics)
                .with_context(|| format!("Corrupt cache entry for key {}", key))?,
            cached_at: chrono::DateTime::from_timestamp(cached_at, 0).unwrap_or_default(),
        }))
    }

    async fn put(&self, entry: &ClassificationCacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO classification_cache (input_key, topics, cached_at)
            VALUES (?, ?, ?)
            ON CONFLICT(input_key) DO UPDATE SET
                topics = excluded.topics,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(&entry.input_key)
        .bind(serde_json::to_string(&entry.topics)?)
        .bind(entry.cached_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
