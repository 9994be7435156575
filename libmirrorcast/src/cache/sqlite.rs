//! SQLite cache store

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::path::Path;

use super::{CacheStore, CrossReferenceCache};
use crate::error::{CacheError, Result};
use crate::types::DestinationPlatform;

#[derive(Clone)]
pub struct SqliteCacheStore {
    pool: SqlitePool,
    path: String,
}

impl SqliteCacheStore {
    /// Open (creating if needed) the cache database at `db_path`
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(CacheError::Io)?;
            }
        }

        // Forward slashes work for SQLite URLs on every platform; mode=rwc creates the file
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(CacheError::Sqlx)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(CacheError::Migration)?;

        Ok(Self {
            pool,
            path: expanded_path,
        })
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn load(&self) -> Result<CrossReferenceCache> {
        let rows = sqlx::query(
            r#"
            SELECT source_id, platform, destination_id
            FROM cross_references
            ORDER BY recorded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(CacheError::Sqlx)?;

        let mut cache = CrossReferenceCache::new();
        for row in rows {
            let source_id: String = row.get("source_id");
            let platform_name: String = row.get("platform");
            let destination_id: String = row.get("destination_id");

            let platform: DestinationPlatform = platform_name
                .parse()
                .map_err(|_| CacheError::UnknownPlatform(platform_name.clone()))?;

            cache.record(&source_id, platform, &destination_id);
        }

        Ok(cache)
    }

    async fn save(&self, cache: &CrossReferenceCache) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(CacheError::Sqlx)?;

        // Existing rows are never rewritten: mappings are append-only
        for (source_id, entry) in cache.iter() {
            for (platform, destination_id) in entry.platforms() {
                sqlx::query(
                    r#"
                    INSERT OR IGNORE INTO cross_references (source_id, platform, destination_id, recorded_at)
                    VALUES (?, ?, ?, ?)
                    "#,
                )
                .bind(source_id)
                .bind(platform.as_str())
                .bind(destination_id)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(CacheError::Sqlx)?;
            }
        }

        tx.commit().await.map_err(CacheError::Sqlx)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}
