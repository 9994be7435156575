//! JSON file cache store
//!
//! The whole cache is one JSON object keyed by source id:
//!
//! ```json
//! { "1712345678901234567": { "mastodon": "111222333444555666" } }
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{CacheStore, CrossReferenceCache};
use crate::error::{CacheError, Result};

pub struct JsonCacheStore {
    path: PathBuf,
}

impl JsonCacheStore {
    /// Create a store backed by `path` (`~` is expanded)
    pub fn new(path: &str) -> Self {
        let expanded = shellexpand::tilde(path).to_string();
        Self {
            path: PathBuf::from(expanded),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CacheStore for JsonCacheStore {
    async fn load(&self) -> Result<CrossReferenceCache> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cache file at {}, starting empty", self.path.display());
                return Ok(CrossReferenceCache::new());
            }
            Err(e) => return Err(CacheError::Io(e).into()),
        };

        if content.trim().is_empty() {
            return Ok(CrossReferenceCache::new());
        }

        let cache: CrossReferenceCache =
            serde_json::from_str(&content).map_err(CacheError::Serialization)?;
        debug!(
            "Loaded {} cache entries from {}",
            cache.len(),
            self.path.display()
        );
        Ok(cache)
    }

    async fn save(&self, cache: &CrossReferenceCache) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(CacheError::Io)?;
            }
        }

        let json = serde_json::to_string_pretty(cache).map_err(CacheError::Serialization)?;

        // Write then rename so a crash never leaves a truncated cache behind
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(CacheError::Io)?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(CacheError::Io)?;

        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MirrorError;
    use crate::types::DestinationPlatform;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, name: &str) -> JsonCacheStore {
        JsonCacheStore::new(dir.path().join(name).to_str().unwrap())
    }

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "cache.json");

        let cache = store.load().await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "nested/dir/cache.json");

        let mut cache = CrossReferenceCache::new();
        cache.record("1", DestinationPlatform::Mastodon, "m1");
        cache.record("2", DestinationPlatform::Mastodon, "m2");
        store.save(&cache).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, cache);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_reads_original_cache_layout() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "cache.json");
        std::fs::write(
            store.path(),
            r#"{"100":{"mastodon":"900"},"101":{"mastodon":"901","bluesky":"at://b"}}"#,
        )
        .unwrap();

        let cache = store.load().await.unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("101", DestinationPlatform::Bluesky), Some("at://b"));
    }

    #[tokio::test]
    async fn test_empty_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "cache.json");
        std::fs::write(store.path(), "\n").unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, "cache.json");
        std::fs::write(store.path(), "{ not json").unwrap();

        match store.load().await {
            Err(MirrorError::Cache(CacheError::Serialization(_))) => {}
            other => panic!("Expected serialization error, got {:?}", other),
        }
    }

    #[test]
    fn test_describe() {
        let store = JsonCacheStore::new("/var/lib/mirrorcast/cache.json");
        assert_eq!(store.describe(), "json:/var/lib/mirrorcast/cache.json");
    }
}
