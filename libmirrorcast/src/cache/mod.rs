//! Cross-reference cache between source and destination post ids
//!
//! The cache maps a source post id to the ids that post was given on each
//! destination platform. An entry exists iff the post has been published to
//! at least one destination, so absence means "not yet synced". Entries are
//! never removed; a new platform mapping may be added to an existing entry.
//!
//! Persistence is behind the [`CacheStore`] trait:
//!
//! - [`json::JsonCacheStore`] - a single JSON document on disk
//! - [`sqlite::SqliteCacheStore`] - a SQLite table managed by sqlx

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::DestinationPlatform;

pub mod json;
pub mod sqlite;

pub use json::JsonCacheStore;
pub use sqlite::SqliteCacheStore;

/// Destination ids recorded for one source post
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheEntry {
    platforms: BTreeMap<DestinationPlatform, String>,
}

impl CacheEntry {
    /// Destination id on `platform`, if the post was published there
    pub fn get(&self, platform: DestinationPlatform) -> Option<&str> {
        self.platforms.get(&platform).map(String::as_str)
    }

    pub fn platforms(&self) -> impl Iterator<Item = (DestinationPlatform, &str)> {
        self.platforms.iter().map(|(p, id)| (*p, id.as_str()))
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

/// The full source-id to [`CacheEntry`] mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, CacheEntry>", into = "BTreeMap<String, CacheEntry>")]
pub struct CrossReferenceCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl From<BTreeMap<String, CacheEntry>> for CrossReferenceCache {
    fn from(mut entries: BTreeMap<String, CacheEntry>) -> Self {
        entries.retain(|_, entry| !entry.is_empty());
        Self { entries }
    }
}

impl From<CrossReferenceCache> for BTreeMap<String, CacheEntry> {
    fn from(cache: CrossReferenceCache) -> Self {
        cache.entries
    }
}

impl CrossReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `source_id` has been published to any destination
    pub fn contains(&self, source_id: &str) -> bool {
        self.entries.contains_key(source_id)
    }

    pub fn get(&self, source_id: &str) -> Option<&CacheEntry> {
        self.entries.get(source_id)
    }

    /// Destination id of `source_id` on `platform`
    pub fn lookup(&self, source_id: &str, platform: DestinationPlatform) -> Option<&str> {
        self.entries.get(source_id).and_then(|e| e.get(platform))
    }

    /// Record a successful publish of `source_id` on `platform`
    ///
    /// Returns `false` when the post already had a mapping for `platform`;
    /// the existing mapping is kept.
    pub fn record(
        &mut self,
        source_id: &str,
        platform: DestinationPlatform,
        destination_id: &str,
    ) -> bool {
        let entry = self.entries.entry(source_id.to_string()).or_default();
        if entry.platforms.contains_key(&platform) {
            return false;
        }
        entry.platforms.insert(platform, destination_id.to_string());
        true
    }

    /// Entries ordered by source id
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CacheEntry)> {
        self.entries.iter().map(|(id, entry)| (id.as_str(), entry))
    }

    /// Number of posts mirrored to `platform`
    pub fn count_for(&self, platform: DestinationPlatform) -> usize {
        self.entries
            .values()
            .filter(|e| e.get(platform).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Persistent storage for the [`CrossReferenceCache`]
///
/// A run loads the cache once and saves the whole structure after every
/// successful publish. There is a single writer per store.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load the persisted cache; a store that does not exist yet is empty
    async fn load(&self) -> Result<CrossReferenceCache>;

    /// Persist `cache`
    async fn save(&self, cache: &CrossReferenceCache) -> Result<()>;

    /// Human-readable location of the store, for logs
    fn describe(&self) -> String;
}
