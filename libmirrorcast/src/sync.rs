//! One sync cycle: fetch, select, compose, publish, record
//!
//! Posts are handled strictly one at a time, oldest first, and the cache is
//! saved after every successful publish before the next post is composed, so
//! a reply or self-quote published later in the same cycle resolves against
//! its predecessor.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::cache::{CacheStore, CrossReferenceCache};
use crate::composer::compose_post;
use crate::config::Config;
use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::selector::{select_content, SelectionParams};
use crate::source::SourceClient;
use crate::types::{DestinationPlatform, UnresolvedReference};

/// Per-run settings of the sync cycle
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Source account being mirrored
    pub account: String,
    pub max_posts: usize,
    pub window: Duration,
    /// Compose and log without publishing or writing the cache
    pub dry_run: bool,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            account: config.source.username.clone(),
            max_posts: config.source.max_posts,
            window: config.sync.window()?,
            dry_run: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedPost {
    pub source_id: String,
    pub destination_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPost {
    pub source_id: String,
    pub error: String,
}

/// Outcome of one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Posts that passed selection
    pub candidates: usize,
    pub published: Vec<PublishedPost>,
    /// Source ids rejected by destination validation
    pub skipped: Vec<String>,
    /// Publish failure that stopped the cycle
    pub failed: Option<FailedPost>,
    pub unresolved: Vec<UnresolvedReference>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

pub struct Syncer {
    source: Box<dyn SourceClient>,
    platform: Box<dyn Platform>,
    store: Box<dyn CacheStore>,
    options: SyncOptions,
    /// Published mappings whose save failed, written back before the next publish
    unsaved: Mutex<CrossReferenceCache>,
}

impl Syncer {
    pub fn new(
        source: Box<dyn SourceClient>,
        platform: Box<dyn Platform>,
        store: Box<dyn CacheStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            platform,
            store,
            options,
            unsaved: Mutex::new(CrossReferenceCache::new()),
        }
    }

    /// Authenticate the destination; required once before the first cycle
    pub async fn authenticate(&mut self) -> Result<()> {
        self.platform.authenticate().await?;
        let limit = self
            .platform
            .character_limit()
            .map_or_else(|| "no".to_string(), |limit| limit.to_string());
        info!(
            "Mirroring @{} to {} as @{} ({} character limit, {})",
            self.options.account,
            self.platform.name(),
            self.platform.handle().unwrap_or_default(),
            limit,
            self.store.describe()
        );
        Ok(())
    }

    /// Run one cycle as of `now`
    ///
    /// Cache load and save failures are returned as errors. A mapping whose
    /// save failed is kept in memory and saved at the start of the next cycle,
    /// before anything else is published. A publish failure stops the cycle
    /// and is reported in [`SyncReport::failed`]; the failed post and
    /// everything after it stay uncached and are retried next cycle.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<SyncReport> {
        let handle = self
            .platform
            .handle()
            .ok_or_else(|| {
                PlatformError::Authentication(format!(
                    "{} is not authenticated",
                    self.platform.name()
                ))
            })?
            .to_string();
        let destination = self.platform.platform();

        let mut cache = self.store.load().await?;
        self.restore_unsaved(&mut cache).await?;

        let params = SelectionParams {
            now,
            window: self.options.window,
            self_handle: &self.options.account,
        };
        let stream = self
            .source
            .fetch_posts(&self.options.account, self.options.max_posts);
        let posts = select_content(stream, &cache, &params).await;

        let mut report = SyncReport {
            candidates: posts.len(),
            dry_run: self.options.dry_run,
            ..Default::default()
        };

        for post in posts {
            let composed = compose_post(
                &post,
                &cache,
                destination,
                &handle,
                self.platform.instance_host(),
            );
            report.unresolved.extend(composed.unresolved.iter().cloned());

            if let Err(e) = self.platform.validate_content(&composed.status) {
                warn!("Skipping post {}: {}", post.id, e);
                report.skipped.push(post.id.clone());
                continue;
            }

            if self.options.dry_run {
                // Record a placeholder so later posts in this run preview their links
                let placeholder = format!("dry-run-{}", report.published.len() + 1);
                cache.record(&post.id, destination, &placeholder);
                info!(
                    "[dry run] Would publish {} to {}: {:?}",
                    post.id, destination, composed.status
                );
                report.published.push(PublishedPost {
                    source_id: post.id.clone(),
                    destination_id: placeholder,
                });
                continue;
            }

            match self.platform.publish(&composed).await {
                Ok(destination_id) => {
                    cache.record(&post.id, destination, &destination_id);
                    if let Err(e) = self.store.save(&cache).await {
                        self.remember_unsaved(&post.id, destination, &destination_id);
                        error!(
                            "Published {} as {} but could not save the cache: {}",
                            post.id, destination_id, e
                        );
                        return Err(e);
                    }
                    info!(
                        "Mirrored {} to {} as {}",
                        post.id, destination, destination_id
                    );
                    report.published.push(PublishedPost {
                        source_id: post.id.clone(),
                        destination_id,
                    });
                }
                Err(e) => {
                    error!("Failed to publish {} to {}: {}", post.id, destination, e);
                    report.failed = Some(FailedPost {
                        source_id: post.id.clone(),
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        Ok(report)
    }

    fn remember_unsaved(
        &self,
        source_id: &str,
        platform: DestinationPlatform,
        destination_id: &str,
    ) {
        if let Ok(mut unsaved) = self.unsaved.lock() {
            unsaved.record(source_id, platform, destination_id);
        }
    }

    /// Merge mappings left over from a failed save into `cache` and persist them
    async fn restore_unsaved(&self, cache: &mut CrossReferenceCache) -> Result<()> {
        let pending = match self.unsaved.lock() {
            Ok(unsaved) if !unsaved.is_empty() => unsaved.clone(),
            _ => return Ok(()),
        };

        for (source_id, entry) in pending.iter() {
            for (platform, destination_id) in entry.platforms() {
                cache.record(source_id, platform, destination_id);
            }
        }

        self.store.save(cache).await?;
        info!("Saved {} mapping(s) left over from a failed save", pending.len());

        if let Ok(mut unsaved) = self.unsaved.lock() {
            *unsaved = CrossReferenceCache::new();
        }
        Ok(())
    }
}
