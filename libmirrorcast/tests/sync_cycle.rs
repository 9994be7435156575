//! Integration tests for the sync cycle
//!
//! Drives full cycles with a mock source, a mock destination and a real
//! cache store on a temporary directory.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use libmirrorcast::cache::{CacheStore, JsonCacheStore, SqliteCacheStore};
use libmirrorcast::error::{CacheError, PlatformError, Result};
use libmirrorcast::platforms::mock::MockPlatform;
use libmirrorcast::platforms::Platform;
use libmirrorcast::source::MockSource;
use libmirrorcast::sync::{SyncOptions, Syncer};
use libmirrorcast::{CrossReferenceCache, DestinationPlatform, RawPost, UnresolvedReference};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const MASTODON: DestinationPlatform = DestinationPlatform::Mastodon;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn options() -> SyncOptions {
    SyncOptions {
        account: "alice".to_string(),
        max_posts: 50,
        window: Duration::from_secs(24 * 3600),
        dry_run: false,
    }
}

fn raw(id: &str, minutes_ago: i64, text: &str) -> RawPost {
    RawPost {
        id: Some(id.to_string()),
        username: Some("alice".to_string()),
        timestamp: Some(now().timestamp() - minutes_ago * 60),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

/// A thread A <- B (self-reply) and C quoting B, fetched newest first
fn thread_feed() -> Vec<Option<RawPost>> {
    let a = raw("A", 30, "first");

    let mut b = raw("B", 20, "second");
    b.is_self_thread = true;
    b.in_reply_to_status_id = Some("A".to_string());

    let mut c = raw("C", 10, "third");
    c.quoted_status_id = Some("B".to_string());
    c.quoted_status_author = Some("alice".to_string());

    vec![Some(c), Some(b), Some(a)]
}

fn json_store(dir: &TempDir) -> JsonCacheStore {
    JsonCacheStore::new(dir.path().join("cache.json").to_str().unwrap())
}

/// Wraps a store and records the cache size at every save
struct RecordingStore {
    inner: JsonCacheStore,
    saves: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl CacheStore for RecordingStore {
    async fn load(&self) -> Result<CrossReferenceCache> {
        self.inner.load().await
    }

    async fn save(&self, cache: &CrossReferenceCache) -> Result<()> {
        self.saves.lock().unwrap().push(cache.len());
        self.inner.save(cache).await
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

/// Wraps a store whose first `failures` saves fail
struct FlakyStore {
    inner: JsonCacheStore,
    failures: AtomicUsize,
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn load(&self) -> Result<CrossReferenceCache> {
        self.inner.load().await
    }

    async fn save(&self, cache: &CrossReferenceCache) -> Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CacheError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            ))
            .into());
        }
        self.inner.save(cache).await
    }

    fn describe(&self) -> String {
        self.inner.describe()
    }
}

#[tokio::test]
async fn test_cycle_publishes_oldest_first_and_resolves_references() {
    let dir = TempDir::new().unwrap();
    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(platform),
        Box::new(json_store(&dir)),
        options(),
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.candidates, 3);
    assert!(report.unresolved.is_empty());

    let published = published.lock().unwrap().clone();
    let order: Vec<&str> = published.iter().map(|p| p.source.id.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);

    // B replies to A's destination id, recorded earlier in the same cycle
    assert_eq!(published[1].in_reply_to_id.as_deref(), Some("dest-1"));
    // C links to B's destination status
    assert_eq!(published[2].status, "third\n\nhttps://mock.social/@mirror/dest-2");

    let cache = json_store(&dir).load().await.unwrap();
    assert_eq!(cache.lookup("A", MASTODON), Some("dest-1"));
    assert_eq!(cache.lookup("B", MASTODON), Some("dest-2"));
    assert_eq!(cache.lookup("C", MASTODON), Some("dest-3"));
}

#[tokio::test]
async fn test_cache_saved_after_each_publish() {
    let dir = TempDir::new().unwrap();
    let saves = Arc::new(Mutex::new(Vec::new()));
    let store = RecordingStore {
        inner: json_store(&dir),
        saves: saves.clone(),
    };

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(MockPlatform::success("mirror")),
        Box::new(store),
        options(),
    );

    syncer.run_cycle(now()).await.unwrap();
    assert_eq!(*saves.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_second_cycle_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(platform),
        Box::new(json_store(&dir)),
        options(),
    );

    syncer.run_cycle(now()).await.unwrap();
    let second = syncer.run_cycle(now()).await.unwrap();

    assert_eq!(second.candidates, 0);
    assert!(second.published.is_empty());
    assert_eq!(published.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_publish_failure_stops_cycle_and_retries_next_time() {
    let dir = TempDir::new().unwrap();

    let failing = MockPlatform::failing_on(
        "mirror",
        1,
        PlatformError::Network("instance unreachable".to_string()),
    );
    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(failing),
        Box::new(json_store(&dir)),
        options(),
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.published.len(), 1);
    let failed = report.failed.unwrap();
    assert_eq!(failed.source_id, "B");
    assert!(failed.error.contains("instance unreachable"));

    let cache = json_store(&dir).load().await.unwrap();
    assert!(cache.contains("A"));
    assert!(!cache.contains("B"));
    assert!(!cache.contains("C"));

    // Next cycle with a healthy destination picks up where it stopped
    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();
    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(platform),
        Box::new(json_store(&dir)),
        options(),
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert!(report.is_success());

    let published = published.lock().unwrap().clone();
    let order: Vec<&str> = published.iter().map(|p| p.source.id.as_str()).collect();
    assert_eq!(order, vec!["B", "C"]);
    // A was mirrored as dest-1 by the first destination
    assert_eq!(published[0].in_reply_to_id.as_deref(), Some("dest-1"));
}

#[tokio::test]
async fn test_validation_failure_skips_only_that_post() {
    let dir = TempDir::new().unwrap();
    let feed = vec![
        Some(raw("B", 10, "ok")),
        Some(raw("A", 20, "this text is far too long")),
    ];

    let syncer = Syncer::new(
        Box::new(MockSource::new(feed)),
        Box::new(MockPlatform::with_limit("mirror", 10)),
        Box::new(json_store(&dir)),
        options(),
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.skipped, vec!["A".to_string()]);
    assert_eq!(report.published.len(), 1);
    assert_eq!(report.published[0].source_id, "B");
}

#[tokio::test]
async fn test_dry_run_never_writes_cache() {
    let dir = TempDir::new().unwrap();
    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();

    let mut options = options();
    options.dry_run = true;

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(platform),
        Box::new(json_store(&dir)),
        options,
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.published.len(), 3);
    assert!(report.unresolved.is_empty());
    assert!(published.lock().unwrap().is_empty());
    assert!(!dir.path().join("cache.json").exists());
}

#[tokio::test]
async fn test_missing_references_are_reported_not_fatal() {
    let dir = TempDir::new().unwrap();

    // B continues a thread whose parent fell outside the fetch window
    let mut b = raw("B", 10, "continued");
    b.is_self_thread = true;
    b.in_reply_to_status_id = Some("OLD".to_string());

    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();
    let syncer = Syncer::new(
        Box::new(MockSource::new(vec![Some(b)])),
        Box::new(platform),
        Box::new(json_store(&dir)),
        options(),
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert!(report.is_success());
    assert_eq!(
        report.unresolved,
        vec![UnresolvedReference::Reply("OLD".to_string())]
    );
    assert_eq!(published.lock().unwrap()[0].in_reply_to_id, None);
}

#[tokio::test]
async fn test_fetch_failure_yields_empty_cycle() {
    let dir = TempDir::new().unwrap();
    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();

    let syncer = Syncer::new(
        Box::new(MockSource::failing_after(thread_feed(), 1)),
        Box::new(platform),
        Box::new(json_store(&dir)),
        options(),
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert_eq!(report.candidates, 0);
    assert!(published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_cache_fails_cycle() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("cache.json"), "{ broken").unwrap();

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(MockPlatform::success("mirror")),
        Box::new(json_store(&dir)),
        options(),
    );

    assert!(syncer.run_cycle(now()).await.is_err());
}

#[tokio::test]
async fn test_unauthenticated_platform_fails_cycle() {
    let dir = TempDir::new().unwrap();
    let mut syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(MockPlatform::auth_failure("mirror")),
        Box::new(json_store(&dir)),
        options(),
    );

    let err = syncer.run_cycle(now()).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(syncer.authenticate().await.is_err());
}

#[tokio::test]
async fn test_cycle_with_sqlite_store() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("cache.db");
    let store = SqliteCacheStore::new(db_path.to_str().unwrap())
        .await
        .unwrap();

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(MockPlatform::success("mirror")),
        Box::new(store.clone()),
        options(),
    );

    let report = syncer.run_cycle(now()).await.unwrap();
    assert_eq!(report.published.len(), 3);

    let cache = store.load().await.unwrap();
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.lookup("C", MASTODON), Some("dest-3"));
}

#[tokio::test]
async fn test_failed_save_does_not_republish() {
    let dir = TempDir::new().unwrap();
    let store = FlakyStore {
        inner: json_store(&dir),
        failures: AtomicUsize::new(1),
    };
    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(platform),
        Box::new(store),
        options(),
    );

    // A is published, then its save fails and the cycle aborts
    assert!(syncer.run_cycle(now()).await.is_err());
    assert_eq!(published.lock().unwrap().len(), 1);
    assert!(!dir.path().join("cache.json").exists());

    let report = syncer.run_cycle(now()).await.unwrap();
    assert!(report.is_success());

    let published = published.lock().unwrap().clone();
    let order: Vec<&str> = published.iter().map(|p| p.source.id.as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
    assert_eq!(published[1].in_reply_to_id.as_deref(), Some("dest-1"));

    let cache = json_store(&dir).load().await.unwrap();
    assert_eq!(cache.lookup("A", MASTODON), Some("dest-1"));
    assert_eq!(cache.lookup("C", MASTODON), Some("dest-3"));
}

#[tokio::test]
async fn test_unsaved_mapping_blocks_publishing_until_saved() {
    let dir = TempDir::new().unwrap();
    let store = FlakyStore {
        inner: json_store(&dir),
        failures: AtomicUsize::new(2),
    };
    let platform = MockPlatform::success("mirror");
    let published = platform.published_log();

    let syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(platform),
        Box::new(store),
        options(),
    );

    assert!(syncer.run_cycle(now()).await.is_err());
    // The leftover save fails again, so nothing new goes out
    assert!(syncer.run_cycle(now()).await.is_err());
    assert_eq!(published.lock().unwrap().len(), 1);

    syncer.run_cycle(now()).await.unwrap();
    assert_eq!(published.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_authenticate_reports_destination_limit() {
    let dir = TempDir::new().unwrap();
    let mut platform = MockPlatform::with_limit("mirror", 280);
    platform.authenticate().await.unwrap();
    assert_eq!(platform.character_limit(), Some(280));

    let mut syncer = Syncer::new(
        Box::new(MockSource::new(thread_feed())),
        Box::new(platform),
        Box::new(json_store(&dir)),
        options(),
    );

    syncer.authenticate().await.unwrap();
    let report = syncer.run_cycle(now()).await.unwrap();
    assert_eq!(report.published.len(), 3);
}
