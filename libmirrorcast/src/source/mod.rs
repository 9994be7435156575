//! Source account fetch clients
//!
//! A [`SourceClient`] yields the most recent posts of an account as a lazy,
//! newest-first stream. Items may be absent (`Ok(None)`) when the upstream
//! returned something that could not be read as a post; the selector skips
//! them. A fetch failure is yielded as an `Err` item.

use futures::stream::BoxStream;

use crate::error::Result;
use crate::types::RawPost;

pub mod json_feed;

// Mock source is available for all builds to support integration tests
pub mod mock;

pub use json_feed::JsonFeedSource;
pub use mock::MockSource;

/// Newest-first stream of fetched items
pub type RawPostStream<'a> = BoxStream<'a, Result<Option<RawPost>>>;

pub trait SourceClient: Send + Sync {
    /// Stream up to `max_count` of the latest posts of `account`, newest first
    ///
    /// Each call starts a new sequence; a stream is not restartable once
    /// partially consumed.
    fn fetch_posts(&self, account: &str, max_count: usize) -> RawPostStream<'_>;

    fn name(&self) -> &str;
}
