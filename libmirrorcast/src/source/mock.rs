//! Mock source for testing
//!
//! Replays a fixed newest-first feed and can be told to fail part-way
//! through, to exercise the selector's fail-soft behaviour.

use futures::stream::{self, StreamExt};
use std::sync::{Arc, Mutex};

use super::{RawPostStream, SourceClient};
use crate::error::{MirrorError, SourceError};
use crate::types::RawPost;

#[derive(Debug, Clone, Default)]
pub struct MockSource {
    items: Vec<Option<RawPost>>,
    /// Yield a fetch error after this many items
    fail_after: Option<usize>,
    fetch_calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl MockSource {
    /// A source replaying `items`, newest first
    pub fn new(items: Vec<Option<RawPost>>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// A source yielding `items` and then a fetch error
    pub fn failing_after(items: Vec<Option<RawPost>>, count: usize) -> Self {
        Self {
            items,
            fail_after: Some(count),
            ..Default::default()
        }
    }

    /// Convenience constructor for a feed of plain posts
    ///
    /// `posts` are `(id, timestamp_secs, text)` tuples, newest first.
    pub fn from_posts(posts: &[(&str, i64, &str)]) -> Self {
        Self::new(
            posts
                .iter()
                .map(|(id, timestamp, text)| {
                    Some(RawPost {
                        id: Some(id.to_string()),
                        timestamp: Some(*timestamp),
                        text: Some(text.to_string()),
                        ..Default::default()
                    })
                })
                .collect(),
        )
    }

    /// `(account, max_count)` of every fetch made so far
    pub fn fetch_calls(&self) -> Vec<(String, usize)> {
        self.fetch_calls.lock().unwrap().clone()
    }
}

impl SourceClient for MockSource {
    fn fetch_posts(&self, account: &str, max_count: usize) -> RawPostStream<'_> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((account.to_string(), max_count));

        let mut items: Vec<Result<Option<RawPost>, MirrorError>> =
            self.items.iter().cloned().map(Ok).collect();

        if let Some(count) = self.fail_after {
            items.truncate(count);
            items.push(Err(SourceError::Fetch("mock fetch failure".to_string()).into()));
        }

        stream::iter(items).take(max_count).boxed()
    }

    fn name(&self) -> &str {
        "mock"
    }
}
