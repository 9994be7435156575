//! Content selection
//!
//! Consumes a newest-first fetch stream and produces the posts that still
//! need mirroring, oldest first, so that replies and self-quotes are
//! published after the posts they point at.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::cache::CrossReferenceCache;
use crate::error::Result;
use crate::filters::{is_quoting_foreign_author, is_recent};
use crate::normalize::normalize_post;
use crate::source::RawPostStream;
use crate::types::Post;

/// Parameters shared by every filter in one selection pass
#[derive(Debug, Clone)]
pub struct SelectionParams<'a> {
    pub now: DateTime<Utc>,
    /// Lookback horizon of the sync
    pub window: Duration,
    /// Source account handle, used to tell self-quotes from foreign quotes
    pub self_handle: &'a str,
}

#[derive(Debug, Default)]
struct DropCounts {
    unidentified: usize,
    cached: usize,
    retweet: usize,
    foreign_quote: usize,
    stale: usize,
}

/// Select the eligible, not-yet-synced posts from `raw`, oldest first
///
/// A post is kept iff it is not in `cache`, is not a retweet, does not quote
/// another account, and is within the sync window. Items that are absent or
/// have no usable id are dropped. A fetch error aborts the selection.
pub async fn try_select_content(
    mut raw: RawPostStream<'_>,
    cache: &CrossReferenceCache,
    params: &SelectionParams<'_>,
) -> Result<Vec<Post>> {
    let mut counts = DropCounts::default();
    let mut posts = VecDeque::new();

    // Upstream is newest-first; pushing to the front yields oldest-first
    while let Some(item) = raw.next().await {
        let Some(raw_post) = item? else {
            counts.unidentified += 1;
            continue;
        };

        match normalize_post(raw_post) {
            Some(post) => posts.push_front(post),
            None => counts.unidentified += 1,
        }
    }

    let fetched = posts.len();
    let selected: Vec<Post> = posts
        .into_iter()
        .filter(|post| {
            if cache.contains(&post.id) {
                counts.cached += 1;
                false
            } else if post.is_retweet {
                counts.retweet += 1;
                false
            } else if is_quoting_foreign_author(post, params.self_handle) {
                counts.foreign_quote += 1;
                false
            } else if !is_recent(post, params.now, params.window) {
                counts.stale += 1;
                false
            } else {
                true
            }
        })
        .collect();

    debug!(
        fetched,
        unidentified = counts.unidentified,
        cached = counts.cached,
        retweet = counts.retweet,
        foreign_quote = counts.foreign_quote,
        stale = counts.stale,
        "Filtered fetched posts"
    );

    Ok(selected)
}

/// Fail-soft variant of [`try_select_content`]
///
/// Any error is logged and turned into an empty selection: a cycle with no
/// candidates is safe, the next cycle retries.
pub async fn select_content(
    raw: RawPostStream<'_>,
    cache: &CrossReferenceCache,
    params: &SelectionParams<'_>,
) -> Vec<Post> {
    match try_select_content(raw, cache, params).await {
        Ok(posts) => {
            info!("Selected {} post(s) to mirror", posts.len());
            posts
        }
        Err(e) => {
            error!("Unable to select content: {}", e);
            Vec::new()
        }
    }
}
