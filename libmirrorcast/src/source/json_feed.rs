//! Source client reading a JSON feed dump
//!
//! The feed is a JSON array of posts, newest first, in the camelCase shape of
//! [`RawPost`]. It is typically refreshed by an external scraper between
//! sync cycles. `null` entries are passed through as absent items.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};

use super::{RawPostStream, SourceClient};
use crate::error::{MirrorError, SourceError};
use crate::types::RawPost;

pub struct JsonFeedSource {
    path: PathBuf,
}

impl JsonFeedSource {
    /// Create a source reading `path` (`~` is expanded)
    pub fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(shellexpand::tilde(path).to_string()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Items without a username are assumed to belong to the requested account
fn belongs_to(item: &Option<RawPost>, account: &str) -> bool {
    match item.as_ref().and_then(|raw| raw.username.as_deref()) {
        Some(username) => username
            .trim_start_matches('@')
            .eq_ignore_ascii_case(account.trim_start_matches('@')),
        None => true,
    }
}

async fn read_feed(path: PathBuf) -> Result<Vec<Option<RawPost>>, MirrorError> {
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(SourceError::Io)?;
    let items: Vec<Option<RawPost>> = serde_json::from_str(&content).map_err(SourceError::Parse)?;
    Ok(items)
}

impl SourceClient for JsonFeedSource {
    fn fetch_posts(&self, account: &str, max_count: usize) -> RawPostStream<'_> {
        let account = account.to_string();

        stream::once(read_feed(self.path.clone()))
            .map(move |result| match result {
                Ok(items) => {
                    let account = account.clone();
                    stream::iter(
                        items
                            .into_iter()
                            .filter(move |item| belongs_to(item, &account))
                            .map(Ok::<Option<RawPost>, MirrorError>),
                    )
                    .left_stream()
                }
                Err(e) => stream::iter(vec![Err::<Option<RawPost>, MirrorError>(e)]).right_stream(),
            })
            .flatten()
            .take(max_count)
            .boxed()
    }

    fn name(&self) -> &str {
        "json-feed"
    }
}
