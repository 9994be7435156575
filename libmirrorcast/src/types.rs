//! Core types for Mirrorcast

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Platforms a source post can be mirrored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationPlatform {
    Mastodon,
    Bluesky,
}

impl DestinationPlatform {
    pub const ALL: [DestinationPlatform; 2] =
        [DestinationPlatform::Mastodon, DestinationPlatform::Bluesky];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mastodon => "mastodon",
            Self::Bluesky => "bluesky",
        }
    }
}

impl FromStr for DestinationPlatform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mastodon" => Ok(Self::Mastodon),
            "bluesky" => Ok(Self::Bluesky),
            _ => Err(format!(
                "Invalid platform: '{}'. Valid options: mastodon, bluesky",
                s
            )),
        }
    }
}

impl std::fmt::Display for DestinationPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A source item as yielded by the fetch client, before normalization
///
/// Every field is optional because fetch results are frequently partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPost {
    pub id: Option<String>,
    pub permanent_url: Option<String>,
    pub username: Option<String>,
    pub text: Option<String>,
    /// Seconds since the Unix epoch
    pub timestamp: Option<i64>,
    /// Expanded links, in order of appearance in `text`
    pub urls: Vec<String>,
    pub is_retweet: bool,
    pub is_self_thread: bool,
    pub in_reply_to_status_id: Option<String>,
    pub quoted_status_id: Option<String>,
    pub quoted_status_author: Option<String>,
}

/// A normalized source post, ready for filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Canonical source identifier, never empty
    pub id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Display text, already in destination form
    pub text: String,
    pub is_retweet: bool,
    pub is_self_thread: bool,
    pub in_reply_to_status_id: Option<String>,
    pub quoted_status_id: Option<String>,
    pub quoted_status_author: Option<String>,
}

impl Post {
    /// Create a plain post with no reply or quote relationship
    pub fn new(id: impl Into<String>, timestamp: i64, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            text: text.into(),
            is_retweet: false,
            is_self_thread: false,
            in_reply_to_status_id: None,
            quoted_status_id: None,
            quoted_status_author: None,
        }
    }
}

/// A reference that could not be resolved against the cache when composing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "source_id", rename_all = "lowercase")]
pub enum UnresolvedReference {
    /// The quoted post has not been mirrored to the destination
    Quote(String),
    /// The thread parent has not been mirrored to the destination
    Reply(String),
}

impl std::fmt::Display for UnresolvedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quote(id) => write!(f, "quoted post {} not mirrored", id),
            Self::Reply(id) => write!(f, "thread parent {} not mirrored", id),
        }
    }
}

/// A fully resolved post, ready to publish on a destination platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedPost {
    pub platform: DestinationPlatform,
    /// Destination account handle the post is published under
    pub handle: String,
    pub status: String,
    pub in_reply_to_id: Option<String>,
    /// Source post, kept so a successful publish can be recorded in the cache
    pub source: Post,
    pub unresolved: Vec<UnresolvedReference>,
}
