//! Normalization of fetched source items
//!
//! Turns the partial, platform-shaped [`RawPost`] produced by the fetch client
//! into a [`Post`] with a canonical identifier and destination-ready text.
//!
//! # Example
//!
//! ```
//! use libmirrorcast::normalize::normalize_id;
//!
//! assert_eq!(
//!     normalize_id("https://twitter.com/alice/status/1234567890?s=20"),
//!     "1234567890"
//! );
//! assert_eq!(normalize_id("1234567890"), "1234567890");
//! assert_eq!(normalize_id(""), "");
//! ```

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use url::Url;

use crate::types::{Post, RawPost};

lazy_static! {
    // Source short links, rewritten to their expanded form
    static ref SHORT_LINK_REGEX: Regex = Regex::new(r"https?://t\.co/[A-Za-z0-9]+").unwrap();

    // Permalink to a status, as appended when a post quotes another one
    static ref STATUS_PERMALINK_TAIL_REGEX: Regex = Regex::new(
        r"\s*https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/[A-Za-z0-9_]+/status/(\d+)\S*\s*$"
    ).unwrap();
}

/// Extract the canonical post identifier from a permalink or raw id
///
/// URL-shaped input yields the path segment following `status`, or its last
/// non-empty path segment when there is none. Anything else is returned
/// trimmed. Never fails: input that cannot be identified yields an
/// empty string, which callers treat as "drop this item".
#[must_use]
pub fn normalize_id(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else if trimmed.contains('/') {
        format!("https://{}", trimmed)
    } else {
        return trimmed.to_string();
    };

    let Ok(url) = Url::parse(&candidate) else {
        return String::new();
    };
    let Some(segments) = url.path_segments() else {
        return String::new();
    };
    let segments: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();

    // Media permalinks carry a suffix such as `/photo/1` after the status id
    let status_id = segments
        .windows(2)
        .find(|pair| pair[0] == "status" || pair[0] == "statuses")
        .map(|pair| pair[1]);

    status_id
        .or_else(|| segments.last().copied())
        .map(str::to_string)
        .unwrap_or_default()
}

/// Rewrite a source post's text into the form expected by the destination
///
/// Decodes HTML entities, expands short links using `raw.urls` (dropping
/// the ones with no expansion, which point at media or quoted posts) and
/// strips the trailing permalink of a quoted post.
#[must_use]
pub fn format_text(raw: &RawPost) -> String {
    let text = raw.text.as_deref().unwrap_or_default();
    let decoded = html_escape::decode_html_entities(text);

    let mut expansions = raw.urls.iter();
    let expanded = SHORT_LINK_REGEX.replace_all(&decoded, |_: &Captures| {
        expansions.next().cloned().unwrap_or_default()
    });

    let mut formatted = expanded.into_owned();

    if let Some(quoted_id) = raw.quoted_status_id.as_deref().map(normalize_id) {
        let tail = STATUS_PERMALINK_TAIL_REGEX
            .captures(&formatted)
            .filter(|caps| caps.get(1).map(|m| m.as_str()) == Some(quoted_id.as_str()))
            .and_then(|caps| caps.get(0))
            .map(|m| m.start());

        if let Some(start) = tail {
            formatted.truncate(start);
        }
    }

    formatted.trim_end().to_string()
}

/// Normalize a fetched item into a [`Post`]
///
/// Returns `None` when no usable identifier can be derived, from either
/// `raw.id` or `raw.permanent_url`.
pub fn normalize_post(raw: RawPost) -> Option<Post> {
    let id = raw
        .id
        .as_deref()
        .map(normalize_id)
        .filter(|id| !id.is_empty())
        .or_else(|| {
            raw.permanent_url
                .as_deref()
                .map(normalize_id)
                .filter(|id| !id.is_empty())
        })?;

    let text = format_text(&raw);
    let timestamp = raw.timestamp.unwrap_or(0).saturating_mul(1000);

    Some(Post {
        id,
        timestamp,
        text,
        is_retweet: raw.is_retweet,
        is_self_thread: raw.is_self_thread,
        in_reply_to_status_id: normalize_optional_id(raw.in_reply_to_status_id.as_deref()),
        quoted_status_id: normalize_optional_id(raw.quoted_status_id.as_deref()),
        quoted_status_author: raw.quoted_status_author.filter(|a| !a.trim().is_empty()),
    })
}

fn normalize_optional_id(id: Option<&str>) -> Option<String> {
    id.map(normalize_id).filter(|id| !id.is_empty())
}
