//! Eligibility filters applied to normalized posts

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::types::Post;

/// Whether a post falls within the sync window
///
/// A post dated in the future (clock skew between us and the source) has a
/// non-positive age and is always considered recent.
#[must_use]
pub fn is_recent(post: &Post, now: DateTime<Utc>, window: Duration) -> bool {
    let age_ms = now.timestamp_millis().saturating_sub(post.timestamp);
    if age_ms <= 0 {
        return true;
    }

    (age_ms as u128) <= window.as_millis()
}

/// Whether a post quotes content from an account other than `self_handle`
///
/// Both the quoted id and the quoted author must be known; handles compare
/// case-insensitively and ignore a leading `@`.
#[must_use]
pub fn is_quoting_foreign_author(post: &Post, self_handle: &str) -> bool {
    match (&post.quoted_status_id, &post.quoted_status_author) {
        (Some(_), Some(author)) => !handles_match(author, self_handle),
        _ => false,
    }
}

fn handles_match(a: &str, b: &str) -> bool {
    let a = a.trim().trim_start_matches('@');
    let b = b.trim().trim_start_matches('@');
    a.eq_ignore_ascii_case(b)
}
