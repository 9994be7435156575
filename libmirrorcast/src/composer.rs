//! Composition of destination posts
//!
//! Resolves a source post's quote and thread references through the
//! cross-reference cache. Missing references never block a sync: the post is
//! composed without the link and the gap is reported in
//! [`ComposedPost::unresolved`].

use tracing::warn;

use crate::cache::CrossReferenceCache;
use crate::types::{ComposedPost, DestinationPlatform, Post, UnresolvedReference};

/// Build the destination payload for `post`
///
/// * A quoted post mirrored to `platform` is linked after a blank line as
///   `https://{instance_host}/@{handle}/{mapped_id}`.
/// * A self-thread reply whose parent was mirrored to `platform` replies to
///   the parent's destination id.
pub fn compose_post(
    post: &Post,
    cache: &CrossReferenceCache,
    platform: DestinationPlatform,
    destination_handle: &str,
    instance_host: &str,
) -> ComposedPost {
    let mut unresolved = Vec::new();

    let status = match post.quoted_status_id.as_deref() {
        Some(quoted_id) => match cache.lookup(quoted_id, platform) {
            Some(mapped_id) => format!(
                "{}\n\n{}",
                post.text,
                status_url(instance_host, destination_handle, mapped_id)
            ),
            None => {
                warn!(
                    "Post {} quotes {} which is not mirrored to {}; publishing without the quote link",
                    post.id, quoted_id, platform
                );
                unresolved.push(UnresolvedReference::Quote(quoted_id.to_string()));
                post.text.clone()
            }
        },
        None => post.text.clone(),
    };

    let in_reply_to_id = match (post.is_self_thread, post.in_reply_to_status_id.as_deref()) {
        (true, Some(parent_id)) => {
            let mapped = cache.lookup(parent_id, platform).map(str::to_string);
            if mapped.is_none() {
                warn!(
                    "Post {} continues thread {} which is not mirrored to {}; publishing as a standalone post",
                    post.id, parent_id, platform
                );
                unresolved.push(UnresolvedReference::Reply(parent_id.to_string()));
            }
            mapped
        }
        _ => None,
    };

    ComposedPost {
        platform,
        handle: destination_handle.to_string(),
        status,
        in_reply_to_id,
        source: post.clone(),
        unresolved,
    }
}

/// Public URL of a status on a Mastodon-compatible instance
pub fn status_url(instance_host: &str, handle: &str, status_id: &str) -> String {
    format!(
        "https://{}/@{}/{}",
        bare_host(instance_host),
        handle.trim_start_matches('@'),
        status_id
    )
}

fn bare_host(instance: &str) -> &str {
    instance
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}
