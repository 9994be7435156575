//! Mirrorcast - mirror a source account onto the fediverse
//!
//! This library selects recent posts from a source account, filters out
//! content that should not be mirrored, and republishes the rest while
//! keeping reply threads and self-quotes intact through a persistent
//! cross-platform ID cache.

pub mod cache;
pub mod composer;
pub mod config;
pub mod error;
pub mod filters;
pub mod logging;
pub mod normalize;
pub mod platforms;
pub mod selector;
pub mod source;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheStore, CrossReferenceCache};
pub use config::Config;
pub use error::{MirrorError, Result};
pub use types::{ComposedPost, DestinationPlatform, Post, RawPost, UnresolvedReference};
