//! Destination platform abstraction and implementations
//!
//! A [`Platform`] publishes [`ComposedPost`]s on one destination and reports
//! the id the destination assigned, which the sync cycle records in the
//! cross-reference cache.
//!
//! # Examples
//!
//! ```no_run
//! use libmirrorcast::config::MastodonConfig;
//! use libmirrorcast::platforms::{mastodon::MastodonClient, Platform};
//!
//! # async fn example() -> libmirrorcast::error::Result<()> {
//! let config = MastodonConfig {
//!     enabled: true,
//!     instance: "mastodon.social".to_string(),
//!     token_file: "~/.config/mirrorcast/mastodon.token".to_string(),
//! };
//!
//! let mut platform = MastodonClient::from_config(&config)?;
//! platform.authenticate().await?;
//! println!("Mirroring as @{}", platform.handle().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ComposedPost, DestinationPlatform};

pub mod mastodon;

// Mock platform is available for all builds to support integration tests
pub mod mock;

/// Unified interface to a destination platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// Verify credentials and learn the account handle
    ///
    /// Must succeed before [`Platform::publish`] is called.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` for invalid credentials and
    /// `PlatformError::Network` when the instance cannot be reached.
    async fn authenticate(&mut self) -> Result<()>;

    /// Publish a composed post and return the destination's id for it
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The platform is not authenticated (`PlatformError::Authentication`)
    /// - The content is rejected (`PlatformError::Validation`)
    /// - The post fails to publish (`PlatformError::Posting`, `Network`, `RateLimit`)
    async fn publish(&self, post: &ComposedPost) -> Result<String>;

    /// Check content against platform requirements before publishing
    fn validate_content(&self, content: &str) -> Result<()>;

    /// Which destination this is, used as the cache key
    fn platform(&self) -> DestinationPlatform;

    /// Lowercase platform name for logs
    fn name(&self) -> &str {
        self.platform().as_str()
    }

    /// Handle of the authenticated account, `None` before authentication
    fn handle(&self) -> Option<&str>;

    /// Host name of the instance posts are published on (no scheme)
    fn instance_host(&self) -> &str;

    /// Maximum characters per post, `None` if unlimited
    fn character_limit(&self) -> Option<usize>;
}
