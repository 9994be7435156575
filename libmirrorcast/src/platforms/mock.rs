//! Mock destination for testing
//!
//! Records every publish so tests can assert on the exact payloads and their
//! order, and can be configured to fail authentication or to fail on the
//! n-th publish.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{ComposedPost, DestinationPlatform};

/// Configuration for mock platform behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub platform: DestinationPlatform,

    /// Handle reported after authentication
    pub handle: String,

    pub instance_host: String,

    /// Whether authentication should succeed
    pub auth_succeeds: bool,

    /// Zero-based index of the publish call that fails, if any
    pub fail_on_publish: Option<usize>,

    /// Error returned by the failing publish
    pub publish_error: PlatformError,

    pub character_limit: Option<usize>,

    /// Posts that have been published, in order
    pub published: Arc<Mutex<Vec<ComposedPost>>>,

    /// Number of publish attempts, successful or not
    pub publish_calls: Arc<Mutex<usize>>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            platform: DestinationPlatform::Mastodon,
            handle: "mirror".to_string(),
            instance_host: "mock.social".to_string(),
            auth_succeeds: true,
            fail_on_publish: None,
            publish_error: PlatformError::Network("Mock publish failed".to_string()),
            character_limit: None,
            published: Arc::new(Mutex::new(Vec::new())),
            publish_calls: Arc::new(Mutex::new(0)),
        }
    }
}

pub struct MockPlatform {
    config: MockConfig,
    authenticated: bool,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            authenticated: false,
        }
    }

    /// A platform that accepts everything, already authenticated
    pub fn success(handle: &str) -> Self {
        let mut platform = Self::new(MockConfig {
            handle: handle.to_string(),
            ..Default::default()
        });
        platform.authenticated = true;
        platform
    }

    /// A platform whose `index`-th publish (zero-based) fails with `error`
    pub fn failing_on(handle: &str, index: usize, error: PlatformError) -> Self {
        let mut platform = Self::new(MockConfig {
            handle: handle.to_string(),
            fail_on_publish: Some(index),
            publish_error: error,
            ..Default::default()
        });
        platform.authenticated = true;
        platform
    }

    /// A platform enforcing a character limit
    pub fn with_limit(handle: &str, limit: usize) -> Self {
        let mut platform = Self::new(MockConfig {
            handle: handle.to_string(),
            character_limit: Some(limit),
            ..Default::default()
        });
        platform.authenticated = true;
        platform
    }

    /// A platform that rejects authentication
    pub fn auth_failure(handle: &str) -> Self {
        Self::new(MockConfig {
            handle: handle.to_string(),
            auth_succeeds: false,
            ..Default::default()
        })
    }

    /// Destination id assigned to the `index`-th successful publish
    pub fn destination_id(index: usize) -> String {
        format!("dest-{}", index + 1)
    }

    pub fn published(&self) -> Vec<ComposedPost> {
        self.config.published.lock().unwrap().clone()
    }

    pub fn publish_calls(&self) -> usize {
        *self.config.publish_calls.lock().unwrap()
    }

    /// Shared handle to the publish log, usable after the platform is moved
    pub fn published_log(&self) -> Arc<Mutex<Vec<ComposedPost>>> {
        self.config.published.clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn authenticate(&mut self) -> Result<()> {
        if self.config.auth_succeeds {
            self.authenticated = true;
            Ok(())
        } else {
            Err(PlatformError::Authentication("Mock authentication failed".to_string()).into())
        }
    }

    async fn publish(&self, post: &ComposedPost) -> Result<String> {
        let call = {
            let mut calls = self.config.publish_calls.lock().unwrap();
            *calls += 1;
            *calls - 1
        };

        if !self.authenticated {
            return Err(PlatformError::Authentication("Not authenticated".to_string()).into());
        }

        self.validate_content(&post.status)?;

        if self.config.fail_on_publish == Some(call) {
            return Err(self.config.publish_error.clone().into());
        }

        let mut published = self.config.published.lock().unwrap();
        let id = Self::destination_id(published.len());
        published.push(post.clone());
        Ok(id)
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }

        if let Some(limit) = self.config.character_limit {
            let count = content.chars().count();
            if count > limit {
                return Err(PlatformError::Validation(format!(
                    "Content exceeds {} character limit (got {} characters)",
                    limit, count
                ))
                .into());
            }
        }

        Ok(())
    }

    fn platform(&self) -> DestinationPlatform {
        self.config.platform
    }

    fn handle(&self) -> Option<&str> {
        if self.authenticated {
            Some(&self.config.handle)
        } else {
            None
        }
    }

    fn instance_host(&self) -> &str {
        &self.config.instance_host
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }
}
