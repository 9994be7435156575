//! Mastodon destination
//!
//! Publishes through the megalodon library, so any server implementing the
//! Mastodon API (Pleroma, Akkoma, GoToSocial, ...) works as a destination.

use async_trait::async_trait;
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};
use tracing::{debug, warn};

use crate::config::MastodonConfig;
use crate::error::{PlatformError, Result};
use crate::platforms::Platform;
use crate::types::{ComposedPost, DestinationPlatform};

const DEFAULT_CHARACTER_LIMIT: usize = 500;

pub struct MastodonClient {
    client: Box<dyn Megalodon + Send + Sync>,

    /// Instance base URL (e.g., "https://mastodon.social")
    instance_url: String,

    /// Set by `authenticate` from the verified account
    handle: Option<String>,

    /// Instance-specific, refreshed on authentication
    character_limit: usize,
}

impl MastodonClient {
    /// Create a client for `instance_url` using an OAuth access token
    ///
    /// The character limit defaults to 500 until [`Platform::authenticate`]
    /// fetches the instance's real limit.
    pub fn new(instance_url: String, access_token: String) -> Result<Self> {
        let instance_url = with_scheme(&instance_url);
        let client = megalodon::generator(
            SNS::Mastodon,
            instance_url.clone(),
            Some(access_token),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self {
            client,
            instance_url,
            handle: None,
            character_limit: DEFAULT_CHARACTER_LIMIT,
        })
    }

    /// Create a client from configuration, reading the token file
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the token file cannot be
    /// read or is empty.
    pub fn from_config(config: &MastodonConfig) -> Result<Self> {
        let token_path = shellexpand::full(&config.token_file).map_err(|e| {
            PlatformError::Authentication(format!("Failed to expand token file path: {}", e))
        })?;

        let token = std::fs::read_to_string(token_path.as_ref())
            .map_err(|e| {
                PlatformError::Authentication(format!("Failed to read Mastodon token file: {}", e))
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(
                PlatformError::Authentication("Mastodon token file is empty".to_string()).into(),
            );
        }

        Self::new(config.instance.clone(), token)
    }

    async fn fetch_character_limit(&self) -> Result<usize> {
        let response = self
            .client
            .get_instance()
            .await
            .map_err(|e| map_megalodon_error(e, "fetch instance info"))?;

        Ok(response.json.configuration.statuses.max_characters as usize)
    }
}

#[async_trait]
impl Platform for MastodonClient {
    async fn authenticate(&mut self) -> Result<()> {
        let account = self
            .client
            .verify_account_credentials()
            .await
            .map_err(|e| map_megalodon_error(e, "authenticate"))?;

        debug!("Authenticated to {} as @{}", self.instance_url, account.json.username);
        self.handle = Some(account.json.username);

        // The default limit is a safe fallback if the instance hides its configuration
        match self.fetch_character_limit().await {
            Ok(limit) => self.character_limit = limit,
            Err(e) => warn!(
                "Could not fetch character limit from {}: {}. Using {}",
                self.instance_url, e, self.character_limit
            ),
        }

        Ok(())
    }

    async fn publish(&self, post: &ComposedPost) -> Result<String> {
        if self.handle.is_none() {
            return Err(PlatformError::Authentication("Not authenticated".to_string()).into());
        }

        self.validate_content(&post.status)?;

        let options = PostStatusInputOptions {
            in_reply_to_id: post.in_reply_to_id.clone(),
            ..Default::default()
        };

        let response = self
            .client
            .post_status(post.status.clone(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        let status_id = match response.json {
            PostStatusOutput::Status(status) => status.id,
            PostStatusOutput::ScheduledStatus(scheduled) => scheduled.id,
        };

        Ok(status_id)
    }

    fn validate_content(&self, content: &str) -> Result<()> {
        let char_count = content.chars().count();

        if char_count > self.character_limit {
            return Err(PlatformError::Validation(format!(
                "Content exceeds Mastodon's {} character limit (current: {} characters)",
                self.character_limit, char_count
            ))
            .into());
        }

        if content.trim().is_empty() {
            return Err(PlatformError::Validation("Content cannot be empty".to_string()).into());
        }

        Ok(())
    }

    fn platform(&self) -> DestinationPlatform {
        DestinationPlatform::Mastodon
    }

    fn handle(&self) -> Option<&str> {
        self.handle.as_deref()
    }

    fn instance_host(&self) -> &str {
        self.instance_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
    }

    fn character_limit(&self) -> Option<usize> {
        Some(self.character_limit)
    }
}

fn with_scheme(instance: &str) -> String {
    let instance = instance.trim().trim_end_matches('/');
    if instance.starts_with("http://") || instance.starts_with("https://") {
        instance.to_string()
    } else {
        format!("https://{}", instance)
    }
}

/// Map megalodon errors to `PlatformError`
///
/// - HTTP 401/403 → `Authentication`
/// - HTTP 422 → `Validation`
/// - HTTP 429 → `RateLimit`
/// - HTTP 5xx and connection failures → `Network`
/// - Unparseable responses → `Posting`
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_error_message(&error.to_string(), context)
}

fn classify_error_message(message: &str, context: &str) -> PlatformError {
    let lower = message.to_lowercase();

    match extract_http_status(message) {
        Some(401) | Some(403) => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
             Suggestion: Check that the access token in your token file is valid.",
            context, message
        )),
        Some(422) => PlatformError::Validation(format!(
            "Mastodon rejected the post ({}): {}",
            context, message
        )),
        Some(429) => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}. The post is retried next cycle.",
            context, message
        )),
        Some(500..=599) => PlatformError::Network(format!(
            "Mastodon server error ({}): {}",
            context, message
        )),
        Some(_) => {
            PlatformError::Posting(format!("Mastodon HTTP error ({}): {}", context, message))
        }
        None if lower.contains("unauthorized") || lower.contains("forbidden") => {
            PlatformError::Authentication(format!(
                "Mastodon authentication failed ({}): {}",
                context, message
            ))
        }
        None if lower.contains("too many requests") || lower.contains("rate limit") => {
            PlatformError::RateLimit(format!(
                "Mastodon rate limit exceeded ({}): {}",
                context, message
            ))
        }
        None if ["parse", "json", "deserialize"]
            .iter()
            .any(|needle| lower.contains(needle)) =>
        {
            PlatformError::Posting(format!(
                "Unexpected response from Mastodon ({}): {}",
                context, message
            ))
        }
        None => PlatformError::Network(format!(
            "Mastodon request failed ({}): {}. \
             Suggestion: Check your network connection and instance availability.",
            context, message
        )),
    }
}

/// Find an HTTP status code in an error message
///
/// Recognizes a code after a known prefix ("HTTP 401", "status 403",
/// "code: 429") or a standalone 3-digit code followed by ':' or ' '.
fn extract_http_status(message: &str) -> Option<u16> {
    let valid = |code: u16| (100..=599).contains(&code);

    for prefix in ["HTTP ", "status ", "code: ", "status_code: "] {
        if let Some(pos) = message.find(prefix) {
            let code = message
                .get(pos + prefix.len()..pos + prefix.len() + 3)
                .and_then(|s| s.parse::<u16>().ok())
                .filter(|c| valid(*c));
            if code.is_some() {
                return code;
            }
        }
    }

    let bytes = message.as_bytes();
    bytes.windows(4).enumerate().find_map(|(i, window)| {
        let standalone = window[..3].iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit());
        if !standalone {
            return None;
        }
        std::str::from_utf8(&window[..3])
            .ok()
            .and_then(|s| s.parse::<u16>().ok())
            .filter(|c| valid(*c))
    })
}
