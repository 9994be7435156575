//! Error types for Mirrorcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl MirrorError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            MirrorError::InvalidInput(_) => 3,
            MirrorError::Platform(PlatformError::Authentication(_)) => 2,
            MirrorError::Platform(_) => 1,
            MirrorError::Config(_) => 1,
            MirrorError::Cache(_) => 1,
            MirrorError::Source(_) => 1,
        }
    }

    /// Whether the next scheduled cycle may succeed without operator action
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            MirrorError::Platform(PlatformError::Network(_))
                | MirrorError::Platform(PlatformError::RateLimit(_))
                | MirrorError::Source(SourceError::Fetch(_))
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache database operation failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Cache migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Unknown destination platform in cache: {0}")]
    UnknownPlatform(String),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Failed to read source feed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse source feed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Fetch failed: {0}")]
    Fetch(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),
}
