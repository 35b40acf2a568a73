//! Pagekeep: a save-for-later content library
//!
//! This crate implements the bulk ingestion pipeline of a personal reading library: URLs are
//! turned into status-tracked records, their content is extracted through an external service,
//! and progress is streamed back to the caller one item at a time.

pub mod config;
pub mod ingest;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Pagekeep operations
#[derive(Debug, Error)]
pub enum PagekeepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] ingest::ExtractionError),

    #[error("Invalid URL at position {index}: {source}")]
    InvalidUrl { index: usize, source: UrlError },

    #[error("A batch must contain at least one URL")]
    EmptyBatch,

    #[error("Batch of {size} URLs exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Pagekeep operations
pub type Result<T> = std::result::Result<T, PagekeepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use ingest::{BatchOrchestrator, BatchSummary, ProgressSnapshot, ProgressStatus, ProgressStream};
pub use state::ItemStatus;
pub use storage::{SavedItem, SqliteStorage, Storage};
pub use url::validate_url;
