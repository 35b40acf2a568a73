//! Content extraction contract
//!
//! An extractor turns one URL into structured content. Failure is an ordinary outcome here:
//! every problem is reported as an `ExtractionError` value and never escapes as a panic.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Structured content returned by a successful extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Main body rendered as markdown
    pub markdown: Option<String>,
    /// Page title from metadata
    pub title: Option<String>,
    /// Open Graph hero image URL
    pub og_image: Option<String>,
    /// Author from the structured side-channel
    pub author: Option<String>,
    /// Publication date exactly as the service reported it, unparsed
    pub published_at: Option<String>,
}

/// Reasons an extraction call can fail
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Request to extraction service failed: {0}")]
    Transport(String),

    #[error("Extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Extraction service returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Extraction service rejected the request: {0}")]
    Rejected(String),

    #[error("Failed to decode extraction response: {0}")]
    Decode(String),

    #[error("Extractor panicked: {0}")]
    Panicked(String),

    #[error("Extraction cancelled")]
    Cancelled,
}

/// Fetches and extracts readable content for a URL
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extracts content for one absolute URL
    async fn extract(&self, url: &str) -> Result<ExtractionResult, ExtractionError>;
}
