use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Main configuration structure for Pagekeep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Content extraction service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Base URL of the extraction API (e.g., "https://api.firecrawl.dev")
    pub api_url: String,

    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout for one extraction call (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Ask the service to strip navigation, footers and similar chrome
    #[serde(default = "default_true")]
    pub only_main_content: bool,

    /// Proxy mode passed through to the service ("basic", "stealth" or "auto")
    #[serde(default = "default_proxy")]
    pub proxy: String,

    /// ISO country code used for geo-located fetching
    #[serde(default = "default_country")]
    pub country: String,

    /// Preferred content languages
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Prompt for the structured author/date side-channel
    #[serde(default = "default_metadata_prompt")]
    pub metadata_prompt: String,
}

/// Durable store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

/// Batch processing limits
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchConfig {
    /// Maximum number of URLs accepted in one batch
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,

    /// Upper bound on a single extraction call, enforced by the orchestrator (seconds)
    #[serde(default)]
    pub item_timeout_secs: Option<u64>,

    /// How many times the failure-marking write is attempted before giving up
    #[serde(default = "default_failure_mark_attempts")]
    pub failure_mark_attempts: u32,

    /// Age after which an unfinished single import or a still-running batch is treated as
    /// abandoned by reconciliation (seconds)
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl BatchConfig {
    /// Creation time before which unfinished work counts as abandoned
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(std::time::Duration::from_secs(self.stale_after_secs))
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_urls: default_max_urls(),
            item_timeout_secs: None,
            failure_mark_attempts: default_failure_mark_attempts(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "FIRECRAWL_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_proxy() -> String {
    "auto".to_string()
}

fn default_country() -> String {
    "US".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_metadata_prompt() -> String {
    "Extract the author and published date of the article".to_string()
}

fn default_max_urls() -> usize {
    100
}

fn default_failure_mark_attempts() -> u32 {
    2
}

fn default_stale_after_secs() -> u64 {
    3600
}
