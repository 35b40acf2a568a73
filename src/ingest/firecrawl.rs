//! Firecrawl-backed extractor
//!
//! This module handles all outbound requests to the extraction service, including:
//! - Building the HTTP client with timeouts and compression
//! - Requesting markdown plus a structured author/date side-channel in one scrape call
//! - Classifying transport, HTTP and payload failures into `ExtractionError`

use crate::config::ExtractionConfig;
use crate::ingest::extractor::{ContentExtractor, ExtractionError, ExtractionResult};
use crate::PagekeepError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Longest upstream error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 2],
    json_options: JsonOptions<'a>,
    only_main_content: bool,
    location: Location<'a>,
    proxy: &'a str,
}

#[derive(Serialize)]
struct JsonOptions<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
struct Location<'a> {
    country: &'a str,
    languages: &'a [String],
}

#[derive(Deserialize)]
struct ScrapeResponse {
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScrapeData {
    markdown: Option<String>,
    metadata: Option<PageMetadata>,
    json: Option<Value>,
}

#[derive(Deserialize)]
struct PageMetadata {
    title: Option<Value>,
    #[serde(rename = "ogImage")]
    og_image: Option<Value>,
}

/// Builds an HTTP client for the extraction service
///
/// # Arguments
///
/// * `config` - The extraction configuration
pub fn build_http_client(config: &ExtractionConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("pagekeep/{}", env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Extractor that calls the Firecrawl `/v1/scrape` endpoint
pub struct FirecrawlExtractor {
    client: Client,
    config: ExtractionConfig,
    api_key: String,
}

impl FirecrawlExtractor {
    /// Creates an extractor with an explicit API key
    pub fn new(config: ExtractionConfig, api_key: impl Into<String>) -> Result<Self, PagekeepError> {
        let client = build_http_client(&config)?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Creates an extractor reading the API key from the variable named in the config
    pub fn from_config(config: ExtractionConfig) -> Result<Self, PagekeepError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| PagekeepError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/scrape", self.config.api_url.trim_end_matches('/'))
    }

    fn classify(&self, e: reqwest::Error) -> ExtractionError {
        if e.is_timeout() {
            ExtractionError::Timeout(Duration::from_secs(self.config.timeout_secs))
        } else if e.is_decode() {
            ExtractionError::Decode(e.to_string())
        } else {
            ExtractionError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl ContentExtractor for FirecrawlExtractor {
    async fn extract(&self, url: &str) -> Result<ExtractionResult, ExtractionError> {
        let request = ScrapeRequest {
            url,
            formats: ["markdown", "json"],
            json_options: JsonOptions {
                prompt: &self.config.metadata_prompt,
            },
            only_main_content: self.config.only_main_content,
            location: Location {
                country: &self.config.country,
                languages: &self.config.languages,
            },
            proxy: &self.config.proxy,
        };

        tracing::debug!(url = %url, "Requesting extraction");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(
                body.char_indices()
                    .nth(MAX_ERROR_BODY)
                    .map(|(i, _)| i)
                    .unwrap_or(body.len()),
            );
            return Err(ExtractionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ScrapeResponse = response.json().await.map_err(|e| self.classify(e))?;
        into_result(payload)
    }
}

/// Maps a decoded scrape response onto the extraction contract
fn into_result(payload: ScrapeResponse) -> Result<ExtractionResult, ExtractionError> {
    if !payload.success {
        return Err(ExtractionError::Rejected(
            payload
                .error
                .unwrap_or_else(|| "no error message".to_string()),
        ));
    }

    let data = payload
        .data
        .ok_or_else(|| ExtractionError::Decode("response has no data".to_string()))?;

    let (title, og_image) = match &data.metadata {
        Some(meta) => (
            meta.title.as_ref().and_then(first_string),
            meta.og_image.as_ref().and_then(first_string),
        ),
        None => (None, None),
    };

    // A missing or malformed side-channel only means no author/date
    let side = data.json.as_ref().and_then(Value::as_object);
    let author = side
        .and_then(|o| o.get("author"))
        .and_then(first_string);
    let published_at = side
        .and_then(|o| o.get("publishedAt").or_else(|| o.get("published_at")))
        .and_then(first_string);

    Ok(ExtractionResult {
        markdown: data.markdown,
        title,
        og_image,
        author,
        published_at,
    })
}

/// Metadata fields arrive either as a string or as a list of strings
fn first_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => items.iter().find_map(|v| v.as_str().map(str::to_string)),
        _ => None,
    }
}
