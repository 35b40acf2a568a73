use crate::config::types::{BatchConfig, Config, ExtractionConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

const PROXY_MODES: &[&str] = &["basic", "stealth", "auto"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_extraction_config(&config.extraction)?;
    validate_storage_config(&config.storage)?;
    validate_batch_config(&config.batch)?;
    Ok(())
}

/// Validates extraction service configuration
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api_url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "api_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.api_key_env.is_empty() {
        return Err(ConfigError::Validation(
            "api_key_env cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 600 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 600, got {}",
            config.timeout_secs
        )));
    }

    if !PROXY_MODES.contains(&config.proxy.as_str()) {
        return Err(ConfigError::Validation(format!(
            "proxy must be one of {:?}, got '{}'",
            PROXY_MODES, config.proxy
        )));
    }

    if config.country.len() != 2 || !config.country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ConfigError::Validation(format!(
            "country must be a two-letter code, got '{}'",
            config.country
        )));
    }

    if config.languages.iter().any(|l| l.is_empty()) {
        return Err(ConfigError::Validation(
            "languages cannot contain empty entries".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates batch limits
fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.max_urls < 1 || config.max_urls > 1000 {
        return Err(ConfigError::Validation(format!(
            "max_urls must be between 1 and 1000, got {}",
            config.max_urls
        )));
    }

    if config.item_timeout_secs == Some(0) {
        return Err(ConfigError::Validation(
            "item_timeout_secs must be greater than zero when set".to_string(),
        ));
    }

    if config.failure_mark_attempts < 1 || config.failure_mark_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "failure_mark_attempts must be between 1 and 10, got {}",
            config.failure_mark_attempts
        )));
    }

    if config.stale_after_secs < 60 || config.stale_after_secs > 30 * 24 * 3600 {
        return Err(ConfigError::Validation(format!(
            "stale_after_secs must be between 60 and 2592000, got {}",
            config.stale_after_secs
        )));
    }

    Ok(())
}
