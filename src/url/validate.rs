use crate::{PagekeepError, UrlError};
use url::Url;

/// Validates that a string is a well-formed absolute web URL
///
/// # Validation Steps
///
/// 1. Parse the URL; reject if malformed or relative
/// 2. Require the `http` or `https` scheme
/// 3. Require a non-empty host
///
/// # Examples
///
/// ```
/// use pagekeep::url::validate_url;
///
/// assert!(validate_url("https://example.com/article").is_ok());
/// assert!(validate_url("mailto:someone@example.com").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingHost),
    }
}

/// Validates every URL of a batch before any work starts
///
/// Returns the index of the first offending entry so callers can point at it.
pub fn validate_batch(urls: &[String]) -> Result<(), PagekeepError> {
    if urls.is_empty() {
        return Err(PagekeepError::EmptyBatch);
    }

    for (index, url) in urls.iter().enumerate() {
        validate_url(url).map_err(|source| PagekeepError::InvalidUrl { index, source })?;
    }

    Ok(())
}
