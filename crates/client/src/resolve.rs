//! URL validation and base-URL resolution.
//!
//! No canonicalization is applied: the string a caller submits is the string
//! that is hashed into the cache key.

/// Error type for URL validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("URL has no host: {0}")]
    MissingHost(String),

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Validate that `input` is an absolute http(s) URL with a host.
pub fn validate_absolute(input: &str) -> Result<url::Url, UrlError> {
    if input.trim().is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed =
        url::Url::parse(input).map_err(|e| UrlError::InvalidUrl { url: input.to_string(), reason: e.to_string() })?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlError::MissingHost(input.to_string()));
    }

    Ok(parsed)
}

/// Validate a batch base URL and make sure it ends with a path separator.
pub fn normalize_base(base: &str) -> Result<String, UrlError> {
    validate_absolute(base)?;
    if base.ends_with('/') { Ok(base.to_string()) } else { Ok(format!("{base}/")) }
}

/// Prefix `target` with `base` unless it already is an absolute http(s) URL.
///
/// Targets that merely parse with some other scheme, such as `host:8080/x`,
/// count as relative. A leading `/` on `target` is dropped so it does not
/// double the separator `normalize_base` guarantees.
pub fn join_base(base: Option<&str>, target: &str) -> String {
    match base {
        Some(base) if !is_http_url(target) => format!("{base}{}", target.strip_prefix('/').unwrap_or(target)),
        _ => target.to_string(),
    }
}

fn is_http_url(target: &str) -> bool {
    url::Url::parse(target).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}
