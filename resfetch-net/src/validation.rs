// resfetch-net/src/validation.rs
use resfetch_aio::is_sha256_hex;
use resfetch_common::error::{FetchError, Result};
use url::{Host, Url};

/// Validates a URL, ensuring it uses the HTTPS scheme. Plain `http` is only
/// accepted for loopback hosts.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| FetchError::ValidationError(format!("Failed to parse URL '{url_str}': {e}")))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        scheme => Err(FetchError::ValidationError(format!(
            "Invalid URL scheme for '{url_str}': Must be https, but got '{scheme}'"
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Parses a `.sha256` sidecar: the first whitespace-separated token must be a
/// hex SHA-256 digest (the `sha256sum` output format is accepted as-is).
pub fn parse_hash_sidecar(contents: &str) -> Result<String> {
    let token = contents.split_whitespace().next().unwrap_or_default();
    if is_sha256_hex(token) {
        Ok(token.to_ascii_lowercase())
    } else {
        Err(FetchError::ChecksumError(format!(
            "Hash sidecar does not start with a SHA-256 digest: '{}'",
            contents.trim()
        )))
    }
}
