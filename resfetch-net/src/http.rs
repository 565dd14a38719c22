// resfetch-net/src/http.rs
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use resfetch_common::error::{FetchError, Result};
use resfetch_common::Requirement;
use tokio::fs::{self, File as TokioFile};
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, warn};
use url::Url;

use crate::resolver::RemoteResolver;
use crate::validation::{parse_hash_sidecar, validate_url};

const DOWNLOAD_TIMEOUT_SECS: u64 = 600;
const CONNECT_TIMEOUT_SECS: u64 = 30;
const USER_AGENT_STRING: &str = "resfetch artifact fetcher (Rust)";
const HASH_SIDECAR_EXT: &str = "sha256";

/// Object store reachable over HTTPS. Objects live at
/// `<base>/<bucket>/<source>` and each has a `<object>.sha256` sidecar.
#[derive(Debug, Clone)]
pub struct HttpResolver {
    client: Client,
    base_url: Url,
}

impl HttpResolver {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = validate_url(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::ValidationError(format!(
                "'{base_url}' cannot be used as a base URL"
            )));
        }
        Ok(Self {
            client: build_http_client()?,
            base_url,
        })
    }

    pub fn object_url(&self, requirement: &Requirement) -> Result<Url> {
        self.bucket_url(requirement, "")
    }

    pub fn sidecar_url(&self, requirement: &Requirement) -> Result<Url> {
        self.bucket_url(requirement, &format!(".{HASH_SIDECAR_EXT}"))
    }

    /// `<base>/<bucket>/<source segments>` with `suffix` appended to the last
    /// segment. Every segment is percent-encoded.
    fn bucket_url(&self, requirement: &Requirement, suffix: &str) -> Result<Url> {
        let mut segments: Vec<&str> = requirement
            .source
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let last = segments.pop().ok_or_else(|| {
            FetchError::ValidationError(format!(
                "Source '{}' has no object name",
                requirement.source
            ))
        })?;
        let last = format!("{last}{suffix}");

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                FetchError::ValidationError(format!("'{}' cannot be a base URL", self.base_url))
            })?
            .pop_if_empty()
            .push(requirement.bucket.as_str())
            .extend(segments)
            .push(&last);
        Ok(url)
    }
}

impl RemoteResolver for HttpResolver {
    async fn remote_hash(&self, requirement: &Requirement) -> Result<String> {
        let url = self.sidecar_url(requirement)?;
        debug!("Fetching remote hash for '{}' from {}", requirement.source, url);

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            debug!("HTTP request failed for {url}: {e}");
            FetchError::HttpError(format!("HTTP request failed for {url}: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            error!("HTTP error {} for hash sidecar {}", status, url);
            return Err(FetchError::HttpError(format!(
                "HTTP error {status} fetching remote hash from {url}"
            )));
        }
        let body = response.text().await.map_err(|e| {
            FetchError::HttpError(format!("Failed to read hash sidecar {url}: {e}"))
        })?;
        parse_hash_sidecar(&body)
    }

    async fn download(
        &self,
        requirement: &Requirement,
        destination: &Path,
        expected_hash: &str,
    ) -> Result<()> {
        let url = self.object_url(requirement)?;
        debug!(
            "Downloading '{}' from {} (expected SHA256 {})",
            requirement.source, url, expected_hash
        );
        download_to(&self.client, &url, destination)
            .await
            .map_err(|e| FetchError::download(&requirement.source, destination, e.to_string()))
    }
}

fn build_http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_STRING));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    Client::builder()
        .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .default_headers(headers)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| FetchError::HttpError(format!("Failed to build HTTP client: {e}")))
}

/// Temporary name a transfer writes to before it is renamed into place.
pub fn temp_download_path(final_path: &Path) -> PathBuf {
    let temp_filename = format!(
        ".{}.download",
        final_path.file_name().unwrap_or_default().to_string_lossy()
    );
    final_path.with_file_name(temp_filename)
}

async fn download_to(client: &Client, url: &Url, final_path: &Path) -> Result<()> {
    let temp_path = temp_download_path(final_path);
    debug!("Downloading to temporary path: {}", temp_path.display());
    if temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path).await {
            warn!(
                "Could not remove existing temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }

    let response = client.get(url.clone()).send().await.map_err(|e| {
        debug!("HTTP request failed for {url}: {e}");
        FetchError::HttpError(format!("HTTP request failed for {url}: {e}"))
    })?;
    let status = response.status();
    debug!("Received HTTP status: {} for {}", status, url);

    if !status.is_success() {
        error!("HTTP error {} for URL {}", status, url);
        let reason = match status {
            StatusCode::NOT_FOUND => "Resource not found (404)".to_string(),
            StatusCode::FORBIDDEN => "Access forbidden (403)".to_string(),
            _ => format!("HTTP error {status}"),
        };
        return Err(FetchError::HttpError(format!("{reason} for URL {url}")));
    }

    if let Err(e) = write_body(response, url, &temp_path).await {
        discard_temp_file(&temp_path).await;
        return Err(e);
    }

    if let Err(e) = fs::rename(&temp_path, final_path).await {
        discard_temp_file(&temp_path).await;
        return Err(FetchError::Generic(format!(
            "Failed to move temp file {} to {}: {}",
            temp_path.display(),
            final_path.display(),
            e
        )));
    }
    debug!("Moved download to final location: {}", final_path.display());
    Ok(())
}

async fn write_body(response: reqwest::Response, url: &Url, temp_path: &Path) -> Result<()> {
    let mut temp_file = TokioFile::create(temp_path).await.map_err(|e| {
        FetchError::Generic(format!(
            "Failed to create temp file {}: {}",
            temp_path.display(),
            e
        ))
    })?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            FetchError::HttpError(format!("Failed to read response body from {url}: {e}"))
        })?;
        temp_file.write_all(&chunk).await.map_err(|e| {
            FetchError::Generic(format!(
                "Failed to write download stream to {}: {}",
                temp_path.display(),
                e
            ))
        })?;
        written += chunk.len() as u64;
    }
    temp_file.flush().await?;
    debug!("Finished writing {} bytes to temp file.", written);
    Ok(())
}

pub(crate) async fn discard_temp_file(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(
                "Could not remove temporary file {}: {}",
                temp_path.display(),
                e
            );
        }
    }
}
