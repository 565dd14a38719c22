use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("ManifestError: Invalid manifest '{0}': {1}")]
    ManifestError(String, String),

    #[error("DownloadError: Failed to download '{0}' into '{1}': {2}")]
    DownloadError(String, String, String),

    #[error("ExtractionError: Failed to extract '{0}': {1}")]
    ExtractionError(String, String),

    #[error("LinkError: Failed to link '{0}' -> '{1}': {2}")]
    LinkError(String, String, String),

    #[error("HttpError: {0}")]
    HttpError(String),

    #[error("Validation Error: {0}")]
    ValidationError(String),

    #[error("Checksum Error: {0}")]
    ChecksumError(String),

    #[error("Generic Error: {0}")]
    Generic(String),
}

impl FetchError {
    pub fn download(source: &str, destination: &Path, reason: impl Into<String>) -> Self {
        FetchError::DownloadError(
            source.to_string(),
            destination.display().to_string(),
            reason.into(),
        )
    }

    pub fn extraction(archive: &Path, reason: impl Into<String>) -> Self {
        FetchError::ExtractionError(archive.display().to_string(), reason.into())
    }

    pub fn link(link: &Path, target: &Path, reason: impl Into<String>) -> Self {
        FetchError::LinkError(
            link.display().to_string(),
            target.display().to_string(),
            reason.into(),
        )
    }

    pub fn manifest(file: &Path, reason: impl Into<String>) -> Self {
        FetchError::ManifestError(file.display().to_string(), reason.into())
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Io(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, FetchError>;
