// resfetch-net/src/resolver.rs
use std::path::Path;

use resfetch_common::config::{BackendKind, Config};
use resfetch_common::error::{FetchError, Result};
use resfetch_common::Requirement;
use tracing::debug;

use crate::http::HttpResolver;
use crate::mirror::MirrorResolver;

/// What the materializer needs from a storage backend.
#[allow(async_fn_in_trait)]
pub trait RemoteResolver {
    /// Content hash of the remote object. Metadata only, no transfer.
    async fn remote_hash(&self, requirement: &Requirement) -> Result<String>;

    /// Transfers the remote object to `destination`. Failures are
    /// `FetchError::DownloadError`.
    async fn download(
        &self,
        requirement: &Requirement,
        destination: &Path,
        expected_hash: &str,
    ) -> Result<()>;
}

/// Backend chosen by configuration.
#[derive(Debug)]
pub enum Resolver {
    Http(HttpResolver),
    Mirror(MirrorResolver),
}

impl Resolver {
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        debug!("Using {} backend", config.backend);
        match config.backend {
            BackendKind::Http => {
                let base = config.remote_base_url.as_deref().ok_or_else(|| {
                    FetchError::Config("No remote URL configured".to_string())
                })?;
                Ok(Self::Http(HttpResolver::new(base)?))
            }
            BackendKind::Mirror => {
                let root = config.mirror_root.as_deref().ok_or_else(|| {
                    FetchError::Config("No mirror directory configured".to_string())
                })?;
                Ok(Self::Mirror(MirrorResolver::new(root)))
            }
        }
    }
}

impl RemoteResolver for Resolver {
    async fn remote_hash(&self, requirement: &Requirement) -> Result<String> {
        match self {
            Self::Http(r) => r.remote_hash(requirement).await,
            Self::Mirror(r) => r.remote_hash(requirement).await,
        }
    }

    async fn download(
        &self,
        requirement: &Requirement,
        destination: &Path,
        expected_hash: &str,
    ) -> Result<()> {
        match self {
            Self::Http(r) => r.download(requirement, destination, expected_hash).await,
            Self::Mirror(r) => r.download(requirement, destination, expected_hash).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn config(backend: BackendKind) -> Config {
        Config {
            root_path: PathBuf::from("/tmp/root"),
            requirements_dir: PathBuf::from("/tmp/root/req"),
            requirements_files: Vec::new(),
            common_resources_dir: PathBuf::from("/tmp/root/common"),
            backend,
            remote_base_url: None,
            mirror_root: None,
            verify_downloads: false,
        }
    }

    #[test]
    fn selects_backend_from_config() {
        let mut http = config(BackendKind::Http);
        http.remote_base_url = Some("https://storage.example.com/artifacts".to_string());
        assert!(matches!(Resolver::from_config(&http), Ok(Resolver::Http(_))));

        let mut mirror = config(BackendKind::Mirror);
        mirror.mirror_root = Some(PathBuf::from("/srv/mirror"));
        assert!(matches!(
            Resolver::from_config(&mirror),
            Ok(Resolver::Mirror(_))
        ));
    }

    #[test]
    fn missing_backend_settings_fail() {
        assert!(Resolver::from_config(&config(BackendKind::Http)).is_err());
        assert!(Resolver::from_config(&config(BackendKind::Mirror)).is_err());
    }
}
