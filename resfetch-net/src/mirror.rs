// resfetch-net/src/mirror.rs
// A storage backend backed by a local (or network-mounted) directory tree
// laid out as `<root>/<bucket>/<source>`.

use std::path::{Component, Path, PathBuf};

use resfetch_aio::compute_sha256_async;
use resfetch_common::error::{FetchError, Result};
use resfetch_common::Requirement;
use tokio::fs;
use tracing::debug;

use crate::http::{discard_temp_file, temp_download_path};
use crate::resolver::RemoteResolver;
use crate::validation::parse_hash_sidecar;

#[derive(Debug, Clone)]
pub struct MirrorResolver {
    root: PathBuf,
}

impl MirrorResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, requirement: &Requirement) -> Result<PathBuf> {
        let source = Path::new(&requirement.source);
        let stays_inside = source
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !stays_inside {
            return Err(FetchError::ValidationError(format!(
                "Source '{}' escapes the mirror root",
                requirement.source
            )));
        }
        Ok(self.root.join(requirement.bucket.as_str()).join(source))
    }
}

impl RemoteResolver for MirrorResolver {
    async fn remote_hash(&self, requirement: &Requirement) -> Result<String> {
        let object = self.object_path(requirement)?;
        let mut sidecar = object.clone().into_os_string();
        sidecar.push(".sha256");
        let sidecar = PathBuf::from(sidecar);

        if sidecar.is_file() {
            debug!("Reading mirror hash sidecar {}", sidecar.display());
            let contents = fs::read_to_string(&sidecar).await?;
            return parse_hash_sidecar(&contents);
        }
        if !object.is_file() {
            return Err(FetchError::Generic(format!(
                "Mirror object not found: {}",
                object.display()
            )));
        }
        compute_sha256_async(&object).await
    }

    async fn download(
        &self,
        requirement: &Requirement,
        destination: &Path,
        expected_hash: &str,
    ) -> Result<()> {
        let object = self.object_path(requirement)?;
        debug!(
            "Copying mirror object {} to {} (expected SHA256 {})",
            object.display(),
            destination.display(),
            expected_hash
        );
        let temp_path = temp_download_path(destination);
        let copied = match fs::copy(&object, &temp_path).await {
            Ok(copied) => copied,
            Err(e) => {
                discard_temp_file(&temp_path).await;
                return Err(FetchError::download(
                    &requirement.source,
                    destination,
                    format!("Failed to copy from {}: {}", object.display(), e),
                ));
            }
        };
        if let Err(e) = fs::rename(&temp_path, destination).await {
            discard_temp_file(&temp_path).await;
            return Err(FetchError::download(
                &requirement.source,
                destination,
                format!("Failed to move {} into place: {}", temp_path.display(), e),
            ));
        }
        debug!("Copied {} bytes from mirror.", copied);
        Ok(())
    }
}
