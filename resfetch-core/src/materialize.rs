// resfetch-core/src/materialize.rs
use std::fs;
use std::path::{Path, PathBuf};

use resfetch_aio::{
    atomic_write_file, compute_sha256_async, extract_tar_gz_async, is_symlink, remove_file,
    verify_checksum_async,
};
use resfetch_common::error::{FetchError, Result};
use resfetch_common::Requirement;
use resfetch_net::RemoteResolver;
use tracing::{debug, info, instrument, warn};

use crate::cache::HashCache;

/// How a destination ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// A regular file was already there; it was hashed and cached.
    Present,
    /// The archive was extracted by an earlier run (marker file found).
    AlreadyExtracted,
    /// Identical content already existed; a symlink was created.
    Linked { target: PathBuf },
    /// Fetched from the backend, and extracted if requested.
    Downloaded { extracted: bool },
}

/// Resolves single (destination, requirement) pairs against one backend,
/// sharing a hash cache across calls.
pub struct Materializer<'r, R> {
    resolver: &'r R,
    cache: HashCache,
    verify_downloads: bool,
}

impl<'r, R: RemoteResolver> Materializer<'r, R> {
    pub fn new(resolver: &'r R, verify_downloads: bool) -> Self {
        Self {
            resolver,
            cache: HashCache::new(),
            verify_downloads,
        }
    }

    pub fn cache(&self) -> &HashCache {
        &self.cache
    }

    /// Present → hash + cache. Absent and cached → symlink. Otherwise download
    /// (then extract). The filesystem check comes first so a present file
    /// never costs a remote call.
    ///
    /// Archives that get extracted are deleted afterwards, so they are neither
    /// looked up in nor added to the cache.
    #[instrument(skip(self, requirement), fields(source = %requirement.source))]
    pub async fn materialize(
        &mut self,
        destination: &Path,
        requirement: &Requirement,
    ) -> Result<Materialized> {
        if destination.is_file() {
            info!(
                "{} already exists inside {}. Skipping download",
                display_name(destination),
                display_parent(destination)
            );
            let hash = compute_sha256_async(destination)
                .await
                .map_err(|e| local_error(requirement, destination, e))?;
            // Canonical so a present symlink records the file it resolves to.
            let physical = fs::canonicalize(destination)?;
            self.cache.insert(&hash, physical);
            return Ok(Materialized::Present);
        }

        if requirement.should_extract {
            let marker = extraction_marker(destination);
            if marker.is_file() {
                info!(
                    "{} was already extracted into {}. Skipping download",
                    display_name(destination),
                    display_parent(destination)
                );
                return Ok(Materialized::AlreadyExtracted);
            }
        }

        if destination.exists() {
            return Err(FetchError::download(
                &requirement.source,
                destination,
                "destination exists and is not a regular file",
            ));
        }
        if is_symlink(destination) {
            warn!(
                "Removing dangling symlink at {} before materializing",
                destination.display()
            );
            remove_file(destination)?;
        }

        let remote_hash = self
            .resolver
            .remote_hash(requirement)
            .await
            .map_err(|e| remote_error(requirement, destination, e))?;
        debug!("Remote hash for '{}': {}", requirement.source, remote_hash);

        if !requirement.should_extract {
            if let Some(cached) = self.cache.lookup(&remote_hash) {
                let target = cached.to_path_buf();
                info!(
                    "Creating softlink {} to {}",
                    target.display(),
                    destination.display()
                );
                resfetch_aio::create_symlink(&target, destination)?;
                return Ok(Materialized::Linked { target });
            }
        }

        info!(
            "Downloading {} into {}",
            requirement.source,
            destination.display()
        );
        self.resolver
            .download(requirement, destination, &remote_hash)
            .await
            .map_err(|e| remote_error(requirement, destination, e))?;

        let local_hash = if self.verify_downloads {
            match verify_checksum_async(destination, &remote_hash).await {
                Ok(()) => remote_hash.to_ascii_lowercase(),
                Err(FetchError::ChecksumError(reason)) => {
                    if let Err(e) = remove_file(destination) {
                        warn!(
                            "Could not remove mismatching download {}: {}",
                            destination.display(),
                            e
                        );
                    }
                    return Err(FetchError::download(
                        &requirement.source,
                        destination,
                        reason,
                    ));
                }
                Err(e) => return Err(local_error(requirement, destination, e)),
            }
        } else {
            compute_sha256_async(destination)
                .await
                .map_err(|e| local_error(requirement, destination, e))?
        };

        if !requirement.should_extract {
            self.cache.insert(&local_hash, fs::canonicalize(destination)?);
            return Ok(Materialized::Downloaded { extracted: false });
        }

        let parent = destination.parent().ok_or_else(|| {
            FetchError::extraction(destination, "destination has no parent directory")
        })?;
        info!("Extracting {} to folder", destination.display());
        let written = extract_tar_gz_async(destination, parent).await?;
        debug!("Extracted {} top-level entries", written.len());
        remove_file(destination).map_err(|e| {
            FetchError::extraction(
                destination,
                format!("Failed to remove archive after extraction: {e}"),
            )
        })?;
        atomic_write_file(&extraction_marker(destination), local_hash.as_bytes())?;
        Ok(Materialized::Downloaded { extracted: true })
    }
}

/// Hidden file recording that `archive` was extracted into its parent.
pub fn extraction_marker(archive: &Path) -> PathBuf {
    let name = format!(
        ".{}.extracted",
        archive.file_name().unwrap_or_default().to_string_lossy()
    );
    archive.with_file_name(name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn display_parent(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn remote_error(requirement: &Requirement, destination: &Path, err: FetchError) -> FetchError {
    match err {
        FetchError::DownloadError(..) => err,
        other => FetchError::download(&requirement.source, destination, other.to_string()),
    }
}

fn local_error(requirement: &Requirement, destination: &Path, err: FetchError) -> FetchError {
    FetchError::Generic(format!(
        "Failed to hash {} for '{}': {}",
        destination.display(),
        requirement.source,
        err
    ))
}
