// resfetch-aio/src/extract.rs
// Gzip tarball extraction. The archive itself is left in place; removing it is
// the caller's job.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use resfetch_common::error::{FetchError, Result};
use tar::Archive;
use tracing::{debug, error};

/// Extracts `archive_path` into `target_dir` on the blocking pool.
pub async fn extract_tar_gz_async(archive_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>> {
    let archive_path = archive_path.to_path_buf();
    let target_dir = target_dir.to_path_buf();
    let archive_for_err = archive_path.clone();
    tokio::task::spawn_blocking(move || extract_tar_gz(&archive_path, &target_dir))
        .await
        .map_err(|e| {
            FetchError::extraction(&archive_for_err, format!("JoinError in TAR extraction: {e}"))
        })?
}

/// Unpacks a gzip-compressed tar archive into `target_dir`, keeping the paths
/// stored in the archive. Returns the top-level paths that were written.
pub fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<Vec<PathBuf>> {
    debug!(
        "Extracting archive '{}' to '{}'",
        archive_path.display(),
        target_dir.display()
    );

    fs::create_dir_all(target_dir).map_err(|e| {
        FetchError::extraction(
            archive_path,
            format!(
                "Failed to create target directory {}: {}",
                target_dir.display(),
                e
            ),
        )
    })?;

    let file = File::open(archive_path).map_err(|e| {
        FetchError::extraction(archive_path, format!("Failed to open archive: {e}"))
    })?;
    let decoder = GzDecoder::new(BufReader::new(file));
    extract_tar_archive(decoder, target_dir, archive_path)
}

fn extract_tar_archive<R: Read>(
    reader: R,
    target_dir: &Path,
    archive_path_for_log: &Path,
) -> Result<Vec<PathBuf>> {
    let mut archive = Archive::new(reader);
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);

    let mut top_level = BTreeSet::new();
    let entries = archive.entries().map_err(|e| {
        FetchError::extraction(archive_path_for_log, format!("Not a readable TAR: {e}"))
    })?;

    for entry_result in entries {
        let mut entry = entry_result.map_err(|e| {
            FetchError::extraction(
                archive_path_for_log,
                format!("Error reading TAR entry: {e}"),
            )
        })?;

        let path_in_archive: PathBuf = entry
            .path()
            .map_err(|e| {
                FetchError::extraction(
                    archive_path_for_log,
                    format!("Invalid path in TAR entry: {e}"),
                )
            })?
            .into_owned();

        let mut target_path = target_dir.to_path_buf();
        let mut first_component: Option<PathBuf> = None;
        for comp in path_in_archive.components() {
            match comp {
                Component::Normal(p) => {
                    if first_component.is_none() {
                        first_component = Some(target_dir.join(p));
                    }
                    target_path.push(p);
                }
                Component::CurDir => {}
                Component::ParentDir | Component::Prefix(_) | Component::RootDir => {
                    let msg = format!(
                        "Disallowed component {:?} in TAR path {}",
                        comp,
                        path_in_archive.display()
                    );
                    error!("{}", msg);
                    return Err(FetchError::extraction(archive_path_for_log, msg));
                }
            }
        }

        let Some(first_component) = first_component else {
            debug!("Skipping empty TAR entry path: {:?}", path_in_archive);
            continue;
        };

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                FetchError::extraction(
                    archive_path_for_log,
                    format!("Failed create parent dir {}: {}", parent.display(), e),
                )
            })?;
        }

        match entry.unpack(&target_path) {
            Ok(_) => debug!("Unpacked TAR entry to: {}", target_path.display()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Entry already exists at {}", target_path.display());
            }
            Err(e) => {
                return Err(FetchError::extraction(
                    archive_path_for_log,
                    format!(
                        "Failed to unpack entry {} to {}: {}",
                        path_in_archive.display(),
                        target_path.display(),
                        e
                    ),
                ));
            }
        }
        top_level.insert(first_component);
    }

    debug!(
        "Finished TAR extraction for {} ({} top-level entries)",
        archive_path_for_log.display(),
        top_level.len()
    );
    Ok(top_level.into_iter().collect())
}
