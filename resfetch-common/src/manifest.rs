// resfetch-common/src/manifest.rs
// Loads per-folder requirement manifests (one JSON document per folder).

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::error::{FetchError, Result};
use crate::model::FolderRequirements;

/// Loads every manifest named by the configuration, in declaration order.
pub fn load_from_config(config: &Config) -> Result<Vec<FolderRequirements>> {
    load_folder_requirements(&config.requirements_dir, &config.requirements_files)
}

/// Reads `dir/<file>` for each file in `files`. With an empty list every
/// `*.json` file in `dir` is read, sorted by file name.
pub fn load_folder_requirements(dir: &Path, files: &[String]) -> Result<Vec<FolderRequirements>> {
    debug!("Loading requirement manifests from {}", dir.display());
    if !dir.is_dir() {
        return Err(FetchError::manifest(
            dir,
            "manifest directory does not exist",
        ));
    }

    let paths: Vec<PathBuf> = if files.is_empty() {
        discover_manifests(dir)?
    } else {
        files.iter().map(|f| dir.join(f)).collect()
    };

    let mut folders = Vec::with_capacity(paths.len());
    for path in paths {
        folders.push(read_manifest(&path)?);
    }
    debug!("Loaded {} folder manifests.", folders.len());
    Ok(folders)
}

/// Parses and validates one manifest file.
pub fn read_manifest(path: &Path) -> Result<FolderRequirements> {
    debug!("Reading manifest: {}", path.display());
    let raw = fs::read_to_string(path)
        .map_err(|e| FetchError::manifest(path, format!("could not read file: {e}")))?;
    let folder: FolderRequirements = serde_json::from_str(&raw)
        .map_err(|e| FetchError::manifest(path, format!("malformed JSON: {e}")))?;

    if !is_contained(&folder.path) {
        return Err(FetchError::manifest(
            path,
            format!(
                "folder path '{}' must be relative and stay inside the root",
                folder.path.display()
            ),
        ));
    }
    for requirement in &folder.requirements {
        if !is_contained(&requirement.destination) || requirement.destination_file_name().is_none()
        {
            return Err(FetchError::manifest(
                path,
                format!(
                    "destination '{}' must be a relative file path without '..'",
                    requirement.destination.display()
                ),
            ));
        }
        if requirement.source.trim().is_empty() {
            return Err(FetchError::manifest(
                path,
                format!(
                    "requirement for '{}' has an empty source",
                    requirement.destination.display()
                ),
            ));
        }
    }
    Ok(folder)
}

fn discover_manifests(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|e| FetchError::manifest(dir, format!("could not list: {e}")))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| FetchError::manifest(dir, format!("could not list: {e}")))?
            .path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
