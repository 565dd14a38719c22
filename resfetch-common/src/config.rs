// resfetch-common/src/config.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use super::error::{FetchError, Result};

const DEFAULT_REQUIREMENTS_DIR: &str = "downloader/requirements";
const DEFAULT_COMMON_RESOURCES_DIR: &str = "apps/gstreamer/resources";
const STATE_DIR_NAME: &str = ".resfetch";

/// Which storage backend serves remote requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Http,
    Mirror,
}

impl FromStr for BackendKind {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(Self::Http),
            "mirror" | "local" => Ok(Self::Mirror),
            other => Err(FetchError::Config(format!(
                "Unknown backend '{other}' (expected 'http' or 'mirror')"
            ))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("http"),
            Self::Mirror => f.write_str("mirror"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub root_path: PathBuf,
    pub requirements_dir: PathBuf,
    /// Manifest file names inside `requirements_dir`. Empty means every `*.json`.
    pub requirements_files: Vec<String>,
    pub common_resources_dir: PathBuf,
    pub backend: BackendKind,
    pub remote_base_url: Option<String>,
    pub mirror_root: Option<PathBuf>,
    pub verify_downloads: bool,
}

impl Config {
    /// Builds a configuration from an arbitrary variable lookup. Relative
    /// paths are resolved against `cwd`.
    pub fn load_from<F>(lookup: F, cwd: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let root_path = var("RESFETCH_ROOT")
            .map(|s| cwd.join(s))
            .unwrap_or_else(|| {
                debug!(
                    "RESFETCH_ROOT not set, using current directory: {}",
                    cwd.display()
                );
                cwd.to_path_buf()
            });
        debug!("Effective root set to: {}", root_path.display());

        let requirements_dir = var("RESFETCH_MANIFESTS")
            .map(|s| cwd.join(s))
            .unwrap_or_else(|| root_path.join(DEFAULT_REQUIREMENTS_DIR));

        let requirements_files = var("RESFETCH_MANIFEST_FILES")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let common_resources_dir = var("RESFETCH_COMMON_DIR")
            .map(|s| cwd.join(s))
            .unwrap_or_else(|| root_path.join(DEFAULT_COMMON_RESOURCES_DIR));

        let backend = match var("RESFETCH_BACKEND") {
            Some(s) => s.parse()?,
            None => BackendKind::default(),
        };

        let remote_base_url = var("RESFETCH_REMOTE_URL");
        let mirror_root = var("RESFETCH_MIRROR").map(|s| cwd.join(s));
        let verify_downloads = var("RESFETCH_VERIFY").is_some_and(|v| v == "1" || v == "true");

        debug!("Configuration loaded successfully.");
        Ok(Self {
            root_path,
            requirements_dir,
            requirements_files,
            common_resources_dir,
            backend,
            remote_base_url,
            mirror_root,
            verify_downloads,
        })
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root_path.join(STATE_DIR_NAME)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir().join("logs")
    }

    /// Checks that the selected backend has what it needs to run.
    pub fn validate(&self) -> Result<()> {
        match self.backend {
            BackendKind::Http if self.remote_base_url.is_none() => Err(FetchError::Config(
                "The http backend needs a remote URL (RESFETCH_REMOTE_URL or --remote-url)"
                    .to_string(),
            )),
            BackendKind::Mirror if self.mirror_root.is_none() => Err(FetchError::Config(
                "The mirror backend needs a mirror directory (RESFETCH_MIRROR or --mirror)"
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }
}
