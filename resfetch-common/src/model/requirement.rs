// resfetch-common/src/model/requirement.rs
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Logical remote namespace a requirement's source lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Bucket {
    Tappas,
    ModelZoo,
    Other,
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tappas => "tappas",
            Self::ModelZoo => "model_zoo",
            Self::Other => "other",
        }
    }
}

impl From<String> for Bucket {
    fn from(value: String) -> Self {
        match value.as_str() {
            "tappas" => Self::Tappas,
            "model_zoo" => Self::ModelZoo,
            _ => Self::Other,
        }
    }
}

impl From<Bucket> for String {
    fn from(value: Bucket) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared artifact: where it comes from and where it must end up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    pub source: String,
    /// Relative to the owning folder.
    pub destination: PathBuf,
    pub bucket: Bucket,
    #[serde(default)]
    pub should_extract: bool,
}

impl Requirement {
    pub fn new(source: impl Into<String>, destination: impl Into<PathBuf>, bucket: Bucket) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            bucket,
            should_extract: false,
        }
    }

    pub fn extracted(mut self) -> Self {
        self.should_extract = true;
        self
    }

    /// Destination suffix including the leading dot, e.g. `.hef`.
    pub fn destination_suffix(&self) -> Option<String> {
        self.destination
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
    }

    pub fn destination_file_name(&self) -> Option<&Path> {
        self.destination.file_name().map(Path::new)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}",
            self.bucket,
            self.source,
            self.destination.display()
        )
    }
}

/// Everything one project folder needs, as declared by a single manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRequirements {
    pub path: PathBuf,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
}
