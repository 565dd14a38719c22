// resfetch-common/src/lib.rs
pub mod config;
pub mod error;
pub mod manifest;
pub mod model;

// Re-export key types
pub use config::{BackendKind, Config};
pub use error::{FetchError, Result};
pub use model::{Bucket, FolderRequirements, Requirement};
