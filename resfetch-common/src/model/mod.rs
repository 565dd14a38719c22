// resfetch-common/src/model/mod.rs
pub mod requirement;

// Re-export
pub use requirement::{Bucket, FolderRequirements, Requirement};
