// resfetch-aio/src/lib.rs
//! Blocking and asynchronous IO for resfetch (content hashes, archives, filesystem)

pub mod checksum;
pub mod extract;
pub mod fs;

pub use checksum::{compute_sha256_async, is_sha256_hex, verify_checksum_async};
pub use extract::extract_tar_gz_async;
pub use fs::*;
