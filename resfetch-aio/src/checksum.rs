// resfetch-aio/src/checksum.rs
use std::path::Path;
use std::sync::Arc;

use resfetch_common::error::{FetchError, Result};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Hex-encoded SHA-256 of a file's bytes. This is the content hash used as the
/// deduplication key everywhere in resfetch.
///
/// Reads the file asynchronously but performs hashing synchronously.
pub async fn compute_sha256_async(path: &Path) -> Result<String> {
    debug!("Async hashing: {}", path.display());
    let mut file = File::open(path)
        .await
        .map_err(|e| FetchError::Io(Arc::new(e)))?;

    let mut hasher = Sha256::new();
    let mut buffer = Vec::with_capacity(64 * 1024);
    let mut total_bytes_read = 0u64;

    loop {
        buffer.clear();
        match file.read_buf(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
                total_bytes_read += n as u64;
            }
            Err(e) => return Err(FetchError::Io(Arc::new(e))),
        }
    }

    let actual = hex::encode(hasher.finalize());
    debug!(
        "Async Calculated SHA256: {} ({} bytes read)",
        actual, total_bytes_read
    );
    Ok(actual)
}

/// Asynchronously verifies the SHA256 checksum of a file.
pub async fn verify_checksum_async(path: &Path, expected: &str) -> Result<()> {
    let actual = compute_sha256_async(path).await?;
    debug!("Expected SHA256:   {}", expected);
    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(FetchError::ChecksumError(format!(
            "Checksum mismatch for {}: expected {}, got {}",
            path.display(),
            expected,
            actual
        )))
    }
}

pub fn is_sha256_hex(candidate: &str) -> bool {
    candidate.len() == 64 && candidate.bytes().all(|b| b.is_ascii_hexdigit())
}
