// resfetch-core/src/testing.rs
// In-memory backend that records every call, for pipeline tests.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::write::GzEncoder;
use flate2::Compression;
use resfetch_common::error::{FetchError, Result};
use resfetch_common::{Bucket, Requirement};
use resfetch_net::RemoteResolver;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    RemoteHash(String),
    Download { source: String, destination: PathBuf },
}

#[derive(Default)]
pub(crate) struct ScriptedResolver {
    objects: HashMap<(Bucket, String), Vec<u8>>,
    hash_overrides: HashMap<(Bucket, String), String>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedResolver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_object(mut self, bucket: Bucket, source: &str, body: &[u8]) -> Self {
        self.objects
            .insert((bucket, source.to_string()), body.to_vec());
        self
    }

    pub(crate) fn with_hash_override(mut self, bucket: Bucket, source: &str, hash: &str) -> Self {
        self.hash_overrides
            .insert((bucket, source.to_string()), hash.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn downloads(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Download { destination, .. } => Some(destination),
                Call::RemoteHash(_) => None,
            })
            .collect()
    }

    fn object(&self, requirement: &Requirement) -> Option<&Vec<u8>> {
        self.objects
            .get(&(requirement.bucket, requirement.source.clone()))
    }
}

impl RemoteResolver for ScriptedResolver {
    async fn remote_hash(&self, requirement: &Requirement) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::RemoteHash(requirement.source.clone()));
        if let Some(hash) = self
            .hash_overrides
            .get(&(requirement.bucket, requirement.source.clone()))
        {
            return Ok(hash.clone());
        }
        self.object(requirement)
            .map(|body| sha256_hex(body))
            .ok_or_else(|| FetchError::HttpError(format!("no such object: {}", requirement.source)))
    }

    async fn download(
        &self,
        requirement: &Requirement,
        destination: &Path,
        _expected_hash: &str,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Download {
            source: requirement.source.clone(),
            destination: destination.to_path_buf(),
        });
        let body = self.object(requirement).ok_or_else(|| {
            FetchError::download(&requirement.source, destination, "object not found")
        })?;
        std::fs::write(destination, body)?;
        Ok(())
    }
}

pub(crate) fn sha256_hex(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Gzip tarball bytes holding the given files.
pub(crate) fn tarball(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *body).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

pub(crate) fn write_file(path: &Path, body: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut file = File::create(path).unwrap();
    std::io::Write::write_all(&mut file, body).unwrap();
}
