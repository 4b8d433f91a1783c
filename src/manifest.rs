//! # Integrity Manifest
//!
//! Summarises a run: host identity, per-kind record counts, the SHA-256 of
//! every output file and the errors met along the way. The detached `.sig`
//! file holds the SHA-256 of the manifest bytes. It is an unkeyed digest:
//! it shows the manifest was not altered after the fact, nothing more.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::host::HostMetadata;
use crate::parsers::browser::{ArtifactKind, ArtifactRecord};

const HASH_BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub run_id: String,
    pub tool_version: String,
    pub metadata: HostMetadata,
    /// Output path -> sha256 hex, `None` when the file could not be read.
    pub outputs: BTreeMap<String, Option<String>>,
    pub counts: BTreeMap<ArtifactKind, usize>,
    pub errors: Vec<String>,
}

/// Outcome of checking a manifest against its detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Mismatch { expected: String, actual: String },
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}

impl Manifest {
    /// Must be called after every output file has been written and closed.
    pub fn build(
        run_id: &str,
        host: &HostMetadata,
        outputs: &[PathBuf],
        records: &[ArtifactRecord],
        errors: &[String],
    ) -> Self {
        let mut counts = BTreeMap::new();
        for record in records {
            *counts.entry(record.artifact()).or_insert(0) += 1;
        }

        let outputs = outputs
            .iter()
            .map(|path| {
                let digest = match sha256_file(path) {
                    Ok(hex) => Some(hex),
                    Err(err) => {
                        warn!("cannot hash output {}: {err}", path.display());
                        None
                    }
                };
                (path.to_string_lossy().to_string(), digest)
            })
            .collect();

        Self {
            run_id: run_id.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            metadata: host.clone(),
            outputs,
            counts,
            errors: errors.to_vec(),
        }
    }

    pub fn total_records(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create manifest dir {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, body).with_context(|| format!("write manifest {}", path.display()))?;
        Ok(())
    }
}

pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut sha256 = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha256.update(&buf[..n]);
    }
    Ok(hex::encode(sha256.finalize()))
}

pub fn signature_path(manifest: &Path) -> PathBuf {
    let mut name = manifest.as_os_str().to_os_string();
    name.push(".sig");
    PathBuf::from(name)
}

/// Writes `<manifest>.sig` and returns its path.
pub fn sign_manifest(path: &Path) -> Result<PathBuf> {
    let digest = sha256_file(path).with_context(|| format!("hash manifest {}", path.display()))?;
    let sig = signature_path(path);
    std::fs::write(&sig, &digest).with_context(|| format!("write signature {}", sig.display()))?;
    Ok(sig)
}

pub fn verify_manifest(path: &Path) -> Result<Verification> {
    let sig = signature_path(path);
    let expected = std::fs::read_to_string(&sig)
        .with_context(|| format!("read signature {}", sig.display()))?
        .trim()
        .to_string();
    let actual = sha256_file(path).with_context(|| format!("hash manifest {}", path.display()))?;
    if expected.eq_ignore_ascii_case(&actual) {
        Ok(Verification::Valid)
    } else {
        Ok(Verification::Mismatch { expected, actual })
    }
}
