//! File size and digest computation.
//!
//! Every supported algorithm is fed from the same in-memory buffer so the
//! size and all digests always describe the same bytes.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{DebsignError, DebsignResult};

/// Digest algorithms recorded in a `.changes` manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// All algorithms, in manifest field order.
    pub const ALL: [HashAlgorithm; 3] = [Self::Md5, Self::Sha1, Self::Sha256];

    /// The deb822 field holding this algorithm's record family.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::Md5 => "Files",
            Self::Sha1 => "Checksums-Sha1",
            Self::Sha256 => "Checksums-Sha256",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    /// Length of a hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Size and lowercase hex digests of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDigests {
    pub size: u64,
    pub md5: String,
    pub sha1: String,
    pub sha256: String,
}

impl FileDigests {
    pub fn digest(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha1 => &self.sha1,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }
}

/// Digest an in-memory buffer.
pub fn digest_bytes(data: &[u8]) -> FileDigests {
    FileDigests {
        size: data.len() as u64,
        md5: format!("{:x}", md5::compute(data)),
        sha1: hex::encode(Sha1::digest(data)),
        sha256: hex::encode(Sha256::digest(data)),
    }
}

/// Read `path` once and digest its contents.
pub fn compute_digests(path: &Path) -> DebsignResult<FileDigests> {
    let data = fs::read(path).map_err(|e| DebsignError::io(path, e))?;
    let digests = digest_bytes(&data);
    tracing::debug!(
        path = %path.display(),
        size = digests.size,
        sha256 = %digests.sha256,
        "computed file digests"
    );
    Ok(digests)
}
