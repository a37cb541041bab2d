//! Error types for the signing workflow.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::checksum::HashAlgorithm;

/// Workflow errors.
///
/// Signing declination is deliberately absent: a provider that refuses to sign
/// is reported through [`crate::workflow::Outcome::Declined`].
#[derive(Debug, thiserror::Error)]
pub enum DebsignError {
    /// Invalid or unusable configuration (e.g. unknown upload profile).
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Manifest text could not be parsed or a record lookup was not unique.
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// File could not be read or written.
    #[error("i/o error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Signature marker present but the envelope is not parseable.
    #[error("integrity error in {}: {}", .path.display(), .reason)]
    Integrity { path: PathBuf, reason: String },

    /// One or more verification checks failed.
    #[error("verification failed: {}", summarize(.failures))]
    Verification { failures: Vec<VerificationFailure> },

    /// An external tool (gpg, dput) could not be executed.
    #[error("provider error: {message}")]
    Provider { message: String },
}

impl DebsignError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Format(_) => 3,
            Self::Io { .. } => 4,
            Self::Integrity { .. } => 5,
            Self::Verification { .. } => 6,
            Self::Provider { .. } => 7,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Format(inner) => inner.code(),
            Self::Io { .. } => "io",
            Self::Integrity { .. } => "integrity",
            Self::Verification { .. } => "verification",
            Self::Provider { .. } => "provider",
        }
    }

    /// Verification failures carried by this error, empty for other kinds.
    pub fn failures(&self) -> &[VerificationFailure] {
        match self {
            Self::Verification { failures } => failures,
            _ => &[],
        }
    }
}

fn summarize(failures: &[VerificationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Manifest format errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },

    #[error("required field {field} is missing")]
    MissingField { field: String },

    #[error("field {field} appears more than once")]
    DuplicateField { field: String },

    #[error("malformed record in {field} at line {line}: {reason}")]
    MalformedRecord {
        field: String,
        line: usize,
        reason: String,
    },

    #[error("no entry in {field} matches *{pattern}")]
    EntryNotFound { field: String, pattern: String },

    #[error("{count} entries in {field} match *{pattern}, expected exactly one")]
    AmbiguousEntry {
        field: String,
        pattern: String,
        count: usize,
    },

    #[error("entry name {name:?} is not a plain file name")]
    InvalidEntryName { name: String },

    #[error("manifest is signed, refusing to rewrite it")]
    SignedManifest,

    #[error("manifest is not signed")]
    UnsignedManifest,

    #[error("signed message has no signature block")]
    UnterminatedSignature,
}

impl FormatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "format_syntax",
            Self::MissingField { .. } => "format_missing_field",
            Self::DuplicateField { .. } => "format_duplicate_field",
            Self::MalformedRecord { .. } => "format_malformed_record",
            Self::EntryNotFound { .. } => "format_entry_not_found",
            Self::AmbiguousEntry { .. } => "format_ambiguous_entry",
            Self::InvalidEntryName { .. } => "format_invalid_entry_name",
            Self::SignedManifest => "format_signed_manifest",
            Self::UnsignedManifest => "format_unsigned_manifest",
            Self::UnterminatedSignature => "format_unterminated_signature",
        }
    }
}

/// A single failed verification check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum VerificationFailure {
    #[error(
        "size of {} in {} differs: manifest records {}, file has {}",
        .name,
        .algorithm.field_name(),
        .recorded,
        .actual
    )]
    SizeMismatch {
        algorithm: HashAlgorithm,
        name: String,
        recorded: u64,
        actual: u64,
    },

    #[error("{algorithm} digest of {name} differs: manifest records {recorded}, file has {actual}")]
    DigestMismatch {
        algorithm: HashAlgorithm,
        name: String,
        recorded: String,
        actual: String,
    },

    #[error("invalid signature on {}", .path.display())]
    DescriptionSignatureInvalid { path: PathBuf },

    #[error("invalid signature on {}", .path.display())]
    ManifestSignatureInvalid { path: PathBuf },

    #[error(
        "upload gate rejected the manifest for profile {} (status {})",
        .profile,
        display_status(.status)
    )]
    UploadGateRejected { profile: String, status: Option<i32> },
}

fn display_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "killed by signal".to_string(), |code| code.to_string())
}

impl VerificationFailure {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SizeMismatch { .. } => "size_mismatch",
            Self::DigestMismatch { .. } => "digest_mismatch",
            Self::DescriptionSignatureInvalid { .. } => "description_signature_invalid",
            Self::ManifestSignatureInvalid { .. } => "manifest_signature_invalid",
            Self::UploadGateRejected { .. } => "upload_gate_rejected",
        }
    }
}

/// Result type for workflow operations.
pub type DebsignResult<T> = Result<T, DebsignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let errors = [
            DebsignError::config("x"),
            DebsignError::Format(FormatError::SignedManifest),
            DebsignError::io("/tmp/x", std::io::Error::other("boom")),
            DebsignError::Integrity {
                path: "/tmp/x".into(),
                reason: "bad".into(),
            },
            DebsignError::Verification { failures: vec![] },
            DebsignError::provider("gpg missing"),
        ];
        let mut codes: Vec<i32> = errors.iter().map(DebsignError::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(!codes.contains(&0));
        assert!(!codes.contains(&1), "1 is reserved for a declined signature");
    }

    #[test]
    fn verification_error_lists_every_failure() {
        let err = DebsignError::Verification {
            failures: vec![
                VerificationFailure::SizeMismatch {
                    algorithm: HashAlgorithm::Md5,
                    name: "pkg_1.0.dsc".into(),
                    recorded: 10,
                    actual: 12,
                },
                VerificationFailure::UploadGateRejected {
                    profile: "local".into(),
                    status: Some(1),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("size of pkg_1.0.dsc in Files differs"));
        assert!(message.contains("profile local (status 1)"));
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn failure_serializes_with_check_tag() {
        let failure = VerificationFailure::DigestMismatch {
            algorithm: HashAlgorithm::Sha256,
            name: "pkg_1.0.dsc".into(),
            recorded: "aa".into(),
            actual: "bb".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["check"], "digest_mismatch");
        assert_eq!(json["algorithm"], "sha256");
    }
}
