//! Post-signing verification of the artifact pair.

use std::path::{Path, PathBuf};

use crate::checksum::{compute_digests, FileDigests, HashAlgorithm};
use crate::error::{DebsignError, DebsignResult, VerificationFailure};
use crate::manifest::{Manifest, NamePattern};
use crate::signature::{Signer, SignerIdentity};
use crate::upload::UploadGate;

use super::locate_description;

/// Everything that passed verification.
#[derive(Debug, Clone)]
pub(super) struct Verified {
    pub(super) manifest: Manifest,
    pub(super) description_path: PathBuf,
    pub(super) digests: FileDigests,
    pub(super) description_signer: SignerIdentity,
    pub(super) manifest_signer: SignerIdentity,
}

pub(super) struct Checks<'a, S, G> {
    pub(super) signer: &'a S,
    pub(super) gate: &'a G,
    pub(super) pattern: &'a NamePattern,
    pub(super) profile: &'a str,
    pub(super) extended_checks: bool,
}

impl<S: Signer, G: UploadGate> Checks<'_, S, G> {
    /// Run every check against the files as they are on disk now.
    ///
    /// Format and I/O problems abort; failed checks are collected and
    /// reported together as [`DebsignError::Verification`].
    pub(super) fn run(&self, manifest_path: &Path) -> DebsignResult<Verified> {
        let manifest = Manifest::from_path(manifest_path)?;
        let description_path = locate_description(&manifest, manifest_path, self.pattern)?;
        let digests = compute_digests(&description_path)?;

        let mut failures = record_failures(&manifest, self.pattern, &digests)?;

        let description_signer = self.signer.verified_signer(&description_path)?;
        if description_signer.is_none() {
            failures.push(VerificationFailure::DescriptionSignatureInvalid {
                path: description_path.clone(),
            });
        }

        let manifest_signer = self.signer.verified_signer(manifest_path)?;
        if manifest_signer.is_none() {
            failures.push(VerificationFailure::ManifestSignatureInvalid {
                path: manifest_path.to_path_buf(),
            });
        }

        let status = self
            .gate
            .check(manifest_path, self.profile, self.extended_checks)?;
        if !status.success() {
            failures.push(VerificationFailure::UploadGateRejected {
                profile: self.profile.to_string(),
                status: status.code,
            });
        }

        match (description_signer, manifest_signer) {
            (Some(description_signer), Some(manifest_signer)) if failures.is_empty() => {
                tracing::info!(
                    manifest = %manifest_path.display(),
                    description = %description_path.display(),
                    profile = self.profile,
                    "verification passed"
                );
                Ok(Verified {
                    manifest,
                    description_path,
                    digests,
                    description_signer,
                    manifest_signer,
                })
            }
            _ => {
                for failure in &failures {
                    tracing::warn!(code = failure.code(), "{failure}");
                }
                Err(DebsignError::Verification { failures })
            }
        }
    }
}

/// Size and digest checks of the description record in every family.
fn record_failures(
    manifest: &Manifest,
    pattern: &NamePattern,
    digests: &FileDigests,
) -> DebsignResult<Vec<VerificationFailure>> {
    let mut failures = Vec::new();
    for algorithm in HashAlgorithm::ALL {
        let entry = manifest.find_entry(algorithm, pattern)?;
        if entry.size != digests.size {
            failures.push(VerificationFailure::SizeMismatch {
                algorithm,
                name: entry.name.clone(),
                recorded: entry.size,
                actual: digests.size,
            });
        }
        let actual = digests.digest(algorithm);
        if !entry.digest.eq_ignore_ascii_case(actual) {
            failures.push(VerificationFailure::DigestMismatch {
                algorithm,
                name: entry.name.clone(),
                recorded: entry.digest.clone(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(failures)
}
