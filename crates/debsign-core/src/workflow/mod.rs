//! End-to-end signing workflow.
//!
//! [`SigningOrchestrator`] signs the description file, rewrites its records
//! in the manifest, signs the manifest and verifies the result. A manifest
//! that is already signed is only verified, so re-running is safe.

mod state;
mod verify;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::checksum::{compute_digests, FileDigests, HashAlgorithm};
use crate::config::SignConfig;
use crate::error::{DebsignError, DebsignResult, FormatError};
use crate::manifest::{Manifest, NamePattern};
use crate::signature::{GpgProvider, Passphrase, SignatureGate, Signer, SignerIdentity};
use crate::upload::{DputGate, UploadGate};

pub use state::{Phase, WorkflowState};

use verify::Checks;

/// Which signature a provider declined to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SigningStage {
    Description,
    Manifest,
}

impl fmt::Display for SigningStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Description => "description",
            Self::Manifest => "manifest",
        })
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub enum Outcome {
    Verified(VerificationReport),
    /// No signature was produced. Files are left as they were before the
    /// declined step.
    Declined(SigningStage),
}

/// Summary of a verified artifact pair.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub manifest: PathBuf,
    pub description: PathBuf,
    /// `true` when the manifest was already signed and nothing was written.
    pub verification_only: bool,
    pub source: Option<String>,
    pub version: Option<String>,
    pub digests: FileDigests,
    pub description_signer: SignerIdentity,
    pub manifest_signer: SignerIdentity,
    pub profile: String,
}

/// Drives the signing workflow for one manifest.
#[derive(Debug)]
pub struct SigningOrchestrator<S, G> {
    signer: S,
    gate: G,
    manifest_path: PathBuf,
    pattern: NamePattern,
    profile: String,
    extended_checks: bool,
    key_id: Option<String>,
    passphrase: Option<Passphrase>,
}

impl SigningOrchestrator<SignatureGate<GpgProvider>, DputGate> {
    /// Orchestrator backed by `gpg` and `dput`.
    ///
    /// Signatures are only accepted from the configured key, when one is set.
    pub fn from_config(
        manifest_path: impl Into<PathBuf>,
        config: &SignConfig,
    ) -> DebsignResult<Self> {
        let provider = GpgProvider::new()
            .with_program(&config.gpg_program)
            .with_homedir(config.gnupg_home.clone());
        let signer = SignatureGate::new(provider).with_expected_signer(config.key_id.clone());
        let gate = DputGate::new()
            .with_program(&config.dput_program)
            .with_gnupg_home(config.gnupg_home.clone());
        Self::new(signer, gate, manifest_path, config)
    }
}

impl<S: Signer, G: UploadGate> SigningOrchestrator<S, G> {
    /// Fails with [`DebsignError::Config`] when the configured profile is
    /// unknown to the upload gate.
    pub fn new(
        signer: S,
        gate: G,
        manifest_path: impl Into<PathBuf>,
        config: &SignConfig,
    ) -> DebsignResult<Self> {
        config.validate()?;
        let profiles = gate.profiles()?;
        if !profiles.iter().any(|p| p == &config.profile) {
            return Err(DebsignError::config(format!(
                "upload profile {:?} is not defined (known: {})",
                config.profile,
                if profiles.is_empty() {
                    "none".to_string()
                } else {
                    profiles.join(", ")
                }
            )));
        }

        Ok(Self {
            signer,
            gate,
            manifest_path: manifest_path.into(),
            pattern: config.name_pattern(),
            profile: config.profile.clone(),
            extended_checks: config.lintian,
            key_id: config.key_id.clone(),
            passphrase: config.resolve_passphrase()?,
        })
    }

    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Sign and verify, or only verify when the manifest is already signed.
    pub fn run(&self) -> DebsignResult<Outcome> {
        let (mut manifest, state) = self.detect()?;
        if state.manifest_signed {
            tracing::info!(
                manifest = %self.manifest_path.display(),
                "manifest already signed, verifying only"
            );
            return self.verify(state).map(Outcome::Verified);
        }

        if state.description_signed {
            tracing::info!(
                description = %state.description_path.display(),
                "description already signed"
            );
        } else if !self.sign(&state.description_path)? {
            return Ok(Outcome::Declined(SigningStage::Description));
        }
        let state = state.description_signed();

        let digests = compute_digests(&state.description_path)?;
        for algorithm in HashAlgorithm::ALL {
            manifest.rewrite_entry(
                algorithm,
                &self.pattern,
                digests.size,
                digests.digest(algorithm),
            )?;
        }
        manifest.persist(&self.manifest_path)?;
        tracing::info!(
            manifest = %self.manifest_path.display(),
            size = digests.size,
            "rewrote description checksums"
        );
        let state = state.manifest_rewritten();

        if !self.sign(&self.manifest_path)? {
            return Ok(Outcome::Declined(SigningStage::Manifest));
        }
        let state = state.manifest_signed();

        self.verify(state).map(Outcome::Verified)
    }

    /// Verify an already signed pair without writing anything.
    pub fn verify_only(&self) -> DebsignResult<VerificationReport> {
        let (_, state) = self.detect()?;
        if !state.manifest_signed {
            return Err(FormatError::UnsignedManifest.into());
        }
        self.verify(state)
    }

    /// Parse the manifest, locate the description record in every family
    /// and read both signature states.
    fn detect(&self) -> DebsignResult<(Manifest, WorkflowState)> {
        let manifest = Manifest::from_path(&self.manifest_path)?;
        let description_path = locate_description(&manifest, &self.manifest_path, &self.pattern)?;

        let manifest_signed = self.signer.is_signed(&self.manifest_path)?;
        // On the verification-only path the description signature is judged
        // by the collected checks, so a malformed envelope is a failure there.
        let description_signed = manifest_signed || self.signer.is_signed(&description_path)?;
        let state = WorkflowState::detect(
            self.manifest_path.clone(),
            description_path,
            manifest_signed,
            description_signed,
        );
        tracing::debug!(
            manifest = %state.manifest_path.display(),
            description = %state.description_path.display(),
            phase = %state.phase,
            "detected workflow state"
        );
        Ok((manifest, state))
    }

    fn sign(&self, path: &Path) -> DebsignResult<bool> {
        self.signer
            .sign(path, self.key_id.as_deref(), self.passphrase.as_ref())
    }

    fn verify(&self, state: WorkflowState) -> DebsignResult<VerificationReport> {
        let checks = Checks {
            signer: &self.signer,
            gate: &self.gate,
            pattern: &self.pattern,
            profile: &self.profile,
            extended_checks: self.extended_checks,
        };
        let verified = checks.run(&state.manifest_path)?;
        let state = state.verified();

        Ok(VerificationReport {
            source: verified.manifest.field("Source").map(str::to_string),
            version: verified.manifest.field("Version").map(str::to_string),
            manifest: state.manifest_path.clone(),
            description: verified.description_path,
            verification_only: state.verification_only(),
            digests: verified.digests,
            description_signer: verified.description_signer,
            manifest_signer: verified.manifest_signer,
            profile: self.profile.clone(),
        })
    }
}

/// Path of the description file named by the manifest's `Files` record.
///
/// The record must match uniquely in every checksum family, and its name
/// must be a plain file name; it resolves next to the manifest.
pub(crate) fn locate_description(
    manifest: &Manifest,
    manifest_path: &Path,
    pattern: &NamePattern,
) -> DebsignResult<PathBuf> {
    for algorithm in HashAlgorithm::ALL {
        manifest.find_entry(algorithm, pattern)?;
    }
    let name = &manifest.find_entry(HashAlgorithm::Md5, pattern)?.name;
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(FormatError::InvalidEntryName { name: name.clone() }.into());
    }

    let dir = match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok(dir.join(name))
}

/// Run the workflow against `gpg` and `dput` with `config`.
pub fn debsign(manifest_path: impl Into<PathBuf>, config: &SignConfig) -> DebsignResult<Outcome> {
    SigningOrchestrator::from_config(manifest_path, config)?.run()
}
