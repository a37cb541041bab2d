//! Signature detection, signing and verification of release artifacts.
//!
//! [`SigningProvider`] is the OpenPGP backend (see [`GpgProvider`]);
//! [`SignatureGate`] applies it to files on disk and is what the workflow
//! consumes through the [`Signer`] trait.

mod gpg;

use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{DebsignError, DebsignResult};
use crate::fsutil::write_atomic;

pub use gpg::{parse_sign_status, parse_verify_status, GpgProvider};

/// First line of a clear-signed message.
pub const SIGNED_MESSAGE_BEGIN: &str = "-----BEGIN PGP SIGNED MESSAGE-----";

/// Start of the armored signature following a clear-signed body.
pub const SIGNATURE_BLOCK_BEGIN: &str = "-----BEGIN PGP SIGNATURE-----";

/// Secret key passphrase. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

impl fmt::Display for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Who made a valid signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerIdentity {
    /// Long key id reported by the provider.
    pub key_id: String,
    pub fingerprint: Option<String>,
    pub user_id: Option<String>,
    pub signed_at: Option<DateTime<Utc>>,
}

impl SignerIdentity {
    /// Whether this identity matches a configured key id, fingerprint or user id.
    ///
    /// Hex ids match as a suffix of the fingerprint or key id (`0x` and
    /// spaces ignored); anything else is matched against the user id.
    pub fn matches(&self, expected: &str) -> bool {
        let normalized: String = expected
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        if !normalized.is_empty() && normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            let key_id = self.key_id.to_ascii_uppercase();
            let by_fingerprint = self
                .fingerprint
                .as_deref()
                .is_some_and(|fpr| fpr.to_ascii_uppercase().ends_with(&normalized));
            return by_fingerprint || key_id.ends_with(&normalized);
        }

        let needle = expected.trim().to_lowercase();
        self.user_id
            .as_deref()
            .is_some_and(|uid| uid.to_lowercase().contains(&needle))
    }
}

/// Provider verdict on a signed buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Well-formed and cryptographically valid.
    Valid(SignerIdentity),
    /// Well-formed but not valid (bad signature, missing or expired key).
    Invalid { reason: String },
    /// No parseable signature.
    Malformed { reason: String },
}

/// OpenPGP backend.
pub trait SigningProvider {
    /// Clear-sign `data`. `Ok(None)` means no signature was produced
    /// (wrong passphrase, locked or unknown key).
    fn clearsign(
        &self,
        data: &[u8],
        key_id: Option<&str>,
        passphrase: Option<&Passphrase>,
    ) -> DebsignResult<Option<Vec<u8>>>;

    /// Verify a clear-signed buffer.
    fn verify(&self, data: &[u8]) -> DebsignResult<VerifyOutcome>;
}

impl<P: SigningProvider + ?Sized> SigningProvider for &P {
    fn clearsign(
        &self,
        data: &[u8],
        key_id: Option<&str>,
        passphrase: Option<&Passphrase>,
    ) -> DebsignResult<Option<Vec<u8>>> {
        (**self).clearsign(data, key_id, passphrase)
    }

    fn verify(&self, data: &[u8]) -> DebsignResult<VerifyOutcome> {
        (**self).verify(data)
    }
}

/// File-level signing capability used by the workflow.
pub trait Signer {
    /// `false` when the file carries no signature marker.
    ///
    /// A marker with an unparseable envelope is an integrity error, never
    /// "unsigned".
    fn is_signed(&self, path: &Path) -> DebsignResult<bool>;

    /// Replace the file with its clear-signed form. `Ok(false)` when the
    /// provider declined; the file is then left untouched.
    fn sign(
        &self,
        path: &Path,
        key_id: Option<&str>,
        passphrase: Option<&Passphrase>,
    ) -> DebsignResult<bool>;

    /// Signer of a well-formed, valid signature by the expected signer.
    fn verified_signer(&self, path: &Path) -> DebsignResult<Option<SignerIdentity>>;

    fn verify(&self, path: &Path) -> DebsignResult<bool> {
        Ok(self.verified_signer(path)?.is_some())
    }
}

/// Whether a buffer starts with the clear-signed message marker.
pub fn has_signature_marker(data: &[u8]) -> bool {
    data.starts_with(SIGNED_MESSAGE_BEGIN.as_bytes())
}

/// [`Signer`] over a [`SigningProvider`].
#[derive(Debug, Clone)]
pub struct SignatureGate<P> {
    provider: P,
    expected_signer: Option<String>,
}

impl<P: SigningProvider> SignatureGate<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            expected_signer: None,
        }
    }

    /// Only accept signatures made by this key id, fingerprint or user id.
    pub fn with_expected_signer(mut self, signer: Option<String>) -> Self {
        self.expected_signer = signer;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

fn read_file(path: &Path) -> DebsignResult<Vec<u8>> {
    fs::read(path).map_err(|e| DebsignError::io(path, e))
}

impl<P: SigningProvider> Signer for SignatureGate<P> {
    fn is_signed(&self, path: &Path) -> DebsignResult<bool> {
        let data = read_file(path)?;
        if !has_signature_marker(&data) {
            return Ok(false);
        }
        match self.provider.verify(&data)? {
            VerifyOutcome::Malformed { reason } => Err(DebsignError::Integrity {
                path: path.to_path_buf(),
                reason,
            }),
            _ => Ok(true),
        }
    }

    fn sign(
        &self,
        path: &Path,
        key_id: Option<&str>,
        passphrase: Option<&Passphrase>,
    ) -> DebsignResult<bool> {
        let data = read_file(path)?;
        let Some(signed) = self.provider.clearsign(&data, key_id, passphrase)? else {
            tracing::warn!(path = %path.display(), "signing provider declined to sign");
            return Ok(false);
        };
        if !has_signature_marker(&signed) {
            return Err(DebsignError::Integrity {
                path: path.to_path_buf(),
                reason: "provider output is not a clear-signed message".to_string(),
            });
        }
        write_atomic(path, &signed)?;
        tracing::info!(path = %path.display(), bytes = signed.len(), "signed");
        Ok(true)
    }

    fn verified_signer(&self, path: &Path) -> DebsignResult<Option<SignerIdentity>> {
        let data = read_file(path)?;
        if !has_signature_marker(&data) {
            tracing::warn!(path = %path.display(), "file is not signed");
            return Ok(None);
        }
        match self.provider.verify(&data)? {
            VerifyOutcome::Valid(identity) => match &self.expected_signer {
                Some(expected) if !identity.matches(expected) => {
                    tracing::warn!(
                        path = %path.display(),
                        expected = %expected,
                        actual = %identity.key_id,
                        "signature made by an unexpected key"
                    );
                    Ok(None)
                }
                _ => Ok(Some(identity)),
            },
            VerifyOutcome::Invalid { reason } | VerifyOutcome::Malformed { reason } => {
                tracing::warn!(path = %path.display(), %reason, "signature rejected");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Provider with a canned verdict that records what it was asked to sign.
    struct CannedProvider {
        sign_result: Option<Vec<u8>>,
        verdict: VerifyOutcome,
        signed_inputs: RefCell<Vec<Vec<u8>>>,
    }

    impl CannedProvider {
        fn new(sign_result: Option<&str>, verdict: VerifyOutcome) -> Self {
            Self {
                sign_result: sign_result.map(|s| s.as_bytes().to_vec()),
                verdict,
                signed_inputs: RefCell::new(Vec::new()),
            }
        }
    }

    impl SigningProvider for CannedProvider {
        fn clearsign(
            &self,
            data: &[u8],
            _key_id: Option<&str>,
            _passphrase: Option<&Passphrase>,
        ) -> DebsignResult<Option<Vec<u8>>> {
            self.signed_inputs.borrow_mut().push(data.to_vec());
            Ok(self.sign_result.clone())
        }

        fn verify(&self, _data: &[u8]) -> DebsignResult<VerifyOutcome> {
            Ok(self.verdict.clone())
        }
    }

    fn identity() -> SignerIdentity {
        SignerIdentity {
            key_id: "0123456789ABCDEF".into(),
            fingerprint: Some("AAAABBBBCCCCDDDDEEEEFFFF0123456789ABCDEF".into()),
            user_id: Some("Jane Maintainer <jane@example.org>".into()),
            signed_at: None,
        }
    }

    const SIGNED: &str = "-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\nbody\n-----BEGIN PGP SIGNATURE-----\n\nxx\n-----END PGP SIGNATURE-----\n";

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn unsigned_file_is_not_signed_without_asking_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", "Source: x\n");
        let gate = SignatureGate::new(CannedProvider::new(
            None,
            VerifyOutcome::Malformed {
                reason: "unused".into(),
            },
        ));
        assert!(!gate.is_signed(&path).unwrap());
    }

    #[test]
    fn marker_must_be_at_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", &format!("\n{SIGNED}"));
        let gate = SignatureGate::new(CannedProvider::new(None, VerifyOutcome::Valid(identity())));
        assert!(!gate.is_signed(&path).unwrap());
    }

    #[test]
    fn malformed_envelope_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", SIGNED);
        let gate = SignatureGate::new(CannedProvider::new(
            None,
            VerifyOutcome::Malformed {
                reason: "no signature found".into(),
            },
        ));
        let err = gate.is_signed(&path).unwrap_err();
        assert!(matches!(err, DebsignError::Integrity { .. }));
    }

    #[test]
    fn invalid_but_well_formed_counts_as_signed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", SIGNED);
        let gate = SignatureGate::new(CannedProvider::new(
            None,
            VerifyOutcome::Invalid {
                reason: "bad signature".into(),
            },
        ));
        assert!(gate.is_signed(&path).unwrap());
        assert!(!gate.verify(&path).unwrap());
    }

    #[test]
    fn declined_signing_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", "Source: x\n");
        let gate = SignatureGate::new(CannedProvider::new(None, VerifyOutcome::Valid(identity())));
        let passphrase = Passphrase::new("wrong");
        assert!(!gate.sign(&path, Some("ABCDEF"), Some(&passphrase)).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Source: x\n");
    }

    #[test]
    fn successful_signing_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", "body\n");
        let gate = SignatureGate::new(CannedProvider::new(
            Some(SIGNED),
            VerifyOutcome::Valid(identity()),
        ));
        assert!(gate.sign(&path, None, None).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), SIGNED);
        assert_eq!(gate.provider().signed_inputs.borrow()[0], b"body\n");
    }

    #[test]
    fn provider_output_without_marker_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", "body\n");
        let gate = SignatureGate::new(CannedProvider::new(
            Some("garbage"),
            VerifyOutcome::Valid(identity()),
        ));
        assert!(matches!(
            gate.sign(&path, None, None),
            Err(DebsignError::Integrity { .. })
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "body\n");
    }

    #[test]
    fn verify_checks_expected_signer() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.dsc", SIGNED);
        let provider = CannedProvider::new(None, VerifyOutcome::Valid(identity()));

        let any = SignatureGate::new(&provider);
        assert!(any.verify(&path).unwrap());

        let matching =
            SignatureGate::new(&provider).with_expected_signer(Some("0x89ABCDEF".into()));
        assert_eq!(matching.verified_signer(&path).unwrap(), Some(identity()));

        let other = SignatureGate::new(&provider).with_expected_signer(Some("DEADBEEF".into()));
        assert!(!other.verify(&path).unwrap());
    }

    #[test]
    fn identity_matches_fingerprint_key_id_and_user_id() {
        let id = identity();
        assert!(id.matches("AAAABBBBCCCCDDDDEEEEFFFF0123456789ABCDEF"));
        assert!(id.matches("aaaa bbbb cccc dddd eeee ffff 0123 4567 89ab cdef"));
        assert!(id.matches("0123456789abcdef"));
        assert!(id.matches("jane@example.org"));
        assert!(!id.matches("john@example.org"));
        assert!(!id.matches("FFFF0000"));
    }

    #[test]
    fn passphrase_is_redacted() {
        let p = Passphrase::new("hunter2");
        assert_eq!(format!("{p:?}"), "Passphrase(<redacted>)");
        assert_eq!(p.to_string(), "<redacted>");
        assert_eq!(p.expose(), "hunter2");
    }
}
