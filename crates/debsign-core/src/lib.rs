//! Signing and verification of Debian source upload artifacts.
//!
//! A run takes a `.changes` manifest, clear-signs the `.dsc` description it
//! names, rewrites the description's size and digests in every checksum field
//! of the manifest, clear-signs the manifest, and then verifies the pair
//! (checksums, both signatures, and `dput` in check-only mode). A manifest
//! that is already signed is only verified.
//!
//! ```no_run
//! use debsign_core::{debsign, Outcome, SignConfig};
//!
//! let config = SignConfig::from_env().with_profile("local");
//! match debsign("build/pkg_1.0_source.changes", &config)? {
//!     Outcome::Verified(report) => println!("signed by {}", report.manifest_signer.key_id),
//!     Outcome::Declined(stage) => eprintln!("no signature for the {stage}"),
//! }
//! # Ok::<(), debsign_core::DebsignError>(())
//! ```
//!
//! # Environment
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `DEBSIGN_KEYID` | Signing key id |
//! | `DEBSIGN_PASSPHRASE` | Secret key passphrase |
//! | `GNUPGHOME` | Key store directory |
//! | `DEBSIGN_PROFILE` | `dput` host used for the upload check |
//! | `DEBSIGN_LINTIAN` | `0` disables the lintian run |

pub mod checksum;
pub mod config;
pub mod error;
pub mod manifest;
pub mod signature;
pub mod upload;
pub mod workflow;

mod fsutil;

pub use checksum::{compute_digests, digest_bytes, FileDigests, HashAlgorithm};
pub use config::SignConfig;
pub use error::{DebsignError, DebsignResult, FormatError, VerificationFailure};
pub use manifest::{FileEntry, Manifest, NamePattern};
pub use signature::{
    GpgProvider, Passphrase, SignatureGate, Signer, SignerIdentity, SigningProvider, VerifyOutcome,
};
pub use upload::{DputGate, GateStatus, UploadGate};
pub use workflow::{
    debsign, Outcome, Phase, SigningOrchestrator, SigningStage, VerificationReport, WorkflowState,
};
