//! Workflow phases.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Where a run currently stands.
///
/// `Unsigned -> DscSigned -> ChangesRewritten -> ChangesSigned -> Verified`,
/// or `AlreadySigned -> Verified` when the manifest was signed on entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Unsigned,
    AlreadySigned,
    DscSigned,
    ChangesRewritten,
    ChangesSigned,
    Verified,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unsigned => "unsigned",
            Self::AlreadySigned => "already_signed",
            Self::DscSigned => "dsc_signed",
            Self::ChangesRewritten => "changes_rewritten",
            Self::ChangesSigned => "changes_signed",
            Self::Verified => "verified",
        };
        f.write_str(s)
    }
}

/// Snapshot of the artifact pair, derived from disk at the start of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowState {
    pub description_path: PathBuf,
    pub manifest_path: PathBuf,
    pub description_signed: bool,
    pub manifest_signed: bool,
    pub phase: Phase,
    verification_only: bool,
}

impl WorkflowState {
    pub fn detect(
        manifest_path: PathBuf,
        description_path: PathBuf,
        manifest_signed: bool,
        description_signed: bool,
    ) -> Self {
        let phase = if manifest_signed {
            Phase::AlreadySigned
        } else {
            Phase::Unsigned
        };
        Self {
            description_path,
            manifest_path,
            description_signed,
            manifest_signed,
            phase,
            verification_only: manifest_signed,
        }
    }

    /// Whether this run only verifies (the manifest was signed on entry).
    pub fn verification_only(&self) -> bool {
        self.verification_only
    }

    fn advance(self, from: Phase, to: Phase) -> Self {
        debug_assert_eq!(self.phase, from, "invalid transition to {to}");
        tracing::debug!(from = %self.phase, to = %to, "workflow transition");
        Self { phase: to, ..self }
    }

    pub fn description_signed(self) -> Self {
        Self {
            description_signed: true,
            ..self.advance(Phase::Unsigned, Phase::DscSigned)
        }
    }

    pub fn manifest_rewritten(self) -> Self {
        self.advance(Phase::DscSigned, Phase::ChangesRewritten)
    }

    pub fn manifest_signed(self) -> Self {
        Self {
            manifest_signed: true,
            ..self.advance(Phase::ChangesRewritten, Phase::ChangesSigned)
        }
    }

    pub fn verified(self) -> Self {
        let from = if self.verification_only {
            Phase::AlreadySigned
        } else {
            Phase::ChangesSigned
        };
        self.advance(from, Phase::Verified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(manifest_signed: bool, description_signed: bool) -> WorkflowState {
        WorkflowState::detect(
            PathBuf::from("pkg_1.0_source.changes"),
            PathBuf::from("pkg_1.0.dsc"),
            manifest_signed,
            description_signed,
        )
    }

    #[test]
    fn signed_manifest_starts_verification_only() {
        let state = detect(true, true);
        assert_eq!(state.phase, Phase::AlreadySigned);
        assert!(state.verification_only());

        let state = state.verified();
        assert_eq!(state.phase, Phase::Verified);
        assert!(state.verification_only());
    }

    #[test]
    fn full_signing_path() {
        let state = detect(false, false);
        assert_eq!(state.phase, Phase::Unsigned);
        assert!(!state.verification_only());

        let state = state.description_signed();
        assert!(state.description_signed);
        assert_eq!(state.phase, Phase::DscSigned);

        let state = state.manifest_rewritten().manifest_signed();
        assert!(state.manifest_signed);
        assert_eq!(state.phase, Phase::ChangesSigned);

        let state = state.verified();
        assert_eq!(state.phase, Phase::Verified);
        assert!(!state.verification_only());
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "invalid transition")]
    fn skipping_a_phase_is_rejected() {
        let _ = detect(false, false).manifest_rewritten();
    }

    #[test]
    fn phase_display_matches_serde() {
        for phase in [Phase::Unsigned, Phase::ChangesRewritten, Phase::Verified] {
            let json = serde_json::to_value(phase).unwrap();
            assert_eq!(json, phase.to_string());
        }
    }
}
