//! Upload gate: the archive upload tool run in check-only mode.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::error::{DebsignError, DebsignResult};

/// Exit status of an upload gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateStatus {
    /// Process exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
}

impl GateStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Pre-upload checker for a signed manifest.
pub trait UploadGate {
    /// Configured target profiles (upload hosts).
    fn profiles(&self) -> DebsignResult<Vec<String>>;

    /// Check `manifest` against `profile`. `extended_checks` adds a lintian run.
    fn check(
        &self,
        manifest: &Path,
        profile: &str,
        extended_checks: bool,
    ) -> DebsignResult<GateStatus>;
}

impl<G: UploadGate + ?Sized> UploadGate for &G {
    fn profiles(&self) -> DebsignResult<Vec<String>> {
        (**self).profiles()
    }

    fn check(
        &self,
        manifest: &Path,
        profile: &str,
        extended_checks: bool,
    ) -> DebsignResult<GateStatus> {
        (**self).check(manifest, profile, extended_checks)
    }
}

/// `dput` driver.
///
/// Hosts come from `dput -H`; checks run `dput -o` (or `-ol` with lintian)
/// so nothing is uploaded.
#[derive(Debug, Clone)]
pub struct DputGate {
    program: PathBuf,
    gnupg_home: Option<PathBuf>,
}

impl Default for DputGate {
    fn default() -> Self {
        Self {
            program: PathBuf::from("dput"),
            gnupg_home: None,
        }
    }
}

impl DputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Key store exported as `GNUPGHOME`, so dput checks signatures against it.
    pub fn with_gnupg_home(mut self, home: Option<PathBuf>) -> Self {
        self.gnupg_home = home;
        self
    }

    fn output(&self, args: &[&OsStr]) -> DebsignResult<Output> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(home) = &self.gnupg_home {
            cmd.env("GNUPGHOME", home);
        }
        cmd.output().map_err(|e| {
            DebsignError::provider(format!("failed to run {}: {e}", self.program.display()))
        })
    }
}

impl UploadGate for DputGate {
    fn profiles(&self) -> DebsignResult<Vec<String>> {
        let output = self.output(&[OsStr::new("-H")])?;
        if !output.status.success() {
            return Err(DebsignError::provider(format!(
                "{} -H exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_host_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn check(
        &self,
        manifest: &Path,
        profile: &str,
        extended_checks: bool,
    ) -> DebsignResult<GateStatus> {
        let mode = if extended_checks { "-ol" } else { "-o" };
        let output = self.output(&[OsStr::new(mode), OsStr::new(profile), manifest.as_os_str()])?;

        let status = GateStatus {
            code: output.status.code(),
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if status.success() {
            tracing::debug!(profile, mode, stdout = %stdout.trim(), "upload gate passed");
        } else {
            tracing::warn!(
                profile,
                mode,
                code = ?status.code,
                stdout = %stdout.trim(),
                stderr = %stderr.trim(),
                "upload gate rejected manifest"
            );
        }
        Ok(status)
    }
}

/// Host names from `dput -H` output (`name => fqdn ...` lines).
pub fn parse_host_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.split_once(" => "))
        .map(|(name, _)| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}
