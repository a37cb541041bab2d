//! GnuPG-backed [`SigningProvider`].
//!
//! Drives the `gpg` binary in batch mode and reads its machine-readable
//! status lines (`--status-fd 1`) instead of human output.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use chrono::DateTime;

use super::{Passphrase, SignerIdentity, SigningProvider, VerifyOutcome};
use crate::error::{DebsignError, DebsignResult};

const STATUS_PREFIX: &str = "[GNUPG:] ";

/// `gpg` command line driver.
#[derive(Debug, Clone)]
pub struct GpgProvider {
    program: PathBuf,
    homedir: Option<PathBuf>,
}

impl Default for GpgProvider {
    fn default() -> Self {
        Self {
            program: PathBuf::from("gpg"),
            homedir: None,
        }
    }
}

impl GpgProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Key store directory (`--homedir`); the gpg default when unset.
    pub fn with_homedir(mut self, homedir: Option<PathBuf>) -> Self {
        self.homedir = homedir;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--batch", "--no-tty", "--status-fd", "1"]);
        if let Some(home) = &self.homedir {
            cmd.arg("--homedir").arg(home);
        }
        cmd
    }

    fn run(&self, mut cmd: Command, stdin: Option<&str>) -> DebsignResult<Output> {
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            DebsignError::provider(format!("failed to run {}: {e}", self.program.display()))
        })?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())
                .and_then(|()| pipe.write_all(b"\n"))
                .map_err(|e| DebsignError::provider(format!("failed to write to gpg: {e}")))?;
        }
        child
            .wait_with_output()
            .map_err(|e| DebsignError::provider(format!("failed to wait for gpg: {e}")))
    }
}

fn scratch_input(dir: &Path, data: &[u8]) -> DebsignResult<PathBuf> {
    let path = dir.join("input");
    fs::write(&path, data).map_err(|e| DebsignError::io(&path, e))?;
    Ok(path)
}

impl SigningProvider for GpgProvider {
    fn clearsign(
        &self,
        data: &[u8],
        key_id: Option<&str>,
        passphrase: Option<&Passphrase>,
    ) -> DebsignResult<Option<Vec<u8>>> {
        let scratch = tempfile::tempdir().map_err(|e| DebsignError::io(std::env::temp_dir(), e))?;
        let input = scratch_input(scratch.path(), data)?;
        let output = scratch.path().join("input.asc");

        let mut cmd = self.command();
        cmd.args(["--yes", "--armor"]);
        if let Some(key) = key_id {
            cmd.arg("--local-user").arg(key);
        }
        if passphrase.is_some() {
            cmd.args(["--pinentry-mode", "loopback", "--passphrase-fd", "0"]);
        }
        cmd.arg("--output").arg(&output).arg("--clearsign").arg(&input);

        let result = self.run(cmd, passphrase.map(Passphrase::expose))?;
        let status = String::from_utf8_lossy(&result.stdout);
        if !parse_sign_status(&status) {
            tracing::warn!(
                exit = ?result.status.code(),
                stderr = %String::from_utf8_lossy(&result.stderr).trim(),
                "gpg produced no signature"
            );
            return Ok(None);
        }

        let signed = fs::read(&output).map_err(|e| DebsignError::io(&output, e))?;
        Ok(Some(signed))
    }

    fn verify(&self, data: &[u8]) -> DebsignResult<VerifyOutcome> {
        let scratch = tempfile::tempdir().map_err(|e| DebsignError::io(std::env::temp_dir(), e))?;
        let input = scratch_input(scratch.path(), data)?;

        let mut cmd = self.command();
        cmd.arg("--verify").arg(&input);
        let result = self.run(cmd, None)?;

        let outcome = parse_verify_status(&String::from_utf8_lossy(&result.stdout));
        tracing::debug!(exit = ?result.status.code(), ?outcome, "gpg verify");
        Ok(outcome)
    }
}

fn status_lines(status: &str) -> impl Iterator<Item = (&str, Vec<&str>)> {
    status.lines().filter_map(|line| {
        let rest = line.strip_prefix(STATUS_PREFIX)?;
        let mut parts = rest.split(' ');
        let keyword = parts.next()?;
        Some((keyword, parts.collect()))
    })
}

/// Whether `gpg --status-fd` output reports a created signature.
pub fn parse_sign_status(status: &str) -> bool {
    status_lines(status).any(|(keyword, _)| keyword == "SIG_CREATED")
}

/// Classify `gpg --verify --status-fd` output.
pub fn parse_verify_status(status: &str) -> VerifyOutcome {
    let mut good: Option<(String, Option<String>)> = None;
    let mut valid: Option<(String, Option<i64>)> = None;
    let mut rejected: Option<String> = None;
    let mut no_data = false;

    for (keyword, args) in status_lines(status) {
        match keyword {
            "GOODSIG" => {
                let key_id = args.first().copied().unwrap_or_default().to_string();
                let uid = (args.len() > 1).then(|| args[1..].join(" "));
                good = Some((key_id, uid));
            }
            "VALIDSIG" => {
                let fingerprint = args.first().copied().unwrap_or_default().to_string();
                let timestamp = args.get(2).and_then(|t| t.parse().ok());
                valid = Some((fingerprint, timestamp));
            }
            "BADSIG" | "EXPSIG" | "EXPKEYSIG" | "REVKEYSIG" | "ERRSIG" => {
                let key_id = args.first().copied().unwrap_or("unknown");
                rejected.get_or_insert_with(|| match keyword {
                    "BADSIG" => format!("bad signature from {key_id}"),
                    "EXPSIG" => format!("expired signature from {key_id}"),
                    "EXPKEYSIG" => format!("signature by expired key {key_id}"),
                    "REVKEYSIG" => format!("signature by revoked key {key_id}"),
                    _ => format!(
                        "cannot check signature by {key_id} (rc={})",
                        args.last().copied().unwrap_or("?")
                    ),
                });
            }
            "NODATA" => no_data = true,
            _ => {}
        }
    }

    if let Some(reason) = rejected {
        return VerifyOutcome::Invalid { reason };
    }
    match (good, valid) {
        (Some((key_id, user_id)), Some((fingerprint, timestamp))) => {
            VerifyOutcome::Valid(SignerIdentity {
                key_id,
                fingerprint: Some(fingerprint),
                user_id,
                signed_at: timestamp.and_then(|t| DateTime::from_timestamp(t, 0)),
            })
        }
        (Some((key_id, _)), None) => VerifyOutcome::Invalid {
            reason: format!("signature by {key_id} is not valid"),
        },
        _ if no_data => VerifyOutcome::Malformed {
            reason: "no valid OpenPGP data found".to_string(),
        },
        _ => VerifyOutcome::Malformed {
            reason: "no signature found".to_string(),
        },
    }
}
