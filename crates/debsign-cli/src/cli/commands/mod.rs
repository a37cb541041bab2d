use super::args::*;

pub mod digest;
pub mod profiles;
pub mod sign;
pub mod verify;

use anyhow::Context;
use debsign_core::{DebsignError, Passphrase, SignConfig};
use serde_json::json;

use crate::exit_codes::{self, SUCCESS};

pub fn dispatch(cli: Cli) -> i32 {
    match cli.cmd {
        Command::Sign(args) => sign::cmd_sign(args),
        Command::Verify(args) => verify::cmd_verify(args),
        Command::Digest(args) => digest::cmd_digest(args),
        Command::Profiles(args) => profiles::cmd_profiles(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            SUCCESS
        }
    }
}

impl WorkflowArgs {
    /// Environment, then config file, then flags.
    ///
    /// The passphrase never comes from the config file: it is taken from
    /// `--passphrase-file` or `DEBSIGN_PASSPHRASE`.
    pub fn to_config(&self) -> anyhow::Result<SignConfig> {
        let mut config = SignConfig::from_env();
        if let Some(path) = &self.config {
            config = config.merge_file(path)?;
        }

        if let Some(key) = &self.keyid {
            config = config.with_key_id(key.clone());
        }
        if let Some(path) = &self.passphrase_file {
            config.passphrase = None;
            config = config.with_passphrase_file(path);
        }
        if let Some(home) = &self.gnupghome {
            config = config.with_gnupg_home(home);
        }
        if let Some(profile) = &self.profile {
            config = config.with_profile(profile.clone());
        }
        if self.no_lintian {
            config = config.with_lintian(false);
        }
        if let Some(suffix) = &self.description_suffix {
            config = config.with_description_suffix(suffix.clone());
        }
        if let Some(gpg) = &self.gpg {
            config = config.with_gpg_program(gpg);
        }
        if let Some(dput) = &self.dput {
            config = config.with_dput_program(dput);
        }

        // Read the passphrase file before touching any artifact.
        let passphrase: Option<Passphrase> = config
            .resolve_passphrase()
            .context("failed to read passphrase")?;
        if let Some(passphrase) = passphrase {
            config = config.with_passphrase(passphrase);
        }
        tracing::debug!(
            key_id = ?config.key_id,
            profile = %config.profile,
            lintian = config.lintian,
            passphrase = config.passphrase.is_some(),
            "resolved configuration"
        );
        Ok(config)
    }
}

/// Report a failed command and return its exit code.
///
/// Text mode prints the error chain to stderr; JSON mode additionally
/// writes a machine-readable error object to stdout.
pub(crate) fn report_error(err: &anyhow::Error, format: OutputFormat) -> i32 {
    eprintln!("error: {err:#}");
    let code = exit_codes::for_error(err);
    if format == OutputFormat::Json {
        let (kind, failures) = match err.downcast_ref::<DebsignError>() {
            Some(e) => (e.code(), serde_json::to_value(e.failures()).unwrap_or_default()),
            None => ("config", json!([])),
        };
        let doc = json!({
            "status": "error",
            "code": kind,
            "exit_code": code,
            "message": format!("{err:#}"),
            "failures": failures,
        });
        println!("{doc}");
    } else if let Some(e) = err.downcast_ref::<DebsignError>() {
        for failure in e.failures() {
            eprintln!("  - [{}] {failure}", failure.code());
        }
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    fn workflow_args(extra: &[&str]) -> WorkflowArgs {
        let mut argv = vec!["rdebsign", "sign", "pkg.changes"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().cmd {
            Command::Sign(args) => args,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debsign.yaml");
        std::fs::write(&path, "key_id: FILEKEY\nprofile: mentors\nlintian: true\n").unwrap();

        let args = workflow_args(&[
            "--config",
            path.to_str().unwrap(),
            "--keyid",
            "FLAGKEY",
            "--no-lintian",
        ]);
        let config = args.to_config().unwrap();
        assert_eq!(config.key_id.as_deref(), Some("FLAGKEY"));
        assert_eq!(config.profile, "mentors");
        assert!(!config.lintian);
    }

    #[test]
    #[serial]
    fn config_file_keeps_environment_for_absent_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debsign.yaml");
        std::fs::write(&path, "key_id: ABC\n").unwrap();

        std::env::set_var("DEBSIGN_PROFILE", "mentors");
        std::env::set_var("DEBSIGN_LINTIAN", "0");
        let config = workflow_args(&["--config", path.to_str().unwrap()]).to_config();
        std::env::remove_var("DEBSIGN_PROFILE");
        std::env::remove_var("DEBSIGN_LINTIAN");

        let config = config.unwrap();
        assert_eq!(config.key_id.as_deref(), Some("ABC"));
        assert_eq!(config.profile, "mentors");
        assert!(!config.lintian);
    }

    #[test]
    #[serial]
    fn missing_passphrase_file_fails_early() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let args = workflow_args(&["--passphrase-file", missing.to_str().unwrap()]);
        let err = args.to_config().unwrap_err();
        assert_eq!(exit_codes::for_error(&err), 4);
    }
}
