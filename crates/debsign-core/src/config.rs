//! Workflow configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DebsignError, DebsignResult};
use crate::manifest::NamePattern;
use crate::signature::Passphrase;

/// Settings for one signing run.
///
/// The manifest path is not part of the configuration; it is passed to the
/// orchestrator directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignConfig {
    /// Signing key id; the provider's default key when unset.
    pub key_id: Option<String>,

    /// Secret key passphrase. Never read from or written to config files.
    #[serde(skip)]
    pub passphrase: Option<Passphrase>,

    /// File whose first line is the passphrase.
    pub passphrase_file: Option<PathBuf>,

    /// Key store directory.
    pub gnupg_home: Option<PathBuf>,

    /// Run lintian as part of the upload gate check.
    pub lintian: bool,

    /// Upload gate target profile.
    pub profile: String,

    /// Filename suffix identifying the description record.
    pub description_suffix: String,

    pub gpg_program: PathBuf,
    pub dput_program: PathBuf,
}

impl Default for SignConfig {
    fn default() -> Self {
        Self {
            key_id: None,
            passphrase: None,
            passphrase_file: None,
            gnupg_home: None,
            lintian: true,
            profile: "local".to_string(),
            description_suffix: ".dsc".to_string(),
            gpg_program: PathBuf::from("gpg"),
            dput_program: PathBuf::from("dput"),
        }
    }
}

/// Keys present in a config file. Absent keys leave the base untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    key_id: Option<String>,
    passphrase_file: Option<PathBuf>,
    gnupg_home: Option<PathBuf>,
    lintian: Option<bool>,
    profile: Option<String>,
    description_suffix: Option<String>,
    gpg_program: Option<PathBuf>,
    dput_program: Option<PathBuf>,
}

impl ConfigFile {
    fn apply(self, base: SignConfig) -> SignConfig {
        SignConfig {
            key_id: self.key_id.or(base.key_id),
            passphrase: base.passphrase,
            passphrase_file: self.passphrase_file.or(base.passphrase_file),
            gnupg_home: self.gnupg_home.or(base.gnupg_home),
            lintian: self.lintian.unwrap_or(base.lintian),
            profile: self.profile.unwrap_or(base.profile),
            description_suffix: self.description_suffix.unwrap_or(base.description_suffix),
            gpg_program: self.gpg_program.unwrap_or(base.gpg_program),
            dput_program: self.dput_program.unwrap_or(base.dput_program),
        }
    }
}

fn env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

impl SignConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `DEBSIGN_KEYID` | Signing key id |
    /// | `DEBSIGN_PASSPHRASE` | Secret key passphrase |
    /// | `GNUPGHOME` | Key store directory |
    /// | `DEBSIGN_PROFILE` | Upload gate profile (default `local`) |
    /// | `DEBSIGN_LINTIAN` | `0`/`false` disables the lintian run |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            key_id: non_empty_env("DEBSIGN_KEYID"),
            passphrase: non_empty_env("DEBSIGN_PASSPHRASE").map(Passphrase::new),
            gnupg_home: non_empty_env("GNUPGHOME").map(PathBuf::from),
            profile: non_empty_env("DEBSIGN_PROFILE").unwrap_or(defaults.profile),
            lintian: std::env::var("DEBSIGN_LINTIAN")
                .ok()
                .and_then(|v| env_flag(&v))
                .unwrap_or(defaults.lintian),
            ..Self::default()
        }
    }

    /// Parse YAML config text over the defaults.
    pub fn from_yaml(text: &str) -> DebsignResult<Self> {
        Self::default().merge_yaml(text)
    }

    /// Load a YAML config file over the defaults.
    pub fn from_file(path: &Path) -> DebsignResult<Self> {
        Self::default().merge_file(path)
    }

    /// Apply the keys present in YAML config text; the rest keep their
    /// current values.
    pub fn merge_yaml(self, text: &str) -> DebsignResult<Self> {
        let file: ConfigFile = serde_yaml::from_str(text)
            .map_err(|e| DebsignError::config(format!("invalid configuration: {e}")))?;
        Ok(file.apply(self))
    }

    /// [`merge_yaml`](Self::merge_yaml) with the contents of a file.
    pub fn merge_file(self, path: &Path) -> DebsignResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| DebsignError::io(path, e))?;
        self.merge_yaml(&text).map_err(|e| match e {
            DebsignError::Config { message } => {
                DebsignError::config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    pub fn with_passphrase(mut self, passphrase: Passphrase) -> Self {
        self.passphrase = Some(passphrase);
        self
    }

    pub fn with_passphrase_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.passphrase_file = Some(path.into());
        self
    }

    pub fn with_gnupg_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.gnupg_home = Some(home.into());
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = profile.into();
        self
    }

    pub fn with_lintian(mut self, lintian: bool) -> Self {
        self.lintian = lintian;
        self
    }

    pub fn with_description_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.description_suffix = suffix.into();
        self
    }

    pub fn with_gpg_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.gpg_program = program.into();
        self
    }

    pub fn with_dput_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.dput_program = program.into();
        self
    }

    /// The passphrase to use: the explicit one, else the first line of
    /// `passphrase_file`, else none (the agent unlocks the key).
    pub fn resolve_passphrase(&self) -> DebsignResult<Option<Passphrase>> {
        if let Some(passphrase) = &self.passphrase {
            return Ok(Some(passphrase.clone()));
        }
        let Some(path) = &self.passphrase_file else {
            return Ok(None);
        };
        let text = fs::read_to_string(path).map_err(|e| DebsignError::io(path, e))?;
        let line = text.lines().next().unwrap_or_default();
        Ok(Some(Passphrase::new(line)))
    }

    pub fn name_pattern(&self) -> NamePattern {
        NamePattern::suffix(self.description_suffix.clone())
    }

    pub(crate) fn validate(&self) -> DebsignResult<()> {
        if self.profile.trim().is_empty() {
            return Err(DebsignError::config("upload profile must not be empty"));
        }
        if self.description_suffix.is_empty() {
            return Err(DebsignError::config(
                "description suffix must not be empty",
            ));
        }
        Ok(())
    }
}
