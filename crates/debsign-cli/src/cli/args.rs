use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rdebsign",
    version,
    about = "Sign Debian .dsc/.changes upload artifacts and verify them before upload"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log line format on stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign the .dsc, rewrite its checksums in the .changes, sign the .changes and verify
    Sign(WorkflowArgs),
    /// Verify an already signed .dsc/.changes pair
    Verify(WorkflowArgs),
    /// Print size and MD5/SHA-1/SHA-256 digests of files
    Digest(DigestArgs),
    /// List upload profiles known to dput
    Profiles(ProfilesArgs),
    Version,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    /// The .changes manifest
    pub changes: PathBuf,

    /// YAML config file (flags override its values)
    #[arg(long, env = "DEBSIGN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Signing key id or fingerprint
    #[arg(long, short = 'k')]
    pub keyid: Option<String>,

    /// File holding the key passphrase on its first line
    #[arg(long)]
    pub passphrase_file: Option<PathBuf>,

    /// GnuPG home directory
    #[arg(long)]
    pub gnupghome: Option<PathBuf>,

    /// dput host used for the upload check
    #[arg(long)]
    pub profile: Option<String>,

    /// Skip the lintian run during the upload check
    #[arg(long)]
    pub no_lintian: bool,

    /// Filename suffix of the description record
    #[arg(long)]
    pub description_suffix: Option<String>,

    /// gpg executable
    #[arg(long, env = "DEBSIGN_GPG")]
    pub gpg: Option<PathBuf>,

    /// dput executable
    #[arg(long, env = "DEBSIGN_DPUT")]
    pub dput: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct DigestArgs {
    /// Files to digest
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ProfilesArgs {
    /// dput executable
    #[arg(long, env = "DEBSIGN_DPUT")]
    pub dput: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}
