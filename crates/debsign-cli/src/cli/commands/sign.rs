//! `rdebsign sign` - sign a .dsc/.changes pair and verify it.

use anyhow::Result;
use serde_json::json;

use debsign_core::{Outcome, SigningOrchestrator, VerificationReport};

use super::report_error;
use crate::cli::args::{OutputFormat, WorkflowArgs};
use crate::exit_codes::{SIGNING_DECLINED, SUCCESS};

pub fn cmd_sign(args: WorkflowArgs) -> i32 {
    match run_sign(&args) {
        Ok(code) => code,
        Err(e) => report_error(&e, args.format),
    }
}

fn run_sign(args: &WorkflowArgs) -> Result<i32> {
    let config = args.to_config()?;
    let orchestrator = SigningOrchestrator::from_config(&args.changes, &config)?;

    match orchestrator.run()? {
        Outcome::Verified(report) => {
            print_report(&report, args.format);
            Ok(SUCCESS)
        }
        Outcome::Declined(stage) => {
            match args.format {
                OutputFormat::Json => {
                    println!("{}", json!({ "status": "declined", "stage": stage }));
                }
                OutputFormat::Text => {
                    eprintln!("signing declined: no signature was produced for the {stage}");
                }
            }
            Ok(SIGNING_DECLINED)
        }
    }
}

pub(crate) fn print_report(report: &VerificationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!("{}", json!({ "status": "verified", "report": report }));
        }
        OutputFormat::Text => {
            let action = if report.verification_only {
                "Verified (already signed)"
            } else {
                "Signed and verified"
            };
            println!("{action}: {}", report.manifest.display());
            if let (Some(source), Some(version)) = (&report.source, &report.version) {
                println!("  package:     {source} {version}");
            }
            println!("  description: {}", report.description.display());
            println!("  size:        {}", report.digests.size);
            println!("  sha256:      {}", report.digests.sha256);
            println!("  signer:      {}", signer_label(&report.manifest_signer));
            println!("  profile:     {}", report.profile);
        }
    }
}

fn signer_label(identity: &debsign_core::SignerIdentity) -> String {
    match &identity.user_id {
        Some(uid) => format!("{} ({uid})", identity.key_id),
        None => identity.key_id.clone(),
    }
}
