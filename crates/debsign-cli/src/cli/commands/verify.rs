//! `rdebsign verify` - verify an already signed .dsc/.changes pair.

use anyhow::{Context, Result};

use debsign_core::SigningOrchestrator;

use super::report_error;
use super::sign::print_report;
use crate::cli::args::WorkflowArgs;
use crate::exit_codes::SUCCESS;

pub fn cmd_verify(args: WorkflowArgs) -> i32 {
    match run_verify(&args) {
        Ok(()) => SUCCESS,
        Err(e) => report_error(&e, args.format),
    }
}

fn run_verify(args: &WorkflowArgs) -> Result<()> {
    let config = args.to_config()?;
    let report = SigningOrchestrator::from_config(&args.changes, &config)?
        .verify_only()
        .with_context(|| format!("verification of {} failed", args.changes.display()))?;
    print_report(&report, args.format);
    Ok(())
}
