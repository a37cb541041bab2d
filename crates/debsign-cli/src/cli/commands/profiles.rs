//! `rdebsign profiles` - upload profiles (dput hosts).

use anyhow::Result;

use debsign_core::{DputGate, UploadGate};

use super::report_error;
use crate::cli::args::{OutputFormat, ProfilesArgs};
use crate::exit_codes::SUCCESS;

pub fn cmd_profiles(args: ProfilesArgs) -> i32 {
    match run_profiles(&args) {
        Ok(()) => SUCCESS,
        Err(e) => report_error(&e, args.format),
    }
}

fn run_profiles(args: &ProfilesArgs) -> Result<()> {
    let mut gate = DputGate::new();
    if let Some(dput) = &args.dput {
        gate = gate.with_program(dput);
    }
    let profiles = gate.profiles()?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&profiles)?),
        OutputFormat::Text => {
            for profile in &profiles {
                println!("{profile}");
            }
        }
    }
    Ok(())
}
