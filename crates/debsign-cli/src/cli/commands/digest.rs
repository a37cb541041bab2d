//! `rdebsign digest` - size and digests as recorded in a .changes manifest.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use debsign_core::{compute_digests, FileDigests, HashAlgorithm};

use super::report_error;
use crate::cli::args::{DigestArgs, OutputFormat};
use crate::exit_codes::SUCCESS;

#[derive(Serialize)]
struct DigestRow {
    path: PathBuf,
    #[serde(flatten)]
    digests: FileDigests,
}

pub fn cmd_digest(args: DigestArgs) -> i32 {
    match run_digest(&args) {
        Ok(()) => SUCCESS,
        Err(e) => report_error(&e, args.format),
    }
}

fn run_digest(args: &DigestArgs) -> Result<()> {
    let rows = args
        .files
        .iter()
        .map(|path| {
            compute_digests(path).map(|digests| DigestRow {
                path: path.clone(),
                digests,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Text => {
            for row in &rows {
                println!("{}", row.path.display());
                println!("  size: {}", row.digests.size);
                for algorithm in HashAlgorithm::ALL {
                    println!("  {algorithm}: {}", row.digests.digest(algorithm));
                }
            }
        }
    }
    Ok(())
}
