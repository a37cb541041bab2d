//! Process exit codes.
//! Codes 3-7 come from `DebsignError::exit_code()` and are part of the same contract.

use debsign_core::DebsignError;

pub const SUCCESS: i32 = 0;
pub const SIGNING_DECLINED: i32 = 1; // Provider produced no signature
pub const CONFIG_ERROR: i32 = 2; // Bad arguments, config file or profile

/// Exit code for a failed command.
pub fn for_error(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DebsignError>()
        .map_or(CONFIG_ERROR, DebsignError::exit_code)
}
