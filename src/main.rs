//! collab binary entry point.
//!
//! Parses arguments, runs the selected command, and maps hard
//! failures to distinct exit codes so scripts and schedulers can
//! react without parsing output:
//!
//! - 0: success, including "review required" and "already running"
//! - 2: manifest missing or invalid
//! - 3: network timeout
//! - 4: authentication failure
//! - 5: merge conflicts needing a human
//! - 6: vault lock contention (merge only; sync treats it as a no-op)
//! - 1: anything else

use std::process::ExitCode;

use collabvault::cli;
use collabvault::core::lock::LockError;
use collabvault::engine::SyncError;
use collabvault::manifest::ManifestError;
use collabvault::ui::output;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::error(format!("{:#}", err));
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(sync_err) = err.downcast_ref::<SyncError>() {
        return match sync_err {
            SyncError::Manifest(_) => 2,
            SyncError::NetworkTimeout { .. } => 3,
            SyncError::AuthFailure { .. } => 4,
            SyncError::MergeConflict { .. } => 5,
            SyncError::Lock(LockError::AlreadyLocked) => 6,
            _ => 1,
        };
    }
    if err.downcast_ref::<ManifestError>().is_some() {
        return 2;
    }
    1
}
