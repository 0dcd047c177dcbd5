//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls the engine (or the manifest layer) to do the work
//! 3. Formats and displays output
//!
//! Handlers do NOT perform repository mutations directly.
//!
//! # Async Commands
//!
//! Commands that touch the network (sync, merge, daemon) are async
//! because fetch, push, and review-host calls involve network I/O.
//! Their handlers build a tokio runtime and `block_on` the async
//! implementation.

mod completion;
mod daemon;
mod init;
mod join;
mod members;
mod merge;
mod status;
mod sync;

// Re-export command functions for testing and direct invocation
pub use completion::completion;
pub use daemon::daemon;
pub use init::init;
pub use join::join;
pub use members::members;
pub use merge::merge;
pub use status::status;
pub use sync::sync;

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cli::args::Command;
use crate::cli::Context;
use crate::engine::VaultContext;
use crate::review::{host_for_remote, ReviewError, ReviewGateway};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Init {
            vault,
            identity,
            remote,
        } => init::init(ctx, &vault, &identity, &remote),
        Command::Join { identity } => join::join(ctx, &identity),
        Command::Sync => sync::sync(ctx),
        Command::Merge => merge::merge(ctx),
        Command::Status => status::status(ctx),
        Command::Members { add, role, remove } => {
            members::members(ctx, add.as_deref(), role, remove.as_deref())
        }
        Command::Daemon { interval } => daemon::daemon(ctx, interval),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// Resolve the directory a command operates in.
pub(crate) fn working_dir(ctx: &Context) -> Result<PathBuf> {
    match &ctx.cwd {
        Some(path) => Ok(path.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

/// Build the review gateway from the environment, if possible.
///
/// Returns `None` when no token is configured, the vault cannot be
/// opened, or the sync remote is not a GitHub URL. A missing gateway
/// degrades sync to offline behavior: deferred files still park on
/// the review branch, and the review request is created on a later
/// cycle once a host is reachable.
pub(crate) fn review_gateway(vault_dir: &Path) -> Option<ReviewGateway> {
    // Open errors are reported by the command itself, not here
    let vault = VaultContext::open(vault_dir).ok()?;
    let url = match vault.remote_url() {
        Ok(Some(url)) => url,
        _ => {
            tracing::debug!("sync remote has no URL; review requests disabled");
            return None;
        }
    };

    match host_for_remote(&url) {
        Ok(host) => Some(ReviewGateway::new(host)),
        Err(ReviewError::AuthRequired) => {
            tracing::debug!("no review host token in the environment");
            None
        }
        Err(ReviewError::NotImplemented) => {
            tracing::debug!(url = %url, "remote has no review host; branch-only review");
            None
        }
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "review requests disabled");
            None
        }
    }
}
