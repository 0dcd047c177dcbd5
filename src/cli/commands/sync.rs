//! cli::commands::sync
//!
//! Run one sync cycle against the vault's remote.
//!
//! # Design
//!
//! The handler is a thin wrapper over [`crate::engine::run_cycle`]:
//! it builds the review gateway from the environment, runs the cycle,
//! and prints the session summary. "Review required" is a successful
//! outcome here; only hard failures surface as errors.

use anyhow::Result;

use crate::cli::Context;
use crate::core::session::{ReviewAction, SyncSession};
use crate::engine::{run_cycle, SyncOutcome};
use crate::ui::output::{self, format_count, format_list, Verbosity};

/// Run the sync command.
///
/// This is a synchronous wrapper that uses tokio to run the async implementation.
pub fn sync(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(sync_async(ctx))
}

/// Async implementation of sync.
async fn sync_async(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    let dir = super::working_dir(ctx)?;
    let gateway = super::review_gateway(&dir);

    match run_cycle(&dir, gateway).await? {
        SyncOutcome::AlreadyRunning => {
            output::print(
                "another sync session holds the vault lock; nothing to do",
                verbosity,
            );
            Ok(())
        }
        SyncOutcome::Completed(report) => {
            print_summary(&report.session, report.pushed, verbosity);
            Ok(())
        }
    }
}

fn print_summary(session: &SyncSession, pushed: bool, verbosity: Verbosity) {
    for warning in &session.warnings {
        output::warn(warning, verbosity);
    }

    let merged = session.auto_merged.len();
    let deferred = session.deferred.len();
    let recovered = session.recovered.len();

    if merged == 0 && deferred == 0 && recovered == 0 {
        output::print(
            format!("session {}: already in sync", session.id.short()),
            verbosity,
        );
    } else {
        output::print(
            format!(
                "session {}: {} auto-merged, {} deferred, {} recovered",
                session.id.short(),
                merged,
                deferred,
                recovered
            ),
            verbosity,
        );
    }

    if !session.auto_merged.is_empty() {
        output::print(format_list(&session.auto_merged, "  merged   "), verbosity);
    }
    if !session.recovered.is_empty() {
        output::print(format_list(&session.recovered, "  recovered "), verbosity);
    }

    if !session.deferred.is_empty() {
        output::print(
            format!(
                "review required for {}:",
                format_count(deferred, "shared file")
            ),
            verbosity,
        );
        output::print(format_list(&session.deferred, "  - "), verbosity);
        if let Some(review) = &session.review {
            let verb = match review.action {
                ReviewAction::Opened => "opened",
                ReviewAction::Updated => "updated",
                ReviewAction::Unchanged => "already covers them",
            };
            match &review.url {
                Some(url) => output::print(
                    format!("  review request #{} {}: {}", review.id, verb, url),
                    verbosity,
                ),
                None => output::print(
                    format!("  review request #{} {}", review.id, verb),
                    verbosity,
                ),
            }
        }
    }

    if pushed {
        output::success("published merged result to the team", verbosity);
    } else if merged + deferred + recovered > 0 {
        output::print("nothing new to publish", verbosity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::VaultPath;

    #[test]
    fn review_required_is_not_an_error() {
        let mut session = SyncSession::new();
        session.deferred.push(VaultPath::new("schema/model.yaml").unwrap());
        session.complete();
        assert!(session.review_required());

        // Printing must not panic regardless of verbosity
        print_summary(&session, false, Verbosity::Quiet);
        print_summary(&session, true, Verbosity::Normal);
    }
}
