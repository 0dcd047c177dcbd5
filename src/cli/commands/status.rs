//! status command - Show vault membership and the last sync outcome
//!
//! Reads only local state; never touches the network.

use anyhow::Result;

use crate::cli::Context;
use crate::core::session::{SessionLog, SyncPhase, SyncSession};
use crate::core::types::{Fingerprint, RefName};
use crate::engine::VaultContext;
use crate::ui::output::{self, format_count, Verbosity};

/// Run the status command.
pub fn status(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    let cwd = super::working_dir(ctx)?;
    let vault = VaultContext::open(&cwd)?;
    let manifest = &vault.manifest;

    output::print(format!("vault '{}'", manifest.vault), verbosity);
    output::print(
        format!(
            "  base branch:  {} ({})",
            manifest.sync.base_branch, manifest.sync.remote
        ),
        verbosity,
    );
    match manifest.sync.interval_minutes {
        0 => output::print("  scheduler:    disabled (interval 0)", verbosity),
        minutes => output::print(
            format!("  scheduler:    every {} minutes", minutes),
            verbosity,
        ),
    }
    output::print(
        format!(
            "  members:      {} ({})",
            manifest.members.len(),
            format_count(manifest.master_count(), "master")
        ),
        verbosity,
    );
    for member in &manifest.members {
        output::print(
            format!(
                "    {:<13} {:<24} joined {}",
                member.role.to_string(),
                member.identity,
                member.joined_at.as_datetime().date_naive()
            ),
            verbosity,
        );
    }

    let head = vault.git.head_oid()?;
    let fingerprint = Fingerprint::compute(&vault.git.tree_entries(&head)?);
    output::print(
        format!(
            "head {} (content fingerprint {})",
            head.short(8),
            fingerprint.as_str().get(..16).unwrap_or(fingerprint.as_str())
        ),
        verbosity,
    );

    print_review_state(&vault, verbosity)?;
    print_last_session(&vault, verbosity);

    Ok(())
}

/// Report what is parked on the review branch, if anything.
fn print_review_state(vault: &VaultContext, verbosity: Verbosity) -> Result<()> {
    let git = &vault.git;
    let local = git.try_resolve_ref(RefName::for_branch(&vault.review_branch).as_str())?;
    let remote = git.try_resolve_ref(
        RefName::for_remote(vault.remote_name(), &vault.review_branch).as_str(),
    )?;

    let tip = match (local, remote) {
        (None, None) => {
            output::print("review: nothing awaiting review", verbosity);
            return Ok(());
        }
        // Whichever side is further along carries the full staging
        (Some(l), Some(r)) => {
            if git.is_ancestor(&l, &r)? {
                r
            } else {
                l
            }
        }
        (Some(l), None) => l,
        (None, Some(r)) => r,
    };

    let base_ref = RefName::for_branch(vault.base_branch());
    let files = match git.try_resolve_ref(base_ref.as_str())? {
        Some(base_tip) => match git.merge_base(&base_tip, &tip)? {
            Some(point) => git.diff_names(Some(&point), &tip)?,
            None => git.diff_names(None, &tip)?,
        },
        None => git.diff_names(None, &tip)?,
    };

    if files.is_empty() {
        output::print(
            "review: review branch exists but holds nothing new; `collab merge` will retire it",
            verbosity,
        );
    } else {
        output::print(
            format!(
                "review: {} parked on '{}' awaiting a master",
                format_count(files.len(), "shared file"),
                vault.review_branch
            ),
            verbosity,
        );
        for entry in &files {
            output::print(format!("  - {}", entry.path), verbosity);
        }
    }

    Ok(())
}

/// Summarize the most recent sync session from the rolling log.
fn print_last_session(vault: &VaultContext, verbosity: Verbosity) {
    let last = match SessionLog::last(&vault.paths) {
        Ok(last) => last,
        Err(err) => {
            output::warn(format!("session log unreadable: {}", err), verbosity);
            return;
        }
    };

    match last {
        None => output::print("last sync: never", verbosity),
        Some(session) => {
            output::print(format!("last sync: {}", describe(&session)), verbosity);
            if let Some(error) = &session.error {
                output::print(format!("  error: {}", error), verbosity);
            }
        }
    }
}

fn describe(session: &SyncSession) -> String {
    let when = session
        .finished_at
        .map(|t| t.to_string())
        .unwrap_or_else(|| session.started_at.to_string());

    match session.phase {
        SyncPhase::Done => format!(
            "session {} done at {} ({} auto-merged, {} deferred, {} recovered)",
            session.id.short(),
            when,
            session.auto_merged.len(),
            session.deferred.len(),
            session.recovered.len()
        ),
        SyncPhase::Failed => format!("session {} failed at {}", session.id.short(), when),
        ref other => format!(
            "session {} interrupted while {}",
            session.id.short(),
            other
        ),
    }
}
