//! cli::commands::merge
//!
//! Land the approved review branch onto the base branch.
//!
//! # Design
//!
//! The handler wraps [`crate::engine::promote_review`]. Promotion is a
//! master-side action: approve the review request on the host first,
//! then run `collab merge` to replay the staged commits onto the base
//! and retire the review branch.

use anyhow::Result;

use crate::cli::Context;
use crate::engine::promote_review;
use crate::ui::output::{self, format_count, format_list};

/// Run the merge command.
///
/// This is a synchronous wrapper that uses tokio to run the async implementation.
pub fn merge(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(merge_async(ctx))
}

/// Async implementation of merge.
async fn merge_async(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    let dir = super::working_dir(ctx)?;
    let gateway = super::review_gateway(&dir);

    let report = promote_review(&dir, gateway).await?;

    if report.commits.is_empty() {
        output::print(
            "review branch had nothing new; base branch is unchanged",
            verbosity,
        );
    } else {
        output::success(
            format!(
                "landed {} onto the base branch",
                format_count(report.commits.len(), "review commit")
            ),
            verbosity,
        );
        for commit in &report.commits {
            output::print(
                format!("  {} {}", commit.oid.short(8), commit.summary),
                verbosity,
            );
        }
    }

    if !report.files.is_empty() {
        output::print(
            format!("{} now shared:", format_count(report.files.len(), "file")),
            verbosity,
        );
        output::print(format_list(&report.files, "  - "), verbosity);
    }

    if report.pushed {
        output::print(
            format!("pushed base branch at {}", report.new_base.short(8)),
            verbosity,
        );
    }
    if report.review_closed {
        output::print("review request closed", verbosity);
    }
    if report.review_deleted {
        output::print("remote review branch deleted", verbosity);
    }

    Ok(())
}
