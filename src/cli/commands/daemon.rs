//! daemon command - Run the background sync scheduler in the foreground

use std::time::Duration;

use anyhow::Result;

use crate::cli::Context;
use crate::engine::VaultContext;
use crate::sched::{Scheduler, SchedulerConfig};
use crate::ui::output;

/// Run the daemon command.
///
/// This is a synchronous wrapper that uses tokio to run the async implementation.
pub fn daemon(ctx: &Context, interval: Option<u32>) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(daemon_async(ctx, interval))
}

/// Async implementation of daemon.
///
/// Validates the vault up front, starts the scheduler at the manifest
/// interval (or the `--interval` override), and stops it gracefully on
/// ctrl-c. An interval of zero means there is nothing to schedule.
async fn daemon_async(ctx: &Context, interval: Option<u32>) -> Result<()> {
    let verbosity = ctx.verbosity();
    let dir = super::working_dir(ctx)?;

    let minutes = {
        let vault = VaultContext::open(&dir)?;
        interval.unwrap_or(vault.manifest.sync.interval_minutes)
    };
    let gateway = super::review_gateway(&dir);

    let config = SchedulerConfig::new(&dir, Duration::from_secs(u64::from(minutes) * 60));
    let handle = match Scheduler::start(config, gateway) {
        Some(handle) => handle,
        None => {
            output::print(
                "sync interval is zero; nothing to schedule (run `collab sync` manually)",
                verbosity,
            );
            return Ok(());
        }
    };

    output::print(
        format!("syncing every {} minutes; ctrl-c to stop", minutes),
        verbosity,
    );

    tokio::signal::ctrl_c().await?;
    output::print("stopping after any in-flight cycle", verbosity);
    handle.stop().await;

    Ok(())
}
