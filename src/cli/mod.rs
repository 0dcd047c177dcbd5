//! cli
//!
//! Command-line interface layer for collab.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Wire tracing to stderr
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to
//! the [`crate::engine`] for execution. Handlers validate arguments, call
//! the engine, and format output; no vault mutation happens here.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, Shell};

use std::path::PathBuf;

use anyhow::Result;

use crate::ui::output::Verbosity;

/// Flags shared by every command handler.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory to operate in; `None` means the process cwd.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Minimal output.
    pub quiet: bool,
}

impl Context {
    /// Output verbosity derived from the flag pair.
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let ctx = Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };

    commands::dispatch(cli.command, &ctx)
}

/// Wire tracing to stderr.
///
/// `RUST_LOG` takes precedence when set; otherwise `--debug` lowers the
/// crate's level from warn to debug. User-facing output goes through
/// [`crate::ui::output`], not tracing, so the default stays quiet.
fn init_tracing(debug: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default = if debug { "collabvault=debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // try_init so tests invoking run() repeatedly do not panic
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();
}
