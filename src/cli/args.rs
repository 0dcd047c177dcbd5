//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Collab - shared knowledge vaults on top of git
#[derive(Parser, Debug)]
#[command(name = "collab")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if collab was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Turn this repository into a collab vault
    #[command(
        name = "init",
        long_about = "Turn this repository into a collab vault.\n\n\
            Writes the .collab.yaml manifest with you as the first master and the \
            current branch as the sync base. The manifest is ordinary tracked \
            content: commit it and push, and everyone who clones the repository \
            can join.\n\n\
            If the repository's ignore rules would hide the manifest, init appends \
            a negation rule to .gitignore so the manifest stays versioned.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Create a vault on the current branch
    collab init --vault team-docs --identity ada@example.com

    # Sync against a remote other than origin
    collab init --vault team-docs --identity ada@example.com --remote upstream"
    )]
    Init {
        /// Name for the vault
        #[arg(long)]
        vault: String,

        /// Your identity, usually an email address
        #[arg(long)]
        identity: String,

        /// Remote the vault syncs with
        #[arg(long, default_value = "origin")]
        remote: String,
    },

    /// Join an existing vault as a collaborator
    #[command(
        name = "join",
        long_about = "Join an existing vault as a collaborator.\n\n\
            Adds your identity to the manifest's member list. The manifest is \
            shared state, so the membership change travels through the normal \
            review path: your next sync stages it on the review branch, and a \
            master lands it with `collab merge`."
    )]
    Join {
        /// Your identity, usually an email address
        #[arg(long)]
        identity: String,
    },

    /// Run one sync cycle now
    #[command(
        name = "sync",
        long_about = "Run one sync cycle against the vault's remote.\n\n\
            Pulls the remote base branch, classifies every change touched since \
            the last sync, auto-merges additive edits, and publishes the merged \
            result. Shared-state edits that diverged from the team are parked on \
            the review branch and a review request is opened (or refreshed) for \
            them; they do not block the rest of the sync.\n\n\
            The same cycle runs unattended under `collab daemon`. Running it \
            while another session holds the vault lock is a no-op, not an error.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Sync once, printing the session summary
    collab sync

    # Sync quietly from a script; exit code is 0 even when review is required
    collab sync -q

COMMON SCENARIOS:
    A file you edited was replaced by the team version:
        your copy is saved under .git/collab/recovery/ and the path is
        listed in the session summary"
    )]
    Sync,

    /// Land the review branch onto the base branch
    #[command(
        name = "merge",
        long_about = "Land the approved review branch onto the base branch.\n\n\
            Replays the review branch's commits onto the current base tip, pushes \
            the result, and retires the review branch and its review request. \
            Masters run this after approving the changes on the review host.\n\n\
            If a replayed commit conflicts with the base, the merge stops before \
            moving any branch and lists the conflicted paths."
    )]
    Merge,

    /// Show vault membership and the last sync outcome
    #[command(
        name = "status",
        long_about = "Show the vault's manifest summary, the content fingerprint \
            of the current head, and the outcome of the most recent sync session. \
            Reads only local state; never touches the network."
    )]
    Status,

    /// List or edit vault membership
    #[command(
        name = "members",
        long_about = "List or edit vault membership.\n\n\
            With no flags, prints every member with their role and join date. \
            --add and --remove edit the manifest in place; like any other \
            shared-state change, the edit reaches the team through sync and \
            review. The last master cannot be removed.",
        after_help = "\
WORKFLOW EXAMPLES:
    # List members
    collab members

    # Add a collaborator
    collab members --add grace@example.com

    # Add another master
    collab members --add ada@example.com --role master

    # Remove a member
    collab members --remove grace@example.com"
    )]
    Members {
        /// Add a member with this identity
        #[arg(long, value_name = "IDENTITY", conflicts_with = "remove")]
        add: Option<String>,

        /// Role for the added member
        #[arg(long, value_enum, requires = "add")]
        role: Option<RoleArg>,

        /// Remove the member with this identity
        #[arg(long, value_name = "IDENTITY")]
        remove: Option<String>,
    },

    /// Run the background sync scheduler in the foreground
    #[command(
        name = "daemon",
        long_about = "Run the background sync scheduler in the foreground.\n\n\
            Triggers a sync cycle at the manifest's interval until interrupted. \
            Ctrl-C stops the scheduler after any in-flight cycle finishes. An \
            interval of zero (in the manifest or via --interval) disables \
            scheduling; manual `collab sync` still works.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Sync at the manifest's interval
    collab daemon

    # Override the interval for this run
    collab daemon --interval 5"
    )]
    Daemon {
        /// Minutes between cycles, overriding the manifest
        #[arg(long, value_name = "MINUTES")]
        interval: Option<u32>,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        long_about = "Generate shell completion scripts.\n\n\
            Outputs a completion script for the specified shell to stdout. \
            Redirect to the appropriate location for your shell.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash
    collab completion bash > ~/.local/share/bash-completion/completions/collab

    # Zsh
    collab completion zsh > ~/.zfunc/_collab

    # Fish
    collab completion fish > ~/.config/fish/completions/collab.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Roles accepted by `members --role`.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    /// Can approve shared-state changes and administer membership
    Master,
    /// Can contribute content and trigger syncs
    Collaborator,
}

/// Supported shells for completion generation.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_init_with_defaults() {
        let cli = Cli::try_parse_from([
            "collab",
            "init",
            "--vault",
            "team-docs",
            "--identity",
            "ada@example.com",
        ])
        .unwrap();
        match cli.command {
            Command::Init {
                vault,
                identity,
                remote,
            } => {
                assert_eq!(vault, "team-docs");
                assert_eq!(identity, "ada@example.com");
                assert_eq!(remote, "origin");
            }
            other => panic!("expected init, got {:?}", other),
        }
    }

    #[test]
    fn members_role_requires_add() {
        let result = Cli::try_parse_from(["collab", "members", "--role", "master"]);
        assert!(result.is_err());
    }

    #[test]
    fn members_add_and_remove_conflict() {
        let result = Cli::try_parse_from([
            "collab",
            "members",
            "--add",
            "a@example.com",
            "--remove",
            "b@example.com",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::try_parse_from(["collab", "sync", "--debug", "-q"]).unwrap();
        assert!(cli.debug);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Sync));
    }

    #[test]
    fn daemon_interval_is_optional() {
        let cli = Cli::try_parse_from(["collab", "daemon", "--interval", "5"]).unwrap();
        match cli.command {
            Command::Daemon { interval } => assert_eq!(interval, Some(5)),
            other => panic!("expected daemon, got {:?}", other),
        }
    }
}
