//! completion command - Generate shell completion scripts

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, shells, Generator};

use crate::cli::args::{Cli, Shell};

/// Write a completion script for `shell` to stdout.
pub fn completion(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    match shell {
        Shell::Bash => emit(shells::Bash, &mut cmd, &name),
        Shell::Zsh => emit(shells::Zsh, &mut cmd, &name),
        Shell::Fish => emit(shells::Fish, &mut cmd, &name),
        Shell::PowerShell => emit(shells::PowerShell, &mut cmd, &name),
    }

    Ok(())
}

fn emit(shell: impl Generator, cmd: &mut clap::Command, name: &str) {
    generate(shell, cmd, name, &mut std::io::stdout());
}
