//! join command - Join an existing vault as a collaborator

use anyhow::Result;

use crate::cli::Context;
use crate::core::types::UtcTimestamp;
use crate::engine::VaultContext;
use crate::manifest::{Member, Role};
use crate::ui::output;

/// Add `identity` to the vault's member list as a collaborator.
///
/// The manifest is shared state, so the membership edit travels like
/// any other shared-state change: the next sync stages it on the
/// review branch and a master lands it.
pub fn join(ctx: &Context, identity: &str) -> Result<()> {
    let verbosity = ctx.verbosity();
    let cwd = super::working_dir(ctx)?;
    let mut vault = VaultContext::open(&cwd)?;

    vault.manifest.add_member(Member {
        identity: identity.to_string(),
        role: Role::Collaborator,
        joined_at: UtcTimestamp::now(),
    })?;
    vault.manifest.save(&vault.vault_root)?;

    output::success(
        format!(
            "'{}' joined vault '{}' as a collaborator",
            identity, vault.manifest.vault
        ),
        verbosity,
    );
    output::print(
        "the membership change reaches the team after the next sync and review",
        verbosity,
    );

    Ok(())
}
