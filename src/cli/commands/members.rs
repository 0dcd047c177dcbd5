//! members command - List or edit vault membership

use anyhow::Result;

use crate::cli::args::RoleArg;
use crate::cli::Context;
use crate::core::types::UtcTimestamp;
use crate::engine::VaultContext;
use crate::manifest::{Member, Role};
use crate::ui::output;

/// Run the members command.
///
/// With no flags, lists membership. `--add` and `--remove` edit the
/// manifest in place; the edit propagates through sync and review like
/// any other shared-state change.
pub fn members(
    ctx: &Context,
    add: Option<&str>,
    role: Option<RoleArg>,
    remove: Option<&str>,
) -> Result<()> {
    let verbosity = ctx.verbosity();
    let cwd = super::working_dir(ctx)?;
    let mut vault = VaultContext::open(&cwd)?;

    if let Some(identity) = add {
        let role = match role.unwrap_or(RoleArg::Collaborator) {
            RoleArg::Master => Role::Master,
            RoleArg::Collaborator => Role::Collaborator,
        };
        vault.manifest.add_member(Member {
            identity: identity.to_string(),
            role,
            joined_at: UtcTimestamp::now(),
        })?;
        vault.manifest.save(&vault.vault_root)?;
        output::success(format!("added {} '{}'", role, identity), verbosity);
        return Ok(());
    }

    if let Some(identity) = remove {
        let removed = vault.manifest.remove_member(identity)?;
        vault.manifest.save(&vault.vault_root)?;
        output::success(
            format!("removed {} '{}'", removed.role, removed.identity),
            verbosity,
        );
        return Ok(());
    }

    for member in &vault.manifest.members {
        output::print(
            format!(
                "{:<13} {:<24} joined {}",
                member.role.to_string(),
                member.identity,
                member.joined_at.as_datetime().date_naive()
            ),
            verbosity,
        );
    }

    Ok(())
}
