//! init command - Turn this repository into a collab vault

use anyhow::{anyhow, bail, Context as _, Result};

use crate::cli::Context;
use crate::engine::ensure_manifest_tracked;
use crate::git::Git;
use crate::manifest::{manifest_exists, Manifest, MANIFEST_FILE_NAME};
use crate::ui::output;

/// Initialize a vault in this repository.
///
/// Writes the manifest with `identity` as the first master and the
/// current branch as the sync base. The manifest is left uncommitted
/// so init never sweeps unrelated worktree edits into a commit; the
/// first sync (or a manual commit) publishes it.
pub fn init(ctx: &Context, vault: &str, identity: &str, remote: &str) -> Result<()> {
    let verbosity = ctx.verbosity();
    let cwd = super::working_dir(ctx)?;
    let git = Git::open(&cwd).context("not inside a git repository")?;
    let vault_root = git
        .work_dir()
        .context("cannot create a vault in a bare repository")?
        .to_path_buf();

    if manifest_exists(&vault_root) {
        bail!(
            "this repository is already a vault ({} exists); run `collab join` to become a member",
            MANIFEST_FILE_NAME
        );
    }

    let base_branch = git.current_branch()?.ok_or_else(|| {
        anyhow!("HEAD is detached; check out the branch the vault should sync first")
    })?;

    let manifest = Manifest::bootstrap(vault, identity, remote, base_branch.clone());
    manifest.save(&vault_root)?;

    // Pre-existing repositories sometimes ignore dotfiles wholesale
    if ensure_manifest_tracked(&git, &vault_root)? {
        output::print(
            format!("amended .gitignore so {} stays tracked", MANIFEST_FILE_NAME),
            verbosity,
        );
    }

    output::success(
        format!("initialized vault '{}' on branch '{}'", vault, base_branch),
        verbosity,
    );
    output::print(
        format!("you are its first master ({})", identity),
        verbosity,
    );
    output::print(
        format!("commit {} and push to share the vault", MANIFEST_FILE_NAME),
        verbosity,
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn quiet_ctx(dir: &std::path::Path) -> Context {
        Context {
            cwd: Some(dir.to_path_buf()),
            debug: false,
            quiet: true,
        }
    }

    fn repo_fixture() -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "tester").unwrap();
        config.set_str("user.email", "tester@example.com").unwrap();

        std::fs::write(tmp.path().join("notes.md"), "seed\n").unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "seed", &tree, &[])
            .unwrap();

        let root = tmp.path().to_path_buf();
        (tmp, root)
    }

    #[test]
    fn init_writes_a_loadable_manifest() {
        let (_tmp, root) = repo_fixture();
        let ctx = quiet_ctx(&root);

        init(&ctx, "team-docs", "ada@example.com", "origin").unwrap();

        let manifest = Manifest::load(&root).unwrap();
        assert_eq!(manifest.vault, "team-docs");
        assert_eq!(manifest.members.len(), 1);
        assert_eq!(manifest.members[0].identity, "ada@example.com");
        assert_eq!(manifest.sync.remote, "origin");
    }

    #[test]
    fn init_refuses_a_second_vault() {
        let (_tmp, root) = repo_fixture();
        let ctx = quiet_ctx(&root);

        init(&ctx, "team-docs", "ada@example.com", "origin").unwrap();
        let err = init(&ctx, "other", "bob@example.com", "origin").unwrap_err();
        assert!(err.to_string().contains("already a vault"));
    }

    #[test]
    fn init_unhides_an_ignored_manifest() {
        let (_tmp, root) = repo_fixture();
        std::fs::write(root.join(".gitignore"), ".*\n").unwrap();
        let ctx = quiet_ctx(&root);

        init(&ctx, "team-docs", "ada@example.com", "origin").unwrap();

        let ignore = std::fs::read_to_string(root.join(".gitignore")).unwrap();
        assert!(ignore.contains(&format!("!{}", MANIFEST_FILE_NAME)));
    }

    #[test]
    fn init_outside_a_repository_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = quiet_ctx(tmp.path());

        let err = init(&ctx, "team-docs", "ada@example.com", "origin").unwrap_err();
        assert!(err.to_string().contains("not inside a git repository"));
    }
}
