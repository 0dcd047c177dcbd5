//! Promotion of the review branch.
//!
//! A master runs `collab merge` after approving the review request.
//! The deferred commits replay onto the current base tip one by one,
//! the base branch advances and pushes, and the review branch retires
//! on both ends.
//!
//! The replay builds objects only. No ref moves until every commit has
//! replayed cleanly, so a conflict aborts with the repository exactly
//! as it was.

use std::path::Path;

use crate::core::lock::{LockError, VaultLock};
use crate::core::types::{Oid, RefName, VaultPath};
use crate::git::{CommitInfo, GitError};
use crate::review::ReviewGateway;

use super::{SyncError, VaultContext};

/// What a promotion did.
#[derive(Debug)]
pub struct PromoteReport {
    /// The commits that landed on the base branch, in order.
    pub commits: Vec<CommitInfo>,
    /// Paths the promotion changed.
    pub files: Vec<VaultPath>,
    /// The base branch tip after landing.
    pub new_base: Oid,
    /// Whether the base branch was pushed.
    pub pushed: bool,
    /// Whether an open review request was closed on the host.
    pub review_closed: bool,
    /// Whether the remote review branch was deleted.
    pub review_deleted: bool,
}

/// Merge the review branch into the base branch and retire it.
pub async fn promote_review(
    vault_dir: &Path,
    gateway: Option<ReviewGateway>,
) -> Result<PromoteReport, SyncError> {
    let ctx = VaultContext::open(vault_dir)?;

    let Some(_lock) = VaultLock::try_acquire(&ctx.paths)? else {
        return Err(SyncError::Lock(LockError::AlreadyLocked));
    };

    preflight(&ctx)?;

    let remote_handle = ctx.remote();
    let remote_name = ctx.remote_name().to_string();
    let base_branch = ctx.base_branch().clone();

    remote_handle.fetch(&remote_name).await?;

    let replay = replay_review(&ctx)?;
    land_promotion(&ctx, &replay)?;
    tracing::info!(
        new_base = %replay.new_head,
        commits = replay.commits.len(),
        "review content landed on the base branch"
    );

    let pushed = if replay.remote_base.as_ref() == Some(&replay.new_head) {
        false
    } else {
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", base_branch);
        remote_handle.push(&remote_name, &refspec).await?;
        true
    };

    let review_deleted = if replay.remote_review.is_some() {
        let refspec = format!(":refs/heads/{}", ctx.review_branch);
        match remote_handle.push(&remote_name, &refspec).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "could not delete the remote review branch");
                false
            }
        }
    } else {
        false
    };

    cleanup_local(&ctx, &replay);

    let review_closed = match &gateway {
        Some(gw) => close_review(gw, &ctx).await,
        None => false,
    };

    let files = ctx
        .git
        .diff_names(Some(&replay.target_base), &replay.new_head)?
        .into_iter()
        .map(|e| e.path)
        .collect();

    Ok(PromoteReport {
        commits: replay.commits,
        files,
        new_base: replay.new_head,
        pushed,
        review_closed,
        review_deleted,
    })
}

/// Refuse to promote from anywhere but a clean base branch checkout.
fn preflight(ctx: &VaultContext) -> Result<(), SyncError> {
    let git = &ctx.git;

    let state = git.state();
    if state.is_in_progress() {
        return Err(GitError::OperationInProgress { operation: state }.into());
    }

    let branch = git.current_branch()?.ok_or(SyncError::DetachedHead)?;
    if &branch != ctx.base_branch() {
        return Err(SyncError::NotOnBaseBranch {
            current: branch,
            base: ctx.base_branch().clone(),
        });
    }

    // Untracked files survive the landing reset; tracked edits would
    // not.
    let status = git.worktree_status(false)?;
    if !status.is_clean() {
        return Err(GitError::DirtyWorktree {
            details: format!(
                "{} staged, {} unstaged; sync or stash before merging",
                status.staged, status.unstaged
            ),
        }
        .into());
    }

    Ok(())
}

/// Everything the replay worked out, ready to land.
struct ReviewReplay {
    /// Local base tip before the promotion.
    old_base: Oid,
    /// The tip the replay built on (local or remote base, whichever
    /// is ahead).
    target_base: Oid,
    /// Result of the replay; equals `target_base` when nothing new
    /// landed.
    new_head: Oid,
    /// The landed commits, in order.
    commits: Vec<CommitInfo>,
    /// Remote-tracking base tip, if any.
    remote_base: Option<Oid>,
    /// The review tip that was replayed.
    review_tip: Oid,
    /// Local review branch tip, if any.
    local_review: Option<Oid>,
    /// Remote-tracking review tip, if any.
    remote_review: Option<Oid>,
    /// `refs/collab/last-review-push`, if set.
    push_mark: Option<Oid>,
    /// `refs/collab/last-sync` before the promotion.
    last_sync_before: Option<Oid>,
}

/// Replay the review branch onto the newest base tip, objects only.
fn replay_review(ctx: &VaultContext) -> Result<ReviewReplay, SyncError> {
    let git = &ctx.git;

    let old_base = git.head_oid()?;
    let remote_ref = RefName::for_remote(ctx.remote_name(), ctx.base_branch());
    let remote_base = git.try_resolve_ref(remote_ref.as_str())?;

    let target_base = match &remote_base {
        None => old_base.clone(),
        Some(r) if r == &old_base || git.is_ancestor(r, &old_base)? => old_base.clone(),
        Some(r) if git.is_ancestor(&old_base, r)? => r.clone(),
        Some(_) => {
            return Err(SyncError::BaseDiverged {
                base: ctx.base_branch().clone(),
            })
        }
    };

    let review_ref = RefName::for_branch(&ctx.review_branch);
    let tracking_ref = RefName::for_remote(ctx.remote_name(), &ctx.review_branch);
    let local_review = git.try_resolve_ref(review_ref.as_str())?;
    let remote_review = git.try_resolve_ref(tracking_ref.as_str())?;

    let review_tip = match (&local_review, &remote_review) {
        (None, None) => return Err(SyncError::NoReviewBranch),
        (Some(l), None) => l.clone(),
        (None, Some(r)) => r.clone(),
        (Some(l), Some(r)) => {
            if l == r || git.is_ancestor(r, l)? {
                l.clone()
            } else if git.is_ancestor(l, r)? {
                r.clone()
            } else {
                tracing::warn!(local = %l, remote = %r,
                    "review branches diverged; promoting the team side");
                r.clone()
            }
        }
    };

    let walk_base = git
        .merge_base(&target_base, &review_tip)?
        .ok_or_else(|| GitError::Internal {
            message: "review branch shares no history with the base branch".to_string(),
        })?;

    let picks = git.commits_between(&walk_base, &review_tip)?;
    let mut new_head = target_base.clone();
    let mut commits = Vec::new();

    for oid in &picks {
        let outcome = git.cherry_pick_onto(oid, &new_head)?;
        let Some(tree) = outcome.tree else {
            return Err(SyncError::MergeConflict {
                paths: outcome.conflicts,
            });
        };

        // A pick whose content already landed replays to the same
        // tree; skip it so re-running a promotion is harmless.
        if tree == git.tree_of(&new_head)? {
            continue;
        }

        let info = git.commit_info(oid)?;
        new_head = git.commit_tree(&tree, &[&new_head], &info.message, None)?;
        commits.push(git.commit_info(&new_head)?);
    }

    let last_sync_before = git.try_resolve_ref(RefName::last_sync().as_str())?;

    Ok(ReviewReplay {
        old_base,
        target_base,
        new_head,
        commits,
        remote_base,
        review_tip,
        local_review,
        remote_review,
        push_mark: git.try_resolve_ref(RefName::last_review_push().as_str())?,
        last_sync_before,
    })
}

/// Move the base branch to the replayed head and record the sync
/// point, so the next cycle diffs from the promoted content.
fn land_promotion(ctx: &VaultContext, replay: &ReviewReplay) -> Result<(), SyncError> {
    let git = &ctx.git;

    if replay.new_head != replay.old_base {
        let base_ref = RefName::for_branch(ctx.base_branch());
        git.update_ref_cas(
            base_ref.as_str(),
            &replay.new_head,
            Some(&replay.old_base),
            "collab: merge review branch",
        )?;
        git.reset_hard(&replay.new_head)?;
    }

    git.update_ref_cas(
        RefName::last_sync().as_str(),
        &replay.new_head,
        replay.last_sync_before.as_ref(),
        "collab: record sync point after merge",
    )?;

    Ok(())
}

/// Retire the local review branch and its push mark.
///
/// A local tip that never fully reached the remote stays put; the next
/// sync cycle re-stages and pushes it.
fn cleanup_local(ctx: &VaultContext, replay: &ReviewReplay) {
    let git = &ctx.git;
    let review_ref = RefName::for_branch(&ctx.review_branch);

    let local_is_promoted = match &replay.local_review {
        None => false,
        Some(l) => {
            l == &replay.review_tip || git.is_ancestor(l, &replay.review_tip).unwrap_or(false)
        }
    };

    if let Some(local) = &replay.local_review {
        if local_is_promoted {
            if let Err(err) = git.delete_ref_cas(review_ref.as_str(), local) {
                tracing::warn!(error = %err, "could not delete the local review branch");
            }
        } else {
            tracing::warn!(
                "local review branch has staging the remote never saw; leaving it in place"
            );
        }
    }

    if replay.local_review.is_none() || local_is_promoted {
        if let Some(mark) = &replay.push_mark {
            if let Err(err) = git.delete_ref_cas(RefName::last_review_push().as_str(), mark) {
                tracing::debug!(error = %err, "could not clear the review push mark");
            }
        }
    }
}

/// Close the open review request for the review branch, if the host
/// has one. Best effort; promotion already landed.
async fn close_review(gateway: &ReviewGateway, ctx: &VaultContext) -> bool {
    match gateway.open_request(&ctx.review_branch).await {
        Ok(Some(request)) => match gateway.host().close_request(request.number).await {
            Ok(_) => {
                tracing::info!(number = request.number, "closed the review request");
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not close the review request");
                false
            }
        },
        Ok(None) => false,
        Err(err) => {
            tracing::warn!(error = %err, "could not look up the review request");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{Git, TreeEntryInfo, TreeUpdate};
    use crate::manifest::Manifest;
    use std::fs;

    fn vault_fixture() -> (tempfile::TempDir, VaultContext) {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "tester").unwrap();
        config.set_str("user.email", "tester@example.com").unwrap();

        fs::create_dir_all(dir.path().join("schema")).unwrap();
        fs::write(dir.path().join("schema/model.yaml"), "version: 1\n").unwrap();
        fs::create_dir_all(dir.path().join("learnings")).unwrap();
        fs::write(dir.path().join("learnings/notes.md"), "first\n").unwrap();

        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "vault init", &tree, &[])
            .unwrap();

        let git = Git::open(dir.path()).unwrap();
        let branch = git.current_branch().unwrap().unwrap();
        let manifest = Manifest::bootstrap("test-vault", "tester", "origin", branch);
        manifest.save(dir.path()).unwrap();
        git.commit_all("add manifest").unwrap();

        let ctx = VaultContext::open(dir.path()).unwrap();
        (dir, ctx)
    }

    fn set_tracking_ref(dir: &std::path::Path, name: &str, oid: &Oid) {
        let repo = git2::Repository::open(dir).unwrap();
        repo.reference(
            name,
            git2::Oid::from_str(oid.as_str()).unwrap(),
            true,
            "test: tracking",
        )
        .unwrap();
    }

    fn commit_replacing(
        ctx: &VaultContext,
        parent: &Oid,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Oid {
        let repo = git2::Repository::open(&ctx.vault_root).unwrap();
        let blob = repo.blob(content).unwrap();
        let base_tree = ctx.git.tree_of(parent).unwrap();
        let updates = [TreeUpdate {
            path: VaultPath::new(path).unwrap(),
            entry: Some(TreeEntryInfo {
                oid: Oid::new(blob.to_string()).unwrap(),
                mode: 0o100644,
            }),
        }];
        let tree = ctx
            .git
            .apply_tree_updates(Some(&base_tree), &updates)
            .unwrap();
        ctx.git.commit_tree(&tree, &[parent], message, None).unwrap()
    }

    #[test]
    fn missing_review_branch_is_an_error() {
        let (_dir, ctx) = vault_fixture();
        let err = replay_review(&ctx).unwrap_err();
        assert!(matches!(err, SyncError::NoReviewBranch));
    }

    #[test]
    fn clean_replay_lands_review_content() {
        let (dir, ctx) = vault_fixture();
        let tip = ctx.git.head_oid().unwrap();
        set_tracking_ref(
            dir.path(),
            &format!("refs/remotes/origin/{}", ctx.base_branch()),
            &tip,
        );

        let staged = commit_replacing(
            &ctx,
            &tip,
            "schema/model.yaml",
            b"version: 2\n",
            "collab: stage shared changes for review\n\n- schema/model.yaml\n",
        );
        ctx.git
            .update_ref_cas("refs/heads/collab/review", &staged, None, "test: review")
            .unwrap();

        let replay = replay_review(&ctx).unwrap();
        assert_eq!(replay.target_base, tip);
        assert_ne!(replay.new_head, tip);
        assert_eq!(replay.commits.len(), 1);

        land_promotion(&ctx, &replay).unwrap();
        assert_eq!(ctx.git.head_oid().unwrap(), replay.new_head);

        // The worktree carries the promoted content.
        let content = fs::read(dir.path().join("schema/model.yaml")).unwrap();
        assert_eq!(content, b"version: 2\n");

        // The sync point moved with the base.
        let last_sync = ctx
            .git
            .resolve_ref(RefName::last_sync().as_str())
            .unwrap();
        assert_eq!(last_sync, replay.new_head);
    }

    #[test]
    fn conflicting_replay_aborts_before_any_ref_moves() {
        let (dir, ctx) = vault_fixture();
        let tip = ctx.git.head_oid().unwrap();

        let staged = commit_replacing(
            &ctx,
            &tip,
            "schema/model.yaml",
            b"version: 2\n",
            "collab: stage shared changes for review\n\n- schema/model.yaml\n",
        );
        ctx.git
            .update_ref_cas("refs/heads/collab/review", &staged, None, "test: review")
            .unwrap();

        // The base moved on with an incompatible edit.
        let advanced = commit_replacing(
            &ctx,
            &tip,
            "schema/model.yaml",
            b"version: 9\n",
            "remote bump",
        );
        let base_ref = format!("refs/heads/{}", ctx.base_branch());
        ctx.git
            .update_ref_cas(&base_ref, &advanced, Some(&tip), "test: advance base")
            .unwrap();
        set_tracking_ref(
            dir.path(),
            &format!("refs/remotes/origin/{}", ctx.base_branch()),
            &advanced,
        );

        let err = replay_review(&ctx).unwrap_err();
        match err {
            SyncError::MergeConflict { paths } => {
                assert_eq!(paths, vec![VaultPath::new("schema/model.yaml").unwrap()]);
            }
            other => panic!("expected a merge conflict, got {}", other),
        }

        // Nothing moved.
        assert_eq!(ctx.git.head_oid().unwrap(), advanced);
        assert_eq!(
            ctx.git.resolve_ref("refs/heads/collab/review").unwrap(),
            staged
        );
    }

    #[test]
    fn already_landed_content_replays_to_nothing() {
        let (dir, ctx) = vault_fixture();
        let tip = ctx.git.head_oid().unwrap();

        let staged = commit_replacing(
            &ctx,
            &tip,
            "schema/model.yaml",
            b"version: 2\n",
            "collab: stage shared changes for review\n\n- schema/model.yaml\n",
        );
        ctx.git
            .update_ref_cas("refs/heads/collab/review", &staged, None, "test: review")
            .unwrap();

        // The same content reached the base through another clone.
        let landed = commit_replacing(&ctx, &tip, "schema/model.yaml", b"version: 2\n", "landed");
        let base_ref = format!("refs/heads/{}", ctx.base_branch());
        ctx.git
            .update_ref_cas(&base_ref, &landed, Some(&tip), "test: advance base")
            .unwrap();
        set_tracking_ref(
            dir.path(),
            &format!("refs/remotes/origin/{}", ctx.base_branch()),
            &landed,
        );

        let replay = replay_review(&ctx).unwrap();
        assert_eq!(replay.new_head, landed);
        assert!(replay.commits.is_empty());
    }

    #[test]
    fn diverged_base_refuses_to_promote() {
        let (dir, ctx) = vault_fixture();
        let tip = ctx.git.head_oid().unwrap();

        let local = commit_replacing(&ctx, &tip, "learnings/notes.md", b"mine\n", "local note");
        let base_ref = format!("refs/heads/{}", ctx.base_branch());
        ctx.git
            .update_ref_cas(&base_ref, &local, Some(&tip), "test: local advance")
            .unwrap();

        let remote = commit_replacing(&ctx, &tip, "schema/model.yaml", b"version: 9\n", "theirs");
        set_tracking_ref(
            dir.path(),
            &format!("refs/remotes/origin/{}", ctx.base_branch()),
            &remote,
        );

        ctx.git
            .update_ref_cas("refs/heads/collab/review", &remote, None, "test: review")
            .unwrap();

        let err = replay_review(&ctx).unwrap_err();
        assert!(matches!(err, SyncError::BaseDiverged { .. }));
    }

    #[test]
    fn replay_builds_on_remote_when_it_is_ahead() {
        let (dir, ctx) = vault_fixture();
        let tip = ctx.git.head_oid().unwrap();

        let remote = commit_replacing(&ctx, &tip, "learnings/notes.md", b"team note\n", "theirs");
        set_tracking_ref(
            dir.path(),
            &format!("refs/remotes/origin/{}", ctx.base_branch()),
            &remote,
        );

        let staged = commit_replacing(
            &ctx,
            &remote,
            "schema/model.yaml",
            b"version: 2\n",
            "collab: stage shared changes for review\n\n- schema/model.yaml\n",
        );
        ctx.git
            .update_ref_cas("refs/heads/collab/review", &staged, None, "test: review")
            .unwrap();

        let replay = replay_review(&ctx).unwrap();
        assert_eq!(replay.target_base, remote);
        assert!(ctx.git.is_ancestor(&remote, &replay.new_head).unwrap());
    }

    #[test]
    fn preflight_rejects_dirty_tracked_files() {
        let (dir, ctx) = vault_fixture();
        fs::write(dir.path().join("schema/model.yaml"), "version: 7\n").unwrap();

        let err = preflight(&ctx).unwrap_err();
        assert!(matches!(
            err,
            SyncError::Git(GitError::DirtyWorktree { .. })
        ));
    }

    #[test]
    fn cleanup_retires_promoted_review_refs() {
        let (dir, ctx) = vault_fixture();
        let tip = ctx.git.head_oid().unwrap();
        set_tracking_ref(
            dir.path(),
            &format!("refs/remotes/origin/{}", ctx.base_branch()),
            &tip,
        );

        let staged = commit_replacing(
            &ctx,
            &tip,
            "schema/model.yaml",
            b"version: 2\n",
            "collab: stage shared changes for review\n\n- schema/model.yaml\n",
        );
        ctx.git
            .update_ref_cas("refs/heads/collab/review", &staged, None, "test: review")
            .unwrap();
        ctx.git
            .update_ref_cas(
                RefName::last_review_push().as_str(),
                &staged,
                None,
                "test: mark",
            )
            .unwrap();

        let replay = replay_review(&ctx).unwrap();
        land_promotion(&ctx, &replay).unwrap();
        cleanup_local(&ctx, &replay);

        assert!(ctx
            .git
            .try_resolve_ref("refs/heads/collab/review")
            .unwrap()
            .is_none());
        assert!(ctx
            .git
            .try_resolve_ref(RefName::last_review_push().as_str())
            .unwrap()
            .is_none());
    }
}
