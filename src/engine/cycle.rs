//! The sync cycle.
//!
//! [`run_cycle`] is the one entry point: the manual `collab sync`
//! command and the background scheduler both call it. The cycle takes
//! the vault lock, walks the phases, appends the session record to the
//! log, and either advances the base branch or restores the worktree
//! to where it started.
//!
//! Network work (fetch, pushes, review host calls) happens at the top
//! level of the orchestrator. Everything between network calls is
//! synchronous git work against the local repository, so a failure at
//! any point leaves nothing half-sent.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::lock::VaultLock;
use crate::core::session::{ReviewTouch, SessionLog, SyncPhase, SyncSession};
use crate::core::types::{Oid, RefName, SessionId, VaultPath};
use crate::git::{DiffStatus, Git, GitError, TreeEntryInfo, TreeUpdate};
use crate::manifest::MANIFEST_FILE_NAME;
use crate::resolve::{resolve, PathChange, Resolution};
use crate::review::ReviewGateway;

use super::{
    ensure_manifest_tracked, SyncError, VaultContext, WorktreeCheckpoint, REVIEW_BRANCH,
    SYNC_BRANCH,
};

/// What a sync attempt amounted to.
#[derive(Debug)]
pub enum SyncOutcome {
    /// A cycle ran to completion.
    Completed(SyncReport),
    /// Another session already holds the vault lock; nothing was done.
    AlreadyRunning,
}

/// Summary of one completed cycle.
#[derive(Debug)]
pub struct SyncReport {
    /// The session record, already appended to the log.
    pub session: SyncSession,
    /// Whether anything was pushed to the remote base branch.
    pub pushed: bool,
    /// The local base branch tip after the cycle.
    pub base: Oid,
}

/// Run one full sync cycle for the vault containing `vault_dir`.
///
/// Returns [`SyncOutcome::AlreadyRunning`] without touching anything
/// when another session holds the vault lock. On failure the worktree
/// is restored from the checkpoint, the failed session is logged, and
/// the error is returned.
pub async fn run_cycle(
    vault_dir: &Path,
    gateway: Option<ReviewGateway>,
) -> Result<SyncOutcome, SyncError> {
    let ctx = VaultContext::open(vault_dir)?;

    let Some(_lock) = VaultLock::try_acquire(&ctx.paths)? else {
        tracing::info!("vault is already syncing; skipping this trigger");
        return Ok(SyncOutcome::AlreadyRunning);
    };

    let mut session = SyncSession::new();
    let mut checkpoint: Option<WorktreeCheckpoint> = None;
    tracing::info!(session = %session.id, "sync cycle starting");

    // Owned handles for the network steps.
    let remote_handle = ctx.remote();
    let remote_name = ctx.remote_name().to_string();
    let base_branch = ctx.base_branch().clone();

    // Pulling: local preparation.
    let setup = match prepare_pull(&ctx, &mut session, &mut checkpoint) {
        Ok(setup) => setup,
        Err(err) => return Err(abandon(&ctx, checkpoint.as_ref(), session, err)),
    };

    // Pulling: bring remote-tracking refs up to date.
    if let Err(err) = remote_handle.fetch(&remote_name).await {
        return Err(abandon(&ctx, checkpoint.as_ref(), session, err.into()));
    }

    // Classifying, resolving, and review staging are all local.
    let plan = match resolve_changes(&ctx, &mut session, &setup) {
        Ok(plan) => plan,
        Err(err) => return Err(abandon(&ctx, checkpoint.as_ref(), session, err)),
    };

    // Pushing.
    session.advance(SyncPhase::Pushing);
    let mut pushed = false;

    if plan.push_base {
        let refspec = format!("refs/heads/{}:refs/heads/{}", SYNC_BRANCH, base_branch);
        if let Err(err) = remote_handle.push(&remote_name, &refspec).await {
            return Err(abandon(&ctx, checkpoint.as_ref(), session, err.into()));
        }
        pushed = true;
    }

    if plan.push_review {
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", REVIEW_BRANCH);
        if let Err(err) = remote_handle.push(&remote_name, &refspec).await {
            return Err(abandon(&ctx, checkpoint.as_ref(), session, err.into()));
        }
        record_review_push(&ctx, &plan, &mut session);
    }

    // Make sure a review request covers the deferred files. Host
    // trouble parks the request work for the next cycle; the local
    // result above is already consistent.
    if !plan.review_files.is_empty() {
        match &gateway {
            Some(gw) => {
                let files = plan.review_files.clone();
                match gw
                    .ensure_request(&ctx.review_branch, &base_branch, &files)
                    .await
                {
                    Ok(outcome) => {
                        let number = outcome.request.number;
                        tracing::info!(number, action = ?outcome.action, "review request ensured");
                        session.review = Some(ReviewTouch {
                            id: number.to_string(),
                            url: Some(outcome.request.url),
                            action: outcome.action,
                        });
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "review host call failed; parking until next cycle");
                        session.warn(format!(
                            "review request not updated: {}; retrying next cycle",
                            err
                        ));
                    }
                }
            }
            None => {
                session.warn(
                    "review host unavailable; deferred files are staged on the review branch",
                );
            }
        }
    }

    // Finalize: record the sync point and land the base branch.
    let base = match finalize(&ctx, &setup, &plan) {
        Ok(oid) => oid,
        Err(err) => return Err(abandon(&ctx, checkpoint.as_ref(), session, err)),
    };

    session.complete();
    if let Err(err) = SessionLog::append(&ctx.paths, &session) {
        tracing::warn!(error = %err, "failed to append session log");
    }
    tracing::info!(
        session = %session.id,
        auto_merged = session.auto_merged.len(),
        deferred = session.deferred.len(),
        recovered = session.recovered.len(),
        pushed,
        "sync cycle finished"
    );

    Ok(SyncOutcome::Completed(SyncReport {
        session,
        pushed,
        base,
    }))
}

/// Fail the session: restore the worktree, log the record, hand the
/// error back for the caller to surface.
fn abandon(
    ctx: &VaultContext,
    checkpoint: Option<&WorktreeCheckpoint>,
    mut session: SyncSession,
    err: SyncError,
) -> SyncError {
    tracing::error!(session = %session.id, error = %err, "sync cycle failed");

    if let Some(cp) = checkpoint {
        if let Err(restore_err) = cp.restore(&ctx.git) {
            tracing::error!(error = %restore_err, "worktree restore failed");
            session.warn(format!("worktree restore failed: {}", restore_err));
        }
    }

    session.fail(err.to_string());
    if let Err(log_err) = SessionLog::append(&ctx.paths, &session) {
        tracing::warn!(error = %log_err, "failed to append session log");
    }

    err
}

/// State carried out of pull preparation.
struct PullSetup {
    /// Local base branch tip when the cycle began.
    base_tip: Oid,
    /// Tip of the sync branch after the optional snapshot.
    sync_head: Oid,
}

/// Park on the sync branch and snapshot local edits.
///
/// After this the worktree sits on the sync branch whose tip holds
/// every local change as a commit, and the checkpoint knows how to put
/// everything back.
fn prepare_pull(
    ctx: &VaultContext,
    session: &mut SyncSession,
    checkpoint: &mut Option<WorktreeCheckpoint>,
) -> Result<PullSetup, SyncError> {
    let git = &ctx.git;
    session.advance(SyncPhase::Pulling);

    let state = git.state();
    if state.is_in_progress() {
        return Err(GitError::OperationInProgress { operation: state }.into());
    }

    let cp = WorktreeCheckpoint::capture(git)?.ok_or(SyncError::DetachedHead)?;
    if cp.start_branch() != ctx.base_branch() {
        return Err(SyncError::NotOnBaseBranch {
            current: cp.start_branch().clone(),
            base: ctx.base_branch().clone(),
        });
    }
    let base_tip = cp.start_head().clone();
    *checkpoint = Some(cp);

    // A vault that ignores its own manifest cannot sync it.
    if ensure_manifest_tracked(git, &ctx.vault_root)? {
        session.warn(format!(
            "amended .gitignore so {} can sync",
            MANIFEST_FILE_NAME
        ));
    }

    // Park on the sync branch at the base tip. Same tree as HEAD, so
    // dirty files carry over untouched.
    let sync_ref = RefName::for_branch(&ctx.sync_branch);
    let prev_sync = git.try_resolve_ref(sync_ref.as_str())?;
    git.update_ref_cas(
        sync_ref.as_str(),
        &base_tip,
        prev_sync.as_ref(),
        "collab: begin sync cycle",
    )?;
    git.checkout_branch(&ctx.sync_branch)?;

    // Snapshot uncommitted edits so every local change is a commit.
    let status = git.worktree_status(true)?;
    let sync_head = if status.has_local_changes() {
        let snapshot = git.commit_all("collab: snapshot local changes")?;
        tracing::debug!(
            snapshot = %snapshot,
            staged = status.staged,
            unstaged = status.unstaged,
            untracked = status.untracked,
            "snapshotted local edits"
        );
        if let Some(cp) = checkpoint.as_mut() {
            cp.set_snapshot(snapshot.clone());
        }
        snapshot
    } else {
        base_tip.clone()
    };

    Ok(PullSetup {
        base_tip,
        sync_head,
    })
}

/// Everything the resolution phase decided, ready to publish.
struct PushPlan {
    /// What the base branch should become.
    sync_commit: Oid,
    /// `refs/collab/last-sync` before this cycle, for the CAS update.
    last_sync_before: Option<Oid>,
    /// Whether the base branch push is needed.
    push_base: bool,
    /// Whether the review branch push is needed.
    push_review: bool,
    /// Deferred paths, sorted, for the review request.
    review_files: Vec<VaultPath>,
    /// Local review branch tip after staging.
    review_tip: Option<Oid>,
    /// `refs/collab/last-review-push` before this cycle.
    review_push_before: Option<Oid>,
}

/// Classify both sides' changes, merge the trees, and apply the
/// per-path policy. Produces the push plan and stages the review
/// branch when anything defers.
fn resolve_changes(
    ctx: &VaultContext,
    session: &mut SyncSession,
    setup: &PullSetup,
) -> Result<PushPlan, SyncError> {
    let git = &ctx.git;
    session.advance(SyncPhase::Classifying);

    let sync_ref = RefName::for_branch(&ctx.sync_branch);
    let remote_ref = RefName::for_remote(ctx.remote_name(), ctx.base_branch());
    let last_sync_before = git.try_resolve_ref(RefName::last_sync().as_str())?;

    let Some(remote_base) = git.try_resolve_ref(remote_ref.as_str())? else {
        // Nothing on the remote yet: first publish, everything goes.
        session.advance(SyncPhase::Resolving);
        let published = git.diff_names(Some(&setup.base_tip), &setup.sync_head)?;
        session.auto_merged = published.into_iter().map(|e| e.path).collect();
        let sync_commit =
            first_publish_commit(git, setup, &sync_ref, session.auto_merged.len())?;
        tracing::info!(tip = %sync_commit, "remote base branch absent; publishing the vault");
        return Ok(PushPlan {
            sync_commit,
            last_sync_before,
            push_base: true,
            push_review: false,
            review_files: vec![],
            review_tip: None,
            review_push_before: None,
        });
    };

    // Diff base: the last recorded sync point, else the history merge
    // base of the two tips.
    let base_point = match &last_sync_before {
        Some(oid) => Some(oid.clone()),
        None => git.merge_base(&setup.sync_head, &remote_base)?,
    };

    let local_changes = git.diff_names(base_point.as_ref(), &setup.sync_head)?;
    let remote_changes = git.diff_names(base_point.as_ref(), &remote_base)?;
    tracing::debug!(
        local = local_changes.len(),
        remote = remote_changes.len(),
        "diffed both sides against the sync point"
    );

    session.advance(SyncPhase::Resolving);

    // Steady state: nothing changed anywhere.
    if local_changes.is_empty() && remote_changes.is_empty() && setup.base_tip == remote_base {
        tracing::debug!("vault already in sync");
        return Ok(PushPlan {
            sync_commit: setup.base_tip.clone(),
            last_sync_before,
            push_base: false,
            push_review: false,
            review_files: vec![],
            review_tip: None,
            review_push_before: None,
        });
    }

    let local_map: BTreeMap<VaultPath, DiffStatus> = local_changes
        .into_iter()
        .map(|e| (e.path, e.status))
        .collect();
    let remote_map: BTreeMap<VaultPath, DiffStatus> = remote_changes
        .into_iter()
        .map(|e| (e.path, e.status))
        .collect();

    let merged = git.merge_trees(&setup.sync_head, &remote_base)?;
    let conflicted: BTreeSet<VaultPath> = merged.conflicts.iter().cloned().collect();

    let mut touched: BTreeSet<VaultPath> = conflicted.iter().cloned().collect();
    touched.extend(local_map.keys().cloned());
    touched.extend(remote_map.keys().cloned());

    let remote_tree = git.tree_of(&remote_base)?;
    let mut updates: Vec<TreeUpdate> = Vec::new();
    let mut review_files: Vec<VaultPath> = Vec::new();

    for path in touched {
        let class = ctx.rules.classify(&path);
        let local = local_map.get(&path).copied();
        let remote = remote_map.get(&path).copied();
        let is_conflicted = conflicted.contains(&path);
        let remote_entry = git.entry_at(&remote_tree, &path)?;

        let merged_matches_remote =
            !is_conflicted && git.entry_at(&merged.tree, &path)? == remote_entry;

        let change = PathChange {
            path: path.clone(),
            local,
            remote,
            conflicted: is_conflicted,
            merged_matches_remote,
        };

        let decision = resolve(&change, class);
        tracing::debug!(path = %path, class = %class, decision = %decision, "resolved");

        match decision {
            Resolution::AutoMerge => {
                if is_conflicted {
                    // The merge stripped this entry; reinstate the
                    // side the diff says moved.
                    let entry = match (change.local, change.remote) {
                        (Some(_), None) => git.tree_entry(&setup.sync_head, &path)?,
                        _ => remote_entry.clone(),
                    };
                    updates.push(TreeUpdate {
                        path: path.clone(),
                        entry,
                    });
                }
                session.auto_merged.push(path);
            }
            Resolution::AcceptRemoteWithRecovery => {
                updates.push(TreeUpdate {
                    path: path.clone(),
                    entry: remote_entry,
                });
                match git.tree_entry(&setup.sync_head, &path)? {
                    Some(local_entry) => {
                        let dest = save_recovery(ctx, &session.id, &path, &local_entry)?;
                        session.warn(format!(
                            "'{}': kept the team version; yours is at {}",
                            path,
                            dest.display()
                        ));
                        session.recovered.push(path);
                    }
                    None => {
                        session.warn(format!(
                            "'{}': deleted here but changed by the team; keeping theirs",
                            path
                        ));
                    }
                }
            }
            Resolution::DeferToReview => {
                updates.push(TreeUpdate {
                    path: path.clone(),
                    entry: remote_entry,
                });
                review_files.push(path);
            }
        }
    }

    let resolved_tree = git.apply_tree_updates(Some(&merged.tree), &updates)?;
    let sync_tree = git.tree_of(&setup.sync_head)?;

    if !review_files.is_empty() {
        session.deferred = review_files.clone();
    }

    let sync_commit = choose_publish_commit(
        git,
        setup,
        &remote_base,
        &remote_tree,
        &resolved_tree,
        &sync_tree,
        session.auto_merged.len(),
        review_files.len(),
        session.recovered.len(),
    )?;

    // Keep the sync branch ref on the publish commit so the push
    // refspec sends the right tip.
    if sync_commit != setup.sync_head {
        git.update_ref_cas(
            sync_ref.as_str(),
            &sync_commit,
            Some(&setup.sync_head),
            "collab: sync result",
        )?;
    }

    // Stage deferred content on the review branch (ref work only; the
    // worktree never visits it).
    let (review_tip, review_push_before, push_review) = if review_files.is_empty() {
        (None, None, false)
    } else {
        session.advance(SyncPhase::AwaitingReview);
        let staged = stage_review(ctx, setup, &review_files, &remote_base)?;
        (Some(staged.tip), staged.pushed_before, true)
    };

    let push_base = sync_commit != remote_base;

    Ok(PushPlan {
        sync_commit,
        last_sync_before,
        push_base,
        push_review,
        review_files,
        review_tip,
        review_push_before,
    })
}

/// The publish commit when the remote base branch does not exist yet.
fn first_publish_commit(
    git: &Git,
    setup: &PullSetup,
    sync_ref: &RefName,
    published: usize,
) -> Result<Oid, SyncError> {
    if setup.sync_head == setup.base_tip {
        return Ok(setup.base_tip.clone());
    }

    // Rebuild the snapshot as a sync commit so the private snapshot
    // never enters published history.
    let tree = git.tree_of(&setup.sync_head)?;
    let message = sync_commit_message(published, 0, 0);
    let commit = git.commit_tree(&tree, &[&setup.base_tip], &message, None)?;
    git.update_ref_cas(
        sync_ref.as_str(),
        &commit,
        Some(&setup.sync_head),
        "collab: sync result",
    )?;
    Ok(commit)
}

/// Pick the commit the base branch advances to.
///
/// Degenerate shapes avoid empty merge commits: adopt the remote tip
/// outright when we publish nothing it lacks, or push existing local
/// commits as-is when the remote is strictly behind. Otherwise build a
/// commit carrying the resolved tree. Its parents are the public tips,
/// never the private snapshot.
#[allow(clippy::too_many_arguments)]
fn choose_publish_commit(
    git: &Git,
    setup: &PullSetup,
    remote_base: &Oid,
    remote_tree: &Oid,
    resolved_tree: &Oid,
    sync_tree: &Oid,
    auto_merged: usize,
    deferred: usize,
    recovered: usize,
) -> Result<Oid, SyncError> {
    if resolved_tree == remote_tree && git.is_ancestor(&setup.base_tip, remote_base)? {
        // The remote already has everything that publishes.
        return Ok(remote_base.clone());
    }

    if setup.sync_head == setup.base_tip
        && resolved_tree == sync_tree
        && git.is_ancestor(remote_base, &setup.base_tip)?
    {
        // Local commits alone; they publish as-is.
        return Ok(setup.base_tip.clone());
    }

    let message = sync_commit_message(auto_merged, deferred, recovered);
    let parents: Vec<&Oid> = if git.is_ancestor(remote_base, &setup.base_tip)? {
        vec![&setup.base_tip]
    } else if git.is_ancestor(&setup.base_tip, remote_base)? {
        vec![remote_base]
    } else {
        vec![&setup.base_tip, remote_base]
    };

    Ok(git.commit_tree(resolved_tree, &parents, &message, None)?)
}

fn sync_commit_message(auto_merged: usize, deferred: usize, recovered: usize) -> String {
    let mut parts = Vec::new();
    if auto_merged > 0 {
        parts.push(format!("{} merged", auto_merged));
    }
    if deferred > 0 {
        parts.push(format!("{} deferred", deferred));
    }
    if recovered > 0 {
        parts.push(format!("{} recovered", recovered));
    }

    if parts.is_empty() {
        "collab: sync".to_string()
    } else {
        format!("collab: sync ({})", parts.join(", "))
    }
}

/// Copy a blob out of the object store into the recovery area.
fn save_recovery(
    ctx: &VaultContext,
    session: &SessionId,
    path: &VaultPath,
    entry: &TreeEntryInfo,
) -> Result<PathBuf, SyncError> {
    let content = ctx.git.read_blob(&entry.oid)?;
    let dest = ctx.paths.recovery_path(session, path);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| GitError::AccessError {
            message: format!("cannot create {}: {}", parent.display(), e),
        })?;
    }
    fs::write(&dest, content).map_err(|e| GitError::AccessError {
        message: format!("cannot write {}: {}", dest.display(), e),
    })?;

    tracing::info!(path = %path, recovery = %dest.display(), "preserved local version");
    Ok(dest)
}

/// Result of staging the review branch.
struct ReviewStage {
    /// Local review branch tip after staging.
    tip: Oid,
    /// `refs/collab/last-review-push` before this cycle.
    pushed_before: Option<Oid>,
}

/// Stage deferred local content on the review branch.
///
/// Ref-only: the worktree never visits the review branch. The branch
/// base is reconciled with the remote-tracking ref first so members
/// extend each other's staging instead of overwriting it. Staging the
/// same content twice adds no commit.
fn stage_review(
    ctx: &VaultContext,
    setup: &PullSetup,
    files: &[VaultPath],
    remote_base: &Oid,
) -> Result<ReviewStage, SyncError> {
    let git = &ctx.git;
    let review_ref = RefName::for_branch(&ctx.review_branch);
    let tracking_ref = RefName::for_remote(ctx.remote_name(), &ctx.review_branch);

    let local_tip = git.try_resolve_ref(review_ref.as_str())?;
    let remote_tip = git.try_resolve_ref(tracking_ref.as_str())?;
    let pushed_before = git.try_resolve_ref(RefName::last_review_push().as_str())?;

    let mut pre_updates: Vec<TreeUpdate> = Vec::new();
    let (base_tree, parents): (Oid, Vec<Oid>) = match (&local_tip, &remote_tip) {
        (None, None) => (git.tree_of(remote_base)?, vec![remote_base.clone()]),
        (None, Some(r)) => (git.tree_of(r)?, vec![r.clone()]),
        (Some(l), None) => {
            if pushed_before.as_ref() == Some(l) {
                // Fully pushed and then deleted remotely: the branch
                // was promoted. Start fresh instead of resurrecting
                // merged content.
                tracing::debug!(stale = %l, "local review branch was promoted; starting fresh");
                (git.tree_of(remote_base)?, vec![remote_base.clone()])
            } else {
                (git.tree_of(l)?, vec![l.clone()])
            }
        }
        (Some(l), Some(r)) => {
            if l == r || git.is_ancestor(r, l)? {
                (git.tree_of(l)?, vec![l.clone()])
            } else if git.is_ancestor(l, r)? {
                (git.tree_of(r)?, vec![r.clone()])
            } else {
                // Both sides staged since the common point. Merge the
                // trees; for conflicts outside our file set take the
                // team side, ours win below.
                let merged = git.merge_trees(l, r)?;
                let ours: BTreeSet<&VaultPath> = files.iter().collect();
                let their_tree = git.tree_of(r)?;
                for path in &merged.conflicts {
                    if !ours.contains(path) {
                        let entry = git.entry_at(&their_tree, path)?;
                        pre_updates.push(TreeUpdate {
                            path: path.clone(),
                            entry,
                        });
                    }
                }
                (merged.tree, vec![l.clone(), r.clone()])
            }
        }
    };

    let mut tree_updates = pre_updates;
    for path in files {
        let entry = git.tree_entry(&setup.sync_head, path)?;
        tree_updates.push(TreeUpdate {
            path: path.clone(),
            entry,
        });
    }
    let staged_tree = git.apply_tree_updates(Some(&base_tree), &tree_updates)?;

    let unchanged = match parents.as_slice() {
        [single] => git.tree_of(single)? == staged_tree,
        _ => false,
    };

    let tip = if unchanged {
        parents[0].clone()
    } else {
        let mut message = String::from("collab: stage shared changes for review\n\n");
        for path in files {
            message.push_str("- ");
            message.push_str(path.as_str());
            message.push('\n');
        }
        let parent_refs: Vec<&Oid> = parents.iter().collect();
        git.commit_tree(&staged_tree, &parent_refs, &message, None)?
    };

    if local_tip.as_ref() != Some(&tip) {
        git.update_ref_cas(
            review_ref.as_str(),
            &tip,
            local_tip.as_ref(),
            "collab: stage for review",
        )?;
    }

    tracing::info!(tip = %tip, files = files.len(), "review branch staged");
    Ok(ReviewStage { tip, pushed_before })
}

/// Remember the review tip that was just pushed, so a later cycle can
/// tell a promoted-then-deleted branch from unpushed staging.
fn record_review_push(ctx: &VaultContext, plan: &PushPlan, session: &mut SyncSession) {
    let Some(tip) = &plan.review_tip else { return };

    if let Err(err) = ctx.git.update_ref_cas(
        RefName::last_review_push().as_str(),
        tip,
        plan.review_push_before.as_ref(),
        "collab: record review push",
    ) {
        tracing::warn!(error = %err, "failed to record the review push point");
        session.warn(format!("could not record the review push point: {}", err));
    }
}

/// Record the sync point, advance the base branch, and bring the
/// worktree home.
fn finalize(ctx: &VaultContext, setup: &PullSetup, plan: &PushPlan) -> Result<Oid, SyncError> {
    let git = &ctx.git;

    git.update_ref_cas(
        RefName::last_sync().as_str(),
        &plan.sync_commit,
        plan.last_sync_before.as_ref(),
        "collab: record sync point",
    )?;

    let base_ref = RefName::for_branch(ctx.base_branch());
    if plan.sync_commit != setup.base_tip {
        git.update_ref_cas(
            base_ref.as_str(),
            &plan.sync_commit,
            Some(&setup.base_tip),
            "collab: advance base after sync",
        )?;
    }
    git.checkout_branch_force(ctx.base_branch())?;

    Ok(plan.sync_commit.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;

    fn vault_fixture() -> (tempfile::TempDir, VaultContext) {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "tester").unwrap();
        config.set_str("user.email", "tester@example.com").unwrap();

        fs::create_dir_all(dir.path().join("learnings")).unwrap();
        fs::write(dir.path().join("learnings/notes.md"), "first\n").unwrap();
        fs::create_dir_all(dir.path().join("schema")).unwrap();
        fs::write(dir.path().join("schema/model.yaml"), "version: 1\n").unwrap();

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

    /// Point the remote-tracking ref for the base branch at a commit,
    /// standing in for a fetch.
    fn set_remote_base(dir: &Path, ctx: &VaultContext, oid: &Oid) {
        let repo = git2::Repository::open(dir).unwrap();
        let name = format!(
            "refs/remotes/{}/{}",
            ctx.remote_name(),
            ctx.base_branch()
        );
        repo.reference(
            &name,
            git2::Oid::from_str(oid.as_str()).unwrap(),
            true,
            "test: remote base",
        )
        .unwrap();
    }

    /// Build a commit on top of `parent` replacing one blob, without
    /// touching the worktree.
    fn commit_replacing(
        dir: &Path,
        ctx: &VaultContext,
        parent: &Oid,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Oid {
        let repo = git2::Repository::open(dir).unwrap();
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

    mod messages {
        use super::*;

        #[test]
        fn counts_appear_in_order() {
            assert_eq!(sync_commit_message(0, 0, 0), "collab: sync");
            assert_eq!(sync_commit_message(3, 0, 0), "collab: sync (3 merged)");
            assert_eq!(
                sync_commit_message(2, 1, 1),
                "collab: sync (2 merged, 1 deferred, 1 recovered)"
            );
        }
    }

    mod preparation {
        use super::*;

        #[test]
        fn dirty_worktree_is_snapshotted() {
            let (dir, ctx) = vault_fixture();
            fs::write(dir.path().join("learnings/extra.md"), "new\n").unwrap();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();

            assert_ne!(setup.sync_head, setup.base_tip);
            assert!(checkpoint.unwrap().snapshot().is_some());
            assert_eq!(
                ctx.git.current_branch().unwrap().unwrap().as_str(),
                SYNC_BRANCH
            );

            let entry = ctx
                .git
                .tree_entry(
                    &setup.sync_head,
                    &VaultPath::new("learnings/extra.md").unwrap(),
                )
                .unwrap();
            assert!(entry.is_some());
        }

        #[test]
        fn clean_worktree_skips_snapshot() {
            let (_dir, ctx) = vault_fixture();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();

            assert_eq!(setup.sync_head, setup.base_tip);
            assert!(checkpoint.unwrap().snapshot().is_none());
        }

        #[test]
        fn wrong_branch_is_rejected() {
            let (_dir, ctx) = vault_fixture();
            let head = ctx.git.head_oid().unwrap();
            ctx.git
                .update_ref_cas("refs/heads/scratch", &head, None, "test: scratch")
                .unwrap();
            ctx.git
                .checkout_branch(&crate::core::types::BranchName::new("scratch").unwrap())
                .unwrap();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let err = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap_err();
            assert!(matches!(err, SyncError::NotOnBaseBranch { .. }));
        }
    }

    mod resolution {
        use super::*;

        #[test]
        fn absent_remote_plans_first_publish() {
            let (dir, ctx) = vault_fixture();
            fs::write(dir.path().join("learnings/extra.md"), "new\n").unwrap();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();
            let plan = resolve_changes(&ctx, &mut session, &setup).unwrap();

            assert!(plan.push_base);
            assert!(!plan.push_review);
            assert!(plan.review_files.is_empty());
            assert!(session
                .auto_merged
                .contains(&VaultPath::new("learnings/extra.md").unwrap()));

            // The sync branch ref carries the publish commit.
            let sync_tip = ctx
                .git
                .resolve_ref(&format!("refs/heads/{}", SYNC_BRANCH))
                .unwrap();
            assert_eq!(sync_tip, plan.sync_commit);
        }

        #[test]
        fn steady_state_plans_nothing() {
            let (dir, ctx) = vault_fixture();
            let tip = ctx.git.head_oid().unwrap();
            set_remote_base(dir.path(), &ctx, &tip);

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();
            let plan = resolve_changes(&ctx, &mut session, &setup).unwrap();

            assert!(!plan.push_base);
            assert!(!plan.push_review);
            assert_eq!(plan.sync_commit, tip);
            assert!(session.auto_merged.is_empty());
        }

        #[test]
        fn shared_state_edit_defers_and_reverts() {
            let (dir, ctx) = vault_fixture();
            let tip = ctx.git.head_oid().unwrap();
            set_remote_base(dir.path(), &ctx, &tip);

            // Local edit to a shared-state file, remote unchanged.
            fs::write(dir.path().join("schema/model.yaml"), "version: 2\n").unwrap();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();
            let plan = resolve_changes(&ctx, &mut session, &setup).unwrap();

            let shared = VaultPath::new("schema/model.yaml").unwrap();
            assert_eq!(plan.review_files, vec![shared.clone()]);
            assert!(plan.push_review);
            // The base keeps the remote version, so there is nothing
            // to push there.
            assert!(!plan.push_base);
            assert_eq!(plan.sync_commit, tip);
            assert_eq!(session.deferred, vec![shared.clone()]);
            assert_eq!(session.phase, SyncPhase::AwaitingReview);

            // The review branch carries our version.
            let review_tip = plan.review_tip.unwrap();
            let entry = ctx.git.tree_entry(&review_tip, &shared).unwrap().unwrap();
            let content = ctx.git.read_blob(&entry.oid).unwrap();
            assert_eq!(content, b"version: 2\n");
        }

        #[test]
        fn conflicting_additive_edit_recovers_local_version() {
            let (dir, ctx) = vault_fixture();
            let tip = ctx.git.head_oid().unwrap();

            let remote_commit = commit_replacing(
                dir.path(),
                &ctx,
                &tip,
                "learnings/notes.md",
                b"team version\n",
                "remote edit",
            );
            set_remote_base(dir.path(), &ctx, &remote_commit);

            // Conflicting local edit to the same single-line file.
            fs::write(dir.path().join("learnings/notes.md"), "my version\n").unwrap();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();
            let plan = resolve_changes(&ctx, &mut session, &setup).unwrap();

            let notes = VaultPath::new("learnings/notes.md").unwrap();
            assert_eq!(session.recovered, vec![notes.clone()]);
            assert!(plan.review_files.is_empty());

            // The team version wins in the publish commit.
            let entry = ctx
                .git
                .tree_entry(&plan.sync_commit, &notes)
                .unwrap()
                .unwrap();
            assert_eq!(ctx.git.read_blob(&entry.oid).unwrap(), b"team version\n");

            // The local version is preserved under recovery.
            let recovery = ctx.paths.recovery_path(&session.id, &notes);
            assert_eq!(fs::read(recovery).unwrap(), b"my version\n");
        }

        #[test]
        fn identical_edits_on_shared_file_auto_merge() {
            let (dir, ctx) = vault_fixture();
            let tip = ctx.git.head_oid().unwrap();

            let remote_commit = commit_replacing(
                dir.path(),
                &ctx,
                &tip,
                "schema/model.yaml",
                b"version: 2\n",
                "remote bump",
            );
            set_remote_base(dir.path(), &ctx, &remote_commit);

            // The same edit made locally.
            fs::write(dir.path().join("schema/model.yaml"), "version: 2\n").unwrap();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();
            let plan = resolve_changes(&ctx, &mut session, &setup).unwrap();

            let shared = VaultPath::new("schema/model.yaml").unwrap();
            assert!(session.auto_merged.contains(&shared));
            assert!(session.deferred.is_empty());
            assert!(plan.review_files.is_empty());
            assert_eq!(plan.sync_commit, remote_commit);
            assert!(!plan.push_base);
        }

        #[test]
        fn restaging_same_content_adds_no_commit() {
            let (dir, ctx) = vault_fixture();
            let tip = ctx.git.head_oid().unwrap();
            set_remote_base(dir.path(), &ctx, &tip);

            fs::write(dir.path().join("schema/model.yaml"), "version: 3\n").unwrap();

            let mut session = SyncSession::new();
            let mut checkpoint = None;
            let setup = prepare_pull(&ctx, &mut session, &mut checkpoint).unwrap();
            let files = vec![VaultPath::new("schema/model.yaml").unwrap()];

            let first = stage_review(&ctx, &setup, &files, &tip).unwrap();
            let second = stage_review(&ctx, &setup, &files, &tip).unwrap();

            assert_eq!(first.tip, second.tip);
        }
    }
}
