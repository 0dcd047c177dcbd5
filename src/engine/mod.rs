//! Sync engine: orchestration of the cycle and of review promotion.
//!
//! A sync cycle moves through a fixed sequence of phases:
//!
//! 1. **Pulling** — park on the sync branch, snapshot local edits,
//!    fetch the remote base branch
//! 2. **Classifying** — diff both sides against the last sync point and
//!    classify every touched path as additive or shared-state
//! 3. **Resolving** — three-way merge the trees, then apply the
//!    per-path policy to decide what publishes and what defers
//! 4. **AwaitingReview** — stage deferred shared-state changes on the
//!    review branch and make sure a review request covers them
//! 5. **Pushing** — publish the merged result to the remote base and
//!    advance the local base branch to match
//!
//! Any failure drops the cycle into the Failed phase and restores the
//! worktree to its pre-cycle shape from the checkpoint. The phases are
//! recorded on a [`SyncSession`](crate::core::session::SyncSession) and
//! appended to the session log either way.
//!
//! Promotion (`collab merge`) is the master-side counterpart: it
//! replays the review branch onto the base branch and retires the
//! review request.

mod checkpoint;
mod cycle;
mod promote;

pub use checkpoint::WorktreeCheckpoint;
pub use cycle::{run_cycle, SyncOutcome, SyncReport};
pub use promote::{promote_review, PromoteReport};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::classify::RuleSet;
use crate::core::lock::LockError;
use crate::core::paths::CollabPaths;
use crate::core::types::{BranchName, VaultPath};
use crate::git::{Git, GitError, GitRemote, RemoteError};
use crate::manifest::{Manifest, ManifestError, MANIFEST_FILE_NAME};

/// Branch each cycle assembles its merge result on before publishing.
pub const SYNC_BRANCH: &str = "collab/sync";

/// Branch where deferred shared-state changes accumulate until a
/// master promotes them.
pub const REVIEW_BRANCH: &str = "collab/review";

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Manifest could not be loaded or is invalid.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Local repository operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Vault lock handling failed.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// A fetch or push exceeded the network deadline.
    #[error("network timeout after {secs}s during git {operation}")]
    NetworkTimeout {
        /// The operation that timed out
        operation: String,
        /// The deadline that elapsed
        secs: u64,
    },

    /// The remote rejected our credentials.
    #[error("authentication failed during git {operation}: {detail}")]
    AuthFailure {
        /// The denied operation
        operation: String,
        /// First stderr line describing the denial
        detail: String,
    },

    /// The remote ref advanced since we fetched. A later cycle fetches
    /// the new tip and retries.
    #[error("push rejected, the remote moved during the cycle: {detail}")]
    RemoteRejected {
        /// Description from git
        detail: String,
    },

    /// A network git operation failed outright.
    #[error("remote operation failed: {detail}")]
    RemoteFailed {
        /// Description from git
        detail: String,
    },

    /// Replaying reviewed commits hit textual conflicts that need a
    /// human to resolve.
    #[error("merge conflicts in {}", paths_list(paths))]
    MergeConflict {
        /// The conflicted paths
        paths: Vec<VaultPath>,
    },

    /// HEAD is not on any branch.
    #[error("HEAD is detached; check out the vault's base branch first")]
    DetachedHead,

    /// The worktree is parked on a branch the vault does not sync.
    #[error("on branch '{current}' but this vault syncs '{base}'; switch branches first")]
    NotOnBaseBranch {
        /// Branch HEAD is currently on
        current: BranchName,
        /// Branch the manifest names as the sync base
        base: BranchName,
    },

    /// Promotion was requested but nothing is staged for review.
    #[error("no review branch exists; nothing to merge")]
    NoReviewBranch,

    /// The local base branch and the remote disagree in a way a plain
    /// fast-forward cannot fix.
    #[error("local '{base}' has diverged from the remote; run `collab sync` first")]
    BaseDiverged {
        /// The base branch
        base: BranchName,
    },
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Timeout { operation, secs } => SyncError::NetworkTimeout {
                operation: operation.to_string(),
                secs,
            },
            RemoteError::AuthFailed { operation, detail } => SyncError::AuthFailure {
                operation: operation.to_string(),
                detail,
            },
            RemoteError::Rejected { detail, .. } => SyncError::RemoteRejected { detail },
            RemoteError::CommandFailed { detail, .. } => SyncError::RemoteFailed { detail },
            RemoteError::Spawn { source } => SyncError::RemoteFailed {
                detail: source.to_string(),
            },
        }
    }
}

impl SyncError {
    /// Whether a later cycle may succeed with no user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::NetworkTimeout { .. }
                | SyncError::RemoteRejected { .. }
                | SyncError::RemoteFailed { .. }
        )
    }
}

fn paths_list(paths: &[VaultPath]) -> String {
    paths
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Everything an engine operation needs to know about one vault.
///
/// Opening a context re-reads the manifest from disk, so a long-running
/// scheduler picks up policy edits on its next cycle without a restart.
pub struct VaultContext {
    /// Doorway to the local repository.
    pub git: Git,
    /// Collab-owned paths under the git directory.
    pub paths: CollabPaths,
    /// Root of the working tree.
    pub vault_root: PathBuf,
    /// The vault manifest as of open time.
    pub manifest: Manifest,
    /// Classification rules derived from the manifest.
    pub rules: RuleSet,
    /// The per-vault sync branch.
    pub sync_branch: BranchName,
    /// The per-vault review branch.
    pub review_branch: BranchName,
}

impl VaultContext {
    /// Open the vault containing `dir`.
    ///
    /// Fails if `dir` is not inside a git repository, the repository is
    /// bare, or the manifest is missing or invalid.
    pub fn open(dir: &Path) -> Result<Self, SyncError> {
        let git = Git::open(dir)?;
        let info = git.info()?;
        let vault_root = info.work_dir.clone().ok_or(GitError::BareRepo)?;
        let paths = CollabPaths::from_repo_info(&info);
        let manifest = Manifest::load(&vault_root)?;
        let rules = RuleSet::from_policy(&manifest.sync);
        let sync_branch = BranchName::new(SYNC_BRANCH).map_err(GitError::from)?;
        let review_branch = BranchName::new(REVIEW_BRANCH).map_err(GitError::from)?;

        Ok(Self {
            git,
            paths,
            vault_root,
            manifest,
            rules,
            sync_branch,
            review_branch,
        })
    }

    /// Network handle for this vault's working directory.
    pub fn remote(&self) -> GitRemote {
        GitRemote::with_default_timeout(&self.vault_root)
    }

    /// Name of the remote the manifest syncs against.
    pub fn remote_name(&self) -> &str {
        &self.manifest.sync.remote
    }

    /// The base branch the manifest syncs.
    pub fn base_branch(&self) -> &BranchName {
        &self.manifest.sync.base_branch
    }

    /// URL of the sync remote, if configured in the repository.
    pub fn remote_url(&self) -> Result<Option<String>, SyncError> {
        Ok(self.git.remote_url(self.remote_name())?)
    }
}

/// Make sure the manifest is visible to git.
///
/// Vaults that predate collab tracking often ignore dotfiles wholesale.
/// If `.collab.yaml` is currently ignored, append a negation rule to
/// the root `.gitignore` so the manifest can be committed and synced.
/// Returns `true` if the ignore file was amended.
pub fn ensure_manifest_tracked(git: &Git, vault_root: &Path) -> Result<bool, SyncError> {
    if !git.is_ignored(MANIFEST_FILE_NAME)? {
        return Ok(false);
    }

    let gitignore = vault_root.join(".gitignore");
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&gitignore)
        .map_err(|e| GitError::AccessError {
            message: format!("cannot amend {}: {}", gitignore.display(), e),
        })?;
    writeln!(file, "!{}", MANIFEST_FILE_NAME).map_err(|e| GitError::AccessError {
        message: format!("cannot amend {}: {}", gitignore.display(), e),
    })?;

    tracing::info!(
        path = %gitignore.display(),
        "negated ignore rule so the manifest can sync"
    );
    Ok(true)
}
