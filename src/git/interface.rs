//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all local Git
//! operations. All Git interactions flow through this interface, which
//! provides structured results and normalizes errors into typed
//! failure categories. Network operations (fetch, push) live in
//! [`crate::git::remote`] because they shell out to the `git` binary
//! with a timeout.
//!
//! # Architecture
//!
//! The `Git` struct is the only way to interact with a Git repository.
//! No other module should import `git2` directly. This ensures:
//!
//! - Consistent error handling across all Git operations
//! - Strong type guarantees at the boundary
//! - CAS (compare-and-swap) semantics for all ref mutations
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::CasFailed`]: Compare-and-swap precondition failed
//! - [`GitError::OperationInProgress`]: Rebase/merge/cherry-pick in progress
//! - [`GitError::DirtyWorktree`]: Working tree has uncommitted changes
//!
//! # Example
//!
//! ```ignore
//! use collabvault::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let oid = git.resolve_ref("refs/heads/main")?;
//! println!("main is at {}", oid.short(7));
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{BranchName, Oid, RefName, TypeError, VaultPath};

/// Errors from Git operations.
///
/// These error types cover all categories of local Git failures that
/// the sync protocol needs to handle distinctly.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Compare-and-swap precondition failed.
    ///
    /// This occurs when attempting to update a ref but its current
    /// value doesn't match the expected value. It prevents applying
    /// changes to a repository that has changed since the session
    /// observed it.
    #[error("CAS failed for {refname}: expected {expected}, found {actual}")]
    CasFailed {
        /// The ref being updated
        refname: String,
        /// The expected old value
        expected: String,
        /// The actual current value
        actual: String,
    },

    /// Git operation in progress (rebase, merge, etc.).
    #[error("{operation} in progress")]
    OperationInProgress {
        /// The type of operation in progress
        operation: GitState,
    },

    /// Working tree has uncommitted changes.
    #[error("working tree is dirty: {details}")]
    DirtyWorktree {
        /// Description of what's dirty
        details: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("ref") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidRefName(msg) => GitError::InvalidRefName { message: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
            TypeError::InvalidVaultPath(msg) => GitError::AccessError { message: msg },
        }
    }
}

/// How the repository is laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoContext {
    /// A normal repository (`.git` directory next to the working tree).
    Normal,
    /// A linked worktree (`git_dir` under the parent repo's git dir).
    LinkedWorktree,
    /// A bare repository (no working tree).
    Bare,
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the per-worktree .git directory.
    pub git_dir: PathBuf,
    /// Path to the shared git directory (refs, objects, config).
    pub common_dir: PathBuf,
    /// Path to the working directory, if any.
    pub work_dir: Option<PathBuf>,
    /// Repository layout.
    pub context: RepoContext,
}

/// State of in-progress Git operations.
///
/// This enum represents the various states a Git repository can be in
/// when an operation is paused (usually due to conflicts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,

    /// Rebase in progress.
    Rebase {
        /// Current step in the rebase (1-indexed), if available.
        current: Option<usize>,
        /// Total steps in the rebase, if available.
        total: Option<usize>,
    },

    /// Merge in progress.
    Merge,

    /// Cherry-pick in progress.
    CherryPick,

    /// Revert in progress.
    Revert,

    /// Bisect in progress.
    Bisect,

    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use collabvault::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase { .. } => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitState::Rebase {
                current: Some(c),
                total: Some(t),
            } => write!(f, "rebase ({}/{})", c, t),
            _ => write!(f, "{}", self.description()),
        }
    }
}

/// Summary of working tree status.
///
/// Provides counts of different types of changes in the working tree,
/// used to decide whether local edits need a snapshot commit before a
/// sync cycle touches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files (if requested)
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if the worktree is completely clean (no changes to
    /// tracked files, no conflicts).
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }

    /// Check if there are any local changes worth syncing.
    ///
    /// Unlike [`is_clean`](Self::is_clean), untracked files count: a
    /// freshly added vault file is a local contribution.
    pub fn has_local_changes(&self) -> bool {
        !self.is_clean() || self.untracked > 0
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// What happened to a path between two trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    /// Path exists in the new tree only.
    Added,
    /// Path exists in both trees with different content.
    Modified,
    /// Path exists in the old tree only.
    Deleted,
}

/// One changed path in a tree diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    /// The changed path.
    pub path: VaultPath,
    /// How it changed.
    pub status: DiffStatus,
}

/// A blob entry in a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntryInfo {
    /// The blob OID.
    pub oid: Oid,
    /// The raw git filemode (e.g. 0o100644).
    pub mode: i32,
}

/// One entry change to apply when building a tree.
#[derive(Debug, Clone)]
pub struct TreeUpdate {
    /// The path to update.
    pub path: VaultPath,
    /// The new entry, or `None` to remove the path.
    pub entry: Option<TreeEntryInfo>,
}

/// Result of a tree-level merge of two commits.
///
/// The merged tree contains every cleanly-merged entry; conflicted
/// paths are stripped from it and listed separately so the caller can
/// decide each one.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Tree OID of the merge with conflicted entries removed.
    pub tree: Oid,
    /// Paths both sides changed incompatibly.
    pub conflicts: Vec<VaultPath>,
}

/// Result of replaying one commit onto another, tree-level.
#[derive(Debug, Clone)]
pub struct CherryPickOutcome {
    /// Tree OID of the replayed result, or `None` on conflict.
    pub tree: Option<Oid>,
    /// Conflicting paths when `tree` is `None`.
    pub conflicts: Vec<VaultPath>,
}

/// The Git interface.
///
/// This is the **single point of interaction** with local Git state.
/// All repository reads and writes flow through this interface. No
/// other module should import `git2` directly.
///
/// # CAS Semantics
///
/// All ref mutation operations use compare-and-swap (CAS) semantics.
/// Updates only succeed if the ref's current value matches an expected
/// value, which protects a sync session from a repository that changed
/// under it.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        // Syncing needs a working tree to resolve into
        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Get repository information (git_dir, common_dir, work_dir).
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        let git_dir = self.repo.path().to_path_buf();
        let common_dir = self.repo.commondir().to_path_buf();
        let work_dir = self.repo.workdir().map(Path::to_path_buf);

        let context = if self.repo.is_bare() {
            RepoContext::Bare
        } else if git_dir != common_dir {
            RepoContext::LinkedWorktree
        } else {
            RepoContext::Normal
        };

        Ok(RepoInfo {
            git_dir,
            common_dir,
            work_dir,
            context,
        })
    }

    /// Get direct access to the .git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// Get the working directory path.
    ///
    /// # Errors
    ///
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    /// Get the current Git state (rebase, merge, etc.).
    ///
    /// This detects in-progress operations that require user
    /// intervention. A sync cycle refuses to start while one is
    /// pending.
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge => {
                // Try to read rebase progress
                let (current, total) = self.read_rebase_progress();
                GitState::Rebase { current, total }
            }
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox | git2::RepositoryState::ApplyMailboxOrRebase => {
                GitState::ApplyMailbox
            }
        }
    }

    /// Read rebase progress from .git/rebase-merge or .git/rebase-apply.
    fn read_rebase_progress(&self) -> (Option<usize>, Option<usize>) {
        let git_dir = self.repo.path();

        // Try rebase-merge first (interactive rebase)
        let rebase_merge = git_dir.join("rebase-merge");
        if rebase_merge.exists() {
            let current = std::fs::read_to_string(rebase_merge.join("msgnum"))
                .ok()
                .and_then(|s| s.trim().parse().ok());
            let total = std::fs::read_to_string(rebase_merge.join("end"))
                .ok()
                .and_then(|s| s.trim().parse().ok());
            return (current, total);
        }

        // Try rebase-apply (non-interactive rebase)
        let rebase_apply = git_dir.join("rebase-apply");
        if rebase_apply.exists() {
            let current = std::fs::read_to_string(rebase_apply.join("next"))
                .ok()
                .and_then(|s| s.trim().parse().ok());
            let total = std::fs::read_to_string(rebase_apply.join("last"))
                .ok()
                .and_then(|s| s.trim().parse().ok());
            return (current, total);
        }

        (None, None)
    }

    /// Remove any in-progress operation state (MERGE_HEAD and friends).
    ///
    /// Used when restoring the working tree after a failed session.
    pub fn cleanup_state(&self) -> Result<(), GitError> {
        self.repo.cleanup_state().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })
    }

    // =========================================================================
    // Working Tree Status
    // =========================================================================

    /// Get working tree status summary.
    ///
    /// If `include_untracked` is false, untracked files are not counted.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }

            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }

            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }

            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to its target commit OID.
    ///
    /// This peels through symbolic refs and tags to get the commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn (new repository)
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Check if a ref exists.
    pub fn ref_exists(&self, refname: &str) -> bool {
        self.repo.find_reference(refname).is_ok()
    }

    /// Check if a local branch exists.
    pub fn branch_exists(&self, branch: &BranchName) -> bool {
        self.ref_exists(RefName::for_branch(branch).as_str())
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None) // Detached HEAD
    }

    // =========================================================================
    // CAS Ref Operations
    // =========================================================================

    /// Update a ref with compare-and-swap semantics.
    ///
    /// The update only succeeds if the ref's current value matches
    /// `expected_old`. If `expected_old` is `None`, the ref must not
    /// exist (create case).
    ///
    /// This is the **only** way refs are mutated, ensuring correctness
    /// even when the repository is modified externally mid-session.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match expected
    pub fn update_ref_cas(
        &self,
        refname: &str,
        new_oid: &Oid,
        expected_old: Option<&Oid>,
        message: &str,
    ) -> Result<(), GitError> {
        // Check current value
        let current = self.try_resolve_ref_raw(refname)?;

        // Verify CAS precondition
        match (expected_old, current.as_ref()) {
            (Some(expected), Some(actual)) if expected.as_str() != actual => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected.to_string(),
                    actual: actual.clone(),
                });
            }
            (Some(expected), None) => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected.to_string(),
                    actual: "<none>".to_string(),
                });
            }
            (None, Some(actual)) => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: "<none>".to_string(),
                    actual: actual.clone(),
                });
            }
            _ => {} // Precondition satisfied
        }

        // Perform the update
        let oid = git2::Oid::from_str(new_oid.as_str())
            .map_err(|e| GitError::from_git2(e, new_oid.as_str()))?;

        self.repo
            .reference(refname, oid, true, message)
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Delete a ref with compare-and-swap semantics.
    ///
    /// The delete only succeeds if the ref's current value matches
    /// `expected_old`.
    ///
    /// # Errors
    ///
    /// - [`GitError::CasFailed`] if the current value doesn't match expected
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn delete_ref_cas(&self, refname: &str, expected_old: &Oid) -> Result<(), GitError> {
        // Check current value
        let current = self.try_resolve_ref_raw(refname)?;

        match current {
            None => {
                return Err(GitError::RefNotFound {
                    refname: refname.to_string(),
                });
            }
            Some(actual) if actual != expected_old.as_str() => {
                return Err(GitError::CasFailed {
                    refname: refname.to_string(),
                    expected: expected_old.to_string(),
                    actual,
                });
            }
            _ => {} // Precondition satisfied
        }

        let mut reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        reference
            .delete()
            .map_err(|e| GitError::from_git2(e, refname))?;

        Ok(())
    }

    /// Try to resolve a ref to its raw OID string (without validation).
    ///
    /// Used internally for CAS operations where we need the raw value.
    fn try_resolve_ref_raw(&self, refname: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_reference(refname) {
            Ok(reference) => {
                // Resolve symbolic refs to final target
                let resolved = reference.resolve().unwrap_or(reference);
                let oid = resolved.target().ok_or_else(|| GitError::Internal {
                    message: format!("ref {} has no target", refname),
                })?;
                Ok(Some(oid.to_string()))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, refname)),
        }
    }

    // =========================================================================
    // Ancestry Queries
    // =========================================================================

    /// Find the merge base (common ancestor) of two commits.
    ///
    /// Returns `None` if there is no common ancestor.
    pub fn merge_base(&self, oid1: &Oid, oid2: &Oid) -> Result<Option<Oid>, GitError> {
        let git_oid1 = git2::Oid::from_str(oid1.as_str())
            .map_err(|e| GitError::from_git2(e, oid1.as_str()))?;
        let git_oid2 = git2::Oid::from_str(oid2.as_str())
            .map_err(|e| GitError::from_git2(e, oid2.as_str()))?;

        match self.repo.merge_base(git_oid1, git_oid2) {
            Ok(oid) => Ok(Some(Oid::new(oid.to_string())?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// Returns true if ancestor == descendant (a commit is its own
    /// ancestor).
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        // A commit is its own ancestor
        if ancestor == descendant {
            return Ok(true);
        }

        let ancestor_oid = git2::Oid::from_str(ancestor.as_str())
            .map_err(|e| GitError::from_git2(e, ancestor.as_str()))?;
        let descendant_oid = git2::Oid::from_str(descendant.as_str())
            .map_err(|e| GitError::from_git2(e, descendant.as_str()))?;

        self.repo
            .graph_descendant_of(descendant_oid, ancestor_oid)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    /// Count commits reachable from `tip` but not from `base`.
    ///
    /// Useful for determining if the review branch has commits beyond
    /// the base branch.
    pub fn commit_count(&self, base: &Oid, tip: &Oid) -> Result<usize, GitError> {
        Ok(self.walk_between(base, tip)?.len())
    }

    /// List commits reachable from `tip` but not from `base`, oldest
    /// first.
    ///
    /// The order is suitable for replaying the commits one by one.
    pub fn commits_between(&self, base: &Oid, tip: &Oid) -> Result<Vec<Oid>, GitError> {
        let mut oids = self.walk_between(base, tip)?;
        oids.reverse(); // revwalk yields newest first
        Ok(oids)
    }

    fn walk_between(&self, base: &Oid, tip: &Oid) -> Result<Vec<Oid>, GitError> {
        let base_oid = git2::Oid::from_str(base.as_str())
            .map_err(|e| GitError::from_git2(e, base.as_str()))?;
        let tip_oid =
            git2::Oid::from_str(tip.as_str()).map_err(|e| GitError::from_git2(e, tip.as_str()))?;

        let mut revwalk = self.repo.revwalk().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        revwalk.push(tip_oid).map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;
        revwalk.hide(base_oid).map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let mut oids = Vec::new();
        for oid in revwalk {
            let oid = oid.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
            oids.push(Oid::new(oid.to_string())?);
        }
        Ok(oids)
    }

    // =========================================================================
    // Object Reads
    // =========================================================================

    /// Read a blob by OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the blob doesn't exist
    pub fn read_blob(&self, oid: &Oid) -> Result<Vec<u8>, GitError> {
        let git_oid =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        let blob = self
            .repo
            .find_blob(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))?;

        Ok(blob.content().to_vec())
    }

    /// Get information about a commit.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self.find_commit(oid)?;

        let author = commit.author();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);

        Ok(CommitInfo {
            oid: oid.clone(),
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            author_time,
        })
    }

    // =========================================================================
    // Tree Reads
    // =========================================================================

    /// Get the tree OID of a commit.
    pub fn tree_of(&self, commit: &Oid) -> Result<Oid, GitError> {
        let commit = self.find_commit(commit)?;
        Oid::new(commit.tree_id().to_string()).map_err(|e| e.into())
    }

    /// Look up a blob entry in a commit's tree.
    ///
    /// Returns `None` if the path doesn't exist in the tree.
    pub fn tree_entry(
        &self,
        commit: &Oid,
        path: &VaultPath,
    ) -> Result<Option<TreeEntryInfo>, GitError> {
        let tree = self.tree_of(commit)?;
        self.entry_at(&tree, path)
    }

    /// Look up a blob entry in a tree by tree OID.
    ///
    /// Returns `None` if the path doesn't exist in the tree.
    pub fn entry_at(
        &self,
        tree: &Oid,
        path: &VaultPath,
    ) -> Result<Option<TreeEntryInfo>, GitError> {
        let git_oid = git2::Oid::from_str(tree.as_str())
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;
        let tree = self
            .repo
            .find_tree(git_oid)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;

        match tree.get_path(Path::new(path.as_str())) {
            Ok(entry) => Ok(Some(TreeEntryInfo {
                oid: Oid::new(entry.id().to_string())?,
                mode: entry.filemode(),
            })),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Enumerate every blob in a commit's tree as (path, blob OID)
    /// pairs.
    ///
    /// Used to fingerprint vault content.
    pub fn tree_entries(&self, commit: &Oid) -> Result<Vec<(VaultPath, Oid)>, GitError> {
        let tree = self.find_commit(commit)?.tree().map_err(|e| {
            GitError::Internal {
                message: e.message().to_string(),
            }
        })?;

        let mut entries = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    let full = format!("{}{}", root, name);
                    if let (Ok(path), Ok(oid)) =
                        (VaultPath::new(full), Oid::new(entry.id().to_string()))
                    {
                        entries.push((path, oid));
                    }
                }
            }
            git2::TreeWalkResult::Ok
        })
        .map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        Ok(entries)
    }

    /// Diff the trees of two commits and return changed paths.
    ///
    /// `from` may be `None` to diff against the empty tree (every path
    /// in `to` reports as added). Renames are reported as delete plus
    /// add.
    pub fn diff_names(&self, from: Option<&Oid>, to: &Oid) -> Result<Vec<DiffEntry>, GitError> {
        let old_tree = match from {
            Some(oid) => Some(self.find_commit(oid)?.tree().map_err(|e| {
                GitError::Internal {
                    message: e.message().to_string(),
                }
            })?),
            None => None,
        };
        let new_tree = self.find_commit(to)?.tree().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let diff = self
            .repo
            .diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut entries = Vec::new();
        for delta in diff.deltas() {
            let (status, file) = match delta.status() {
                git2::Delta::Added | git2::Delta::Copied => (DiffStatus::Added, delta.new_file()),
                git2::Delta::Deleted => (DiffStatus::Deleted, delta.old_file()),
                git2::Delta::Modified | git2::Delta::Renamed | git2::Delta::Typechange => {
                    (DiffStatus::Modified, delta.new_file())
                }
                // Unmodified, ignored, untracked, etc. don't appear in
                // tree-to-tree diffs
                _ => continue,
            };

            let Some(path) = file.path().and_then(|p| p.to_str()) else {
                continue;
            };
            if let Ok(path) = VaultPath::new(path) {
                entries.push(DiffEntry { path, status });
            }
        }

        Ok(entries)
    }

    // =========================================================================
    // Tree-Level Merging
    // =========================================================================

    /// Merge two commits at the tree level, without touching the
    /// working tree.
    ///
    /// Cleanly-merged entries land in the returned tree; conflicted
    /// paths are stripped from it and listed so the caller can resolve
    /// each one explicitly.
    pub fn merge_trees(&self, ours: &Oid, theirs: &Oid) -> Result<MergeOutcome, GitError> {
        let our_commit = self.find_commit(ours)?;
        let their_commit = self.find_commit(theirs)?;

        let mut merged = self
            .repo
            .merge_commits(&our_commit, &their_commit, None)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut conflicts = Vec::new();
        if merged.has_conflicts() {
            let iter = merged.conflicts().map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
            for conflict in iter {
                let conflict = conflict.map_err(|e| GitError::Internal {
                    message: e.message().to_string(),
                })?;
                let entry = conflict
                    .our
                    .as_ref()
                    .or(conflict.their.as_ref())
                    .or(conflict.ancestor.as_ref());
                if let Some(entry) = entry {
                    if let Ok(path) = std::str::from_utf8(&entry.path) {
                        if let Ok(path) = VaultPath::new(path) {
                            conflicts.push(path);
                        }
                    }
                }
            }

            // Strip conflict stages so the remaining index writes cleanly
            for path in &conflicts {
                merged
                    .remove_path(Path::new(path.as_str()))
                    .map_err(|e| GitError::Internal {
                        message: e.message().to_string(),
                    })?;
            }
        }

        let tree_oid = merged
            .write_tree_to(&self.repo)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        conflicts.sort();
        Ok(MergeOutcome {
            tree: Oid::new(tree_oid.to_string())?,
            conflicts,
        })
    }

    /// Build a new tree by applying entry updates on top of a base
    /// tree.
    ///
    /// `base_tree` may be `None` to start from the empty tree. Returns
    /// the new tree's OID. Blob objects referenced by updates must
    /// already exist in the object database.
    pub fn apply_tree_updates(
        &self,
        base_tree: Option<&Oid>,
        updates: &[TreeUpdate],
    ) -> Result<Oid, GitError> {
        let mut index = git2::Index::new().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        if let Some(tree_oid) = base_tree {
            let git_oid = git2::Oid::from_str(tree_oid.as_str())
                .map_err(|e| GitError::from_git2(e, tree_oid.as_str()))?;
            let tree = self
                .repo
                .find_tree(git_oid)
                .map_err(|e| GitError::from_git2(e, tree_oid.as_str()))?;
            index.read_tree(&tree).map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
        }

        for update in updates {
            match &update.entry {
                Some(entry) => {
                    let id = git2::Oid::from_str(entry.oid.as_str())
                        .map_err(|e| GitError::from_git2(e, entry.oid.as_str()))?;
                    let index_entry = git2::IndexEntry {
                        ctime: git2::IndexTime::new(0, 0),
                        mtime: git2::IndexTime::new(0, 0),
                        dev: 0,
                        ino: 0,
                        mode: entry.mode as u32,
                        uid: 0,
                        gid: 0,
                        file_size: 0,
                        id,
                        flags: 0,
                        flags_extended: 0,
                        path: update.path.as_str().as_bytes().to_vec(),
                    };
                    index.add(&index_entry).map_err(|e| GitError::Internal {
                        message: e.message().to_string(),
                    })?;
                }
                None => {
                    // Removing a path that isn't present is a no-op
                    let _ = index.remove_path(Path::new(update.path.as_str()));
                }
            }
        }

        let tree_oid = index
            .write_tree_to(&self.repo)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        Oid::new(tree_oid.to_string()).map_err(|e| e.into())
    }

    /// Replay a commit's changes onto another commit, tree-level.
    ///
    /// Returns the resulting tree, or the conflicting paths if the
    /// replay does not apply cleanly. The working tree is untouched.
    pub fn cherry_pick_onto(
        &self,
        commit: &Oid,
        onto: &Oid,
    ) -> Result<CherryPickOutcome, GitError> {
        let pick = self.find_commit(commit)?;
        let base = self.find_commit(onto)?;

        let mut index = self
            .repo
            .cherrypick_commit(&pick, &base, 0, None)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        if index.has_conflicts() {
            let mut conflicts = Vec::new();
            let iter = index.conflicts().map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
            for conflict in iter {
                let conflict = conflict.map_err(|e| GitError::Internal {
                    message: e.message().to_string(),
                })?;
                let entry = conflict
                    .our
                    .as_ref()
                    .or(conflict.their.as_ref())
                    .or(conflict.ancestor.as_ref());
                if let Some(entry) = entry {
                    if let Ok(path) = std::str::from_utf8(&entry.path) {
                        if let Ok(path) = VaultPath::new(path) {
                            conflicts.push(path);
                        }
                    }
                }
            }
            conflicts.sort();
            return Ok(CherryPickOutcome {
                tree: None,
                conflicts,
            });
        }

        let tree_oid = index
            .write_tree_to(&self.repo)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        Ok(CherryPickOutcome {
            tree: Some(Oid::new(tree_oid.to_string())?),
            conflicts: vec![],
        })
    }

    // =========================================================================
    // Commit Creation
    // =========================================================================

    /// Create a commit from a tree, optionally updating a ref.
    ///
    /// The committer comes from the repository configuration, falling
    /// back to a fixed tool identity when none is configured (daemon
    /// environments).
    pub fn commit_tree(
        &self,
        tree: &Oid,
        parents: &[&Oid],
        message: &str,
        update_ref: Option<&RefName>,
    ) -> Result<Oid, GitError> {
        let git_tree_oid = git2::Oid::from_str(tree.as_str())
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;
        let git_tree = self
            .repo
            .find_tree(git_tree_oid)
            .map_err(|e| GitError::from_git2(e, tree.as_str()))?;

        let mut parent_commits = Vec::with_capacity(parents.len());
        for parent in parents {
            parent_commits.push(self.find_commit(parent)?);
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let sig = self.signature()?;
        let oid = self
            .repo
            .commit(
                update_ref.map(RefName::as_str),
                &sig,
                &sig,
                message,
                &git_tree,
                &parent_refs,
            )
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Stage every working tree change (including untracked files) and
    /// commit the result on HEAD.
    ///
    /// Used to snapshot local edits before a sync cycle rearranges the
    /// working tree.
    pub fn commit_all(&self, message: &str) -> Result<Oid, GitError> {
        let mut index = self.repo.index().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
        index.write().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        let tree_oid = index.write_tree().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;
        let tree = self
            .repo
            .find_tree(tree_oid)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let head = self.head_oid()?;
        let parent = self.find_commit(&head)?;

        let sig = self.signature()?;
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve the signature used for commits this tool creates.
    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => git2::Signature::now("collab", "collab@localhost").map_err(|e| {
                GitError::Internal {
                    message: e.message().to_string(),
                }
            }),
        }
    }

    // =========================================================================
    // Working Tree Mutation
    // =========================================================================

    /// Check out an existing local branch (safe checkout).
    ///
    /// Fails if the checkout would clobber local modifications.
    pub fn checkout_branch(&self, branch: &BranchName) -> Result<(), GitError> {
        let refname = RefName::for_branch(branch);
        self.repo
            .set_head(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;

        let mut opts = git2::build::CheckoutBuilder::new();
        opts.safe();
        self.repo
            .checkout_head(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    /// Check out a local branch, forcing the worktree to match its tip.
    ///
    /// Discards local modifications. Callers must ensure any content worth
    /// keeping has already been committed somewhere reachable.
    pub fn checkout_branch_force(&self, branch: &BranchName) -> Result<(), GitError> {
        let refname = RefName::for_branch(branch);
        self.repo
            .set_head(refname.as_str())
            .map_err(|e| GitError::from_git2(e, refname.as_str()))?;

        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force().remove_untracked(true);
        self.repo
            .checkout_head(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    /// Force HEAD's tree into the working tree and index.
    pub fn checkout_head_force(&self) -> Result<(), GitError> {
        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force().remove_untracked(true);
        self.repo
            .checkout_head(Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    /// Force a commit's tree into the working tree and index without
    /// moving HEAD.
    pub fn checkout_tree_force(&self, commit: &Oid) -> Result<(), GitError> {
        let git_oid = git2::Oid::from_str(commit.as_str())
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        let object = self
            .repo
            .find_object(git_oid, Some(git2::ObjectType::Commit))
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;

        let mut opts = git2::build::CheckoutBuilder::new();
        opts.force().remove_untracked(true);
        self.repo
            .checkout_tree(&object, Some(&mut opts))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    /// Hard reset: move HEAD's branch to a commit, resetting index and
    /// working tree.
    pub fn reset_hard(&self, commit: &Oid) -> Result<(), GitError> {
        self.reset(commit, git2::ResetType::Hard)
    }

    /// Mixed reset: move HEAD's branch to a commit and reset the
    /// index, leaving the working tree alone.
    pub fn reset_mixed(&self, commit: &Oid) -> Result<(), GitError> {
        self.reset(commit, git2::ResetType::Mixed)
    }

    fn reset(&self, commit: &Oid, kind: git2::ResetType) -> Result<(), GitError> {
        let git_oid = git2::Oid::from_str(commit.as_str())
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;
        let object = self
            .repo
            .find_object(git_oid, Some(git2::ObjectType::Commit))
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;

        self.repo
            .reset(&object, kind, None)
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    // =========================================================================
    // Ignore Rules
    // =========================================================================

    /// Check whether a path is excluded by the repository's ignore
    /// rules.
    ///
    /// Used by the one-time migration that ensures the manifest is
    /// tracked content.
    pub fn is_ignored(&self, path: &str) -> Result<bool, GitError> {
        self.repo
            .is_path_ignored(Path::new(path))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })
    }

    // =========================================================================
    // Remote Configuration
    // =========================================================================

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Get the default remote name (usually "origin").
    ///
    /// Returns the first remote found, or `None` if no remotes exist.
    pub fn default_remote(&self) -> Result<Option<String>, GitError> {
        let remotes = self.repo.remotes().map_err(|e| GitError::Internal {
            message: e.message().to_string(),
        })?;

        // Prefer "origin" if it exists
        for name in remotes.iter().flatten() {
            if name == "origin" {
                return Ok(Some(name.to_string()));
            }
        }

        Ok(remotes.iter().flatten().next().map(String::from))
    }

    /// Parse a remote URL into owner/repo for GitHub.
    ///
    /// Handles both HTTPS and SSH URLs:
    /// - `https://github.com/owner/repo.git` -> `Some(("owner", "repo"))`
    /// - `git@github.com:owner/repo.git` -> `Some(("owner", "repo"))`
    ///
    /// Returns `None` for non-GitHub URLs.
    ///
    /// # Example
    ///
    /// ```
    /// use collabvault::git::Git;
    ///
    /// assert_eq!(
    ///     Git::parse_github_remote("https://github.com/owner/repo.git"),
    ///     Some(("owner".to_string(), "repo".to_string()))
    /// );
    /// assert_eq!(
    ///     Git::parse_github_remote("git@github.com:owner/repo.git"),
    ///     Some(("owner".to_string(), "repo".to_string()))
    /// );
    /// assert_eq!(
    ///     Git::parse_github_remote("https://gitlab.com/owner/repo.git"),
    ///     None
    /// );
    /// ```
    pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
        // HTTPS format: https://github.com/owner/repo.git
        if let Some(rest) = url.strip_prefix("https://github.com/") {
            return Self::parse_owner_repo(rest);
        }

        // SSH format: git@github.com:owner/repo.git
        if let Some(rest) = url.strip_prefix("git@github.com:") {
            return Self::parse_owner_repo(rest);
        }

        None
    }

    /// Parse "owner/repo.git" or "owner/repo" into (owner, repo).
    fn parse_owner_repo(path: &str) -> Option<(String, String)> {
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, repo) = path.split_once('/')?;

        if owner.is_empty() || repo.is_empty() {
            return None;
        }

        Some((owner.to_string(), repo.to_string()))
    }

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let git_oid =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        self.repo
            .find_commit(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }
}
