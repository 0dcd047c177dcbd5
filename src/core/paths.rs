//! core::paths
//!
//! Centralized path routing for collab storage locations.
//!
//! # Architecture
//!
//! All collab storage locations are routed through a centralized helper
//! to ensure correct handling of:
//! - Normal repositories (git_dir == common_dir)
//! - Linked worktrees (common_dir is the parent repo's git dir)
//! - Bare repositories (no work_dir)
//!
//! **Hard rule:** No code may assume `.git/` is a directory or that
//! `git_dir == common_dir`. All paths must go through `CollabPaths`.
//!
//! # Storage Layout
//!
//! All collab data is stored under `<common_dir>/collab/`:
//! - `lock` - Exclusive per-vault sync lock
//! - `sessions.json` - Rolling log of recent session outcomes
//! - `recovery/<session>/` - Local versions preserved before overwrite
//!
//! The membership manifest itself lives in the working tree (it is
//! shared vault content, not local state) and is routed by the
//! manifest store, not by this module.
//!
//! # Example
//!
//! ```
//! use collabvault::core::paths::CollabPaths;
//! use std::path::PathBuf;
//!
//! let paths = CollabPaths::new(
//!     PathBuf::from("/vault/.git"),
//!     PathBuf::from("/vault/.git"),
//! );
//!
//! assert_eq!(
//!     paths.lock_path(),
//!     PathBuf::from("/vault/.git/collab/lock")
//! );
//! ```

use std::path::{Path, PathBuf};

use crate::core::types::{SessionId, VaultPath};
use crate::git::RepoInfo;

/// Centralized path routing for collab storage.
///
/// This struct ensures all collab storage locations are computed
/// consistently, using `common_dir` for repo-scoped storage.
///
/// # Invariants
///
/// - All repo-scoped storage uses `common_dir` (shared across worktrees)
/// - `git_dir` is only used for worktree-specific state (if any)
/// - No code outside this module should compute `*.join("collab")` paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollabPaths {
    /// Path to the per-worktree .git directory.
    /// For normal repos, this equals common_dir.
    /// For linked worktrees, this is `.git/worktrees/<name>/`.
    pub git_dir: PathBuf,

    /// Path to the shared git directory (refs, objects, config).
    /// For normal repos, this equals git_dir.
    /// For linked worktrees, this is the parent repo's git dir.
    pub common_dir: PathBuf,
}

impl CollabPaths {
    /// Create a new CollabPaths from git_dir and common_dir.
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Create CollabPaths from a RepoInfo.
    ///
    /// This is the preferred way to create CollabPaths after opening a
    /// repository.
    pub fn from_repo_info(info: &RepoInfo) -> Self {
        Self {
            git_dir: info.git_dir.clone(),
            common_dir: info.common_dir.clone(),
        }
    }

    // =========================================================================
    // Repo-scoped paths (shared across worktrees)
    // =========================================================================

    /// Get the root collab directory under common_dir.
    ///
    /// All collab data is stored under this directory.
    ///
    /// # Example
    ///
    /// ```
    /// use collabvault::core::paths::CollabPaths;
    /// use std::path::PathBuf;
    ///
    /// let paths = CollabPaths::new(
    ///     PathBuf::from("/vault/.git"),
    ///     PathBuf::from("/vault/.git"),
    /// );
    /// assert_eq!(paths.repo_collab_dir(), PathBuf::from("/vault/.git/collab"));
    /// ```
    pub fn repo_collab_dir(&self) -> PathBuf {
        self.common_dir.join("collab")
    }

    /// Get the path to the per-vault sync lock file.
    ///
    /// This is `<common_dir>/collab/lock`.
    pub fn lock_path(&self) -> PathBuf {
        self.repo_collab_dir().join("lock")
    }

    /// Get the path to the rolling session log.
    ///
    /// This is `<common_dir>/collab/sessions.json`.
    pub fn session_log_path(&self) -> PathBuf {
        self.repo_collab_dir().join("sessions.json")
    }

    /// Get the root directory for recovery copies.
    ///
    /// This is `<common_dir>/collab/recovery/`.
    pub fn recovery_dir(&self) -> PathBuf {
        self.repo_collab_dir().join("recovery")
    }

    /// Get the recovery location for one overwritten file.
    ///
    /// This is `<common_dir>/collab/recovery/<session>/<path>`, where
    /// `<session>` is the short form of the session id. Keeping
    /// recovery copies under the git dir keeps them out of the vault's
    /// tracked content.
    pub fn recovery_path(&self, session: &SessionId, path: &VaultPath) -> PathBuf {
        self.recovery_dir().join(session.short()).join(path.as_str())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Check if this is a linked worktree (common_dir != git_dir).
    pub fn is_worktree(&self) -> bool {
        self.git_dir != self.common_dir
    }

    /// Get the common_dir as a Path reference.
    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    /// Get the git_dir as a Path reference.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Ensure the collab directory structure exists.
    ///
    /// Creates `<common_dir>/collab/` and `<common_dir>/collab/recovery/`
    /// if needed.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.repo_collab_dir())?;
        std::fs::create_dir_all(self.recovery_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal() -> CollabPaths {
        CollabPaths::new(PathBuf::from("/vault/.git"), PathBuf::from("/vault/.git"))
    }

    #[test]
    fn new_creates_paths() {
        let paths = normal();
        assert_eq!(paths.git_dir, PathBuf::from("/vault/.git"));
        assert_eq!(paths.common_dir, PathBuf::from("/vault/.git"));
    }

    #[test]
    fn normal_repo_git_dir_equals_common_dir() {
        assert!(!normal().is_worktree());
    }

    #[test]
    fn worktree_git_dir_differs_from_common_dir() {
        let paths = CollabPaths::new(
            PathBuf::from("/vault/.git/worktrees/feature"),
            PathBuf::from("/vault/.git"),
        );
        assert!(paths.is_worktree());
    }

    #[test]
    fn repo_collab_dir() {
        assert_eq!(
            normal().repo_collab_dir(),
            PathBuf::from("/vault/.git/collab")
        );
    }

    #[test]
    fn lock_path() {
        assert_eq!(normal().lock_path(), PathBuf::from("/vault/.git/collab/lock"));
    }

    #[test]
    fn session_log_path() {
        assert_eq!(
            normal().session_log_path(),
            PathBuf::from("/vault/.git/collab/sessions.json")
        );
    }

    #[test]
    fn recovery_path_includes_session_and_file() {
        let session = SessionId::new();
        let path = VaultPath::new("schema/descriptions.yaml").unwrap();
        let recovery = normal().recovery_path(&session, &path);

        let recovery = recovery.to_string_lossy();
        assert!(recovery.starts_with("/vault/.git/collab/recovery/"));
        assert!(recovery.contains(&session.short()));
        assert!(recovery.ends_with("schema/descriptions.yaml"));
    }

    #[test]
    fn worktree_paths_use_common_dir() {
        // For a linked worktree, all repo-scoped paths go to the parent
        // repo's git dir.
        let paths = CollabPaths::new(
            PathBuf::from("/vault/.git/worktrees/feature"),
            PathBuf::from("/vault/.git"),
        );

        assert_eq!(
            paths.repo_collab_dir(),
            PathBuf::from("/vault/.git/collab")
        );
        assert_eq!(paths.lock_path(), PathBuf::from("/vault/.git/collab/lock"));
    }

    #[test]
    fn from_repo_info() {
        use crate::git::RepoContext;

        let info = RepoInfo {
            git_dir: PathBuf::from("/vault/.git"),
            common_dir: PathBuf::from("/vault/.git"),
            work_dir: Some(PathBuf::from("/vault")),
            context: RepoContext::Normal,
        };

        let paths = CollabPaths::from_repo_info(&info);
        assert_eq!(paths.git_dir, info.git_dir);
        assert_eq!(paths.common_dir, info.common_dir);
    }

    #[test]
    fn path_accessors() {
        let paths = normal();
        assert_eq!(paths.git_dir(), Path::new("/vault/.git"));
        assert_eq!(paths.common_dir(), Path::new("/vault/.git"));
    }
}
