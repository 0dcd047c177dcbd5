//! Pre-cycle worktree checkpoint.
//!
//! Before a cycle touches anything it records where the user was:
//! the branch, its head commit, and (once taken) the snapshot commit
//! holding their uncommitted edits. If the cycle fails at any phase,
//! [`WorktreeCheckpoint::restore`] puts the worktree back: same
//! branch, same head, same dirty files.

use crate::core::types::{BranchName, Oid};
use crate::git::{Git, GitError};

/// Where the worktree stood before a sync cycle began.
#[derive(Debug, Clone)]
pub struct WorktreeCheckpoint {
    start_branch: BranchName,
    start_head: Oid,
    snapshot: Option<Oid>,
}

impl WorktreeCheckpoint {
    /// Record the current branch and head commit.
    ///
    /// Returns `None` when HEAD is detached; a cycle refuses to start
    /// in that state.
    pub fn capture(git: &Git) -> Result<Option<Self>, GitError> {
        let Some(start_branch) = git.current_branch()? else {
            return Ok(None);
        };
        let start_head = git.head_oid()?;

        Ok(Some(Self {
            start_branch,
            start_head,
            snapshot: None,
        }))
    }

    /// Record the snapshot commit that captured uncommitted edits.
    pub fn set_snapshot(&mut self, snapshot: Oid) {
        self.snapshot = Some(snapshot);
    }

    /// Branch HEAD was on when the cycle began.
    pub fn start_branch(&self) -> &BranchName {
        &self.start_branch
    }

    /// Commit the start branch pointed at when the cycle began.
    pub fn start_head(&self) -> &Oid {
        &self.start_head
    }

    /// The snapshot commit, if local edits were captured.
    pub fn snapshot(&self) -> Option<&Oid> {
        self.snapshot.as_ref()
    }

    /// Put the worktree back where [`capture`](Self::capture) found it.
    ///
    /// Ends any in-progress git operation, forces the worktree back to
    /// the start branch, and re-materializes snapshot content as
    /// uncommitted edits. The staged/unstaged split collapses to
    /// unstaged; file content comes back exactly.
    ///
    /// If the start branch moved while the cycle ran (the user
    /// committed mid-cycle), the snapshot is left unapplied rather
    /// than clobbering their new commit.
    pub fn restore(&self, git: &Git) -> Result<(), GitError> {
        git.cleanup_state()?;
        git.checkout_branch_force(&self.start_branch)?;

        if let Some(snapshot) = &self.snapshot {
            if git.head_oid()? == self.start_head {
                git.checkout_tree_force(snapshot)?;
                git.reset_mixed(&self.start_head)?;
            } else {
                tracing::warn!(
                    branch = %self.start_branch,
                    snapshot = %snapshot,
                    "branch moved during the cycle; leaving snapshot unapplied"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn test_repo() -> (tempfile::TempDir, Git) {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("user.name", "tester").unwrap();
        config.set_str("user.email", "tester@example.com").unwrap();

        fs::write(dir.path().join("README.md"), "vault\n").unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new("README.md")).unwrap();
        index.write().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_oid).unwrap();
        let sig = repo.signature().unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();

        let git = Git::open(dir.path()).unwrap();
        (dir, git)
    }

    #[test]
    fn capture_records_branch_and_head() {
        let (_dir, git) = test_repo();

        let cp = WorktreeCheckpoint::capture(&git).unwrap().unwrap();

        assert_eq!(cp.start_branch(), &git.current_branch().unwrap().unwrap());
        assert_eq!(cp.start_head(), &git.head_oid().unwrap());
        assert!(cp.snapshot().is_none());
    }

    #[test]
    fn capture_on_detached_head_returns_none() {
        let (dir, git) = test_repo();

        let repo = git2::Repository::open(dir.path()).unwrap();
        let head = repo.head().unwrap().target().unwrap();
        repo.set_head_detached(head).unwrap();

        assert!(WorktreeCheckpoint::capture(&git).unwrap().is_none());
    }

    #[test]
    fn restore_returns_to_start_branch_and_head() {
        let (dir, git) = test_repo();
        let cp = WorktreeCheckpoint::capture(&git).unwrap().unwrap();

        // Wander to a scratch branch and commit there.
        let scratch = BranchName::new("collab/sync").unwrap();
        git.update_ref_cas(
            "refs/heads/collab/sync",
            cp.start_head(),
            None,
            "test: scratch branch",
        )
        .unwrap();
        git.checkout_branch(&scratch).unwrap();
        fs::write(dir.path().join("extra.md"), "scratch\n").unwrap();
        git.commit_all("scratch commit").unwrap();

        cp.restore(&git).unwrap();

        assert_eq!(git.current_branch().unwrap().unwrap(), *cp.start_branch());
        assert_eq!(git.head_oid().unwrap(), *cp.start_head());
        assert!(git.worktree_status(true).unwrap().is_clean());
        assert!(!dir.path().join("extra.md").exists());
    }

    #[test]
    fn restore_rematerializes_dirty_files() {
        let (dir, git) = test_repo();

        // Dirty worktree: one modified tracked file, one new file.
        fs::write(dir.path().join("README.md"), "vault, edited\n").unwrap();
        fs::write(dir.path().join("notes.md"), "scribbles\n").unwrap();

        let mut cp = WorktreeCheckpoint::capture(&git).unwrap().unwrap();

        // Mimic a cycle: park on the sync branch, snapshot the edits.
        let sync = BranchName::new("collab/sync").unwrap();
        git.update_ref_cas(
            "refs/heads/collab/sync",
            cp.start_head(),
            None,
            "test: sync branch",
        )
        .unwrap();
        git.checkout_branch(&sync).unwrap();
        let snapshot = git.commit_all("snapshot").unwrap();
        cp.set_snapshot(snapshot);

        // The cycle then rearranges the worktree before failing.
        git.checkout_tree_force(cp.start_head()).unwrap();
        assert!(!dir.path().join("notes.md").exists());

        cp.restore(&git).unwrap();

        assert_eq!(git.current_branch().unwrap().unwrap(), *cp.start_branch());
        assert_eq!(git.head_oid().unwrap(), *cp.start_head());

        let readme = fs::read_to_string(dir.path().join("README.md")).unwrap();
        assert_eq!(readme, "vault, edited\n");
        let notes = fs::read_to_string(dir.path().join("notes.md")).unwrap();
        assert_eq!(notes, "scribbles\n");

        let status = git.worktree_status(true).unwrap();
        assert!(status.has_local_changes());
        assert!(!status.is_clean() || status.untracked > 0);
    }
}
