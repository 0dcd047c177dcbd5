//! core::lock
//!
//! Exclusive per-vault lock for sync sessions.
//!
//! # Architecture
//!
//! The vault lock ensures only one sync session can mutate the working
//! tree at a time. A scheduler tick and a manual `collab sync` arriving
//! together must never interleave pulls and resolutions.
//!
//! The lock is **repo-scoped** (not worktree-scoped). It is acquired at
//! `<common_dir>/collab/lock`, which is shared across all worktrees in
//! a repository. Independent vaults have independent locks.
//!
//! # Invariants
//!
//! - Lock must be held for an entire sync cycle
//! - Lock is automatically released on drop (RAII pattern)
//! - Lock acquisition is non-blocking (fails fast if locked)
//! - Lock is shared across all worktrees (single-writer per vault)
//!
//! # Example
//!
//! ```ignore
//! use collabvault::core::lock::VaultLock;
//! use collabvault::core::paths::CollabPaths;
//!
//! let lock = VaultLock::acquire(&paths)?;
//!
//! // Perform the sync cycle while holding the lock
//! // ...
//!
//! // Lock automatically released when dropped
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::CollabPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another session already holds the lock.
    #[error("a sync session is already in progress for this vault")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),

    /// I/O error during lock operations.
    #[error("lock i/o error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An exclusive lock on the vault.
///
/// The lock is automatically released when this guard is dropped (RAII
/// pattern). This ensures the lock is always released, even if the
/// session panics.
#[derive(Debug)]
pub struct VaultLock {
    /// Path to the lock file.
    path: PathBuf,
    /// The open file handle with the lock held.
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl VaultLock {
    /// Attempt to acquire the vault lock.
    ///
    /// This uses OS-level file locking via `fs2`, which works across
    /// processes. The lock is non-blocking: if another process holds
    /// the lock, this returns `LockError::AlreadyLocked` immediately,
    /// so callers can report "already syncing" instead of queuing.
    ///
    /// The lock is repo-scoped: it uses `paths.common_dir`, which is
    /// shared across all worktrees.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &CollabPaths) -> Result<Self, LockError> {
        // Create <common_dir>/collab if it doesn't exist
        let collab_dir = paths.repo_collab_dir();
        fs::create_dir_all(&collab_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", collab_dir.display(), e))
        })?;

        let path = paths.lock_path();

        // Open or create the lock file
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        // Try to acquire an exclusive lock (non-blocking)
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning None if already held.
    ///
    /// This is a convenience method that converts `AlreadyLocked` to
    /// `None`. The sync engine uses it to coalesce concurrent triggers.
    ///
    /// # Example
    ///
    /// ```ignore
    /// if let Some(lock) = VaultLock::try_acquire(&paths)? {
    ///     // We got the lock, run the cycle
    /// } else {
    ///     // Another session has it, report "already syncing"
    /// }
    /// ```
    pub fn try_acquire(paths: &CollabPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Check if the lock is currently held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// This is called automatically on drop, but can be called early
    /// if the lock must be released before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        // Best-effort release on drop - ignore errors since we're dropping
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> CollabPaths {
        CollabPaths::new(dir.to_path_buf(), dir.to_path_buf())
    }

    #[test]
    fn lock_acquire_succeeds() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let lock = VaultLock::acquire(&paths).expect("acquire lock");
        assert!(lock.is_held());
        assert!(lock.path().exists());
    }

    #[test]
    fn lock_creates_collab_directory() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let collab_dir = paths.repo_collab_dir();
        assert!(!collab_dir.exists());

        let _lock = VaultLock::acquire(&paths).expect("acquire lock");
        assert!(collab_dir.exists());
    }

    #[test]
    fn lock_prevents_second_acquire() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let lock1 = VaultLock::acquire(&paths).expect("first acquire");
        assert!(lock1.is_held());

        let result = VaultLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        {
            let lock = VaultLock::acquire(&paths).expect("first acquire");
            assert!(lock.is_held());
            // lock dropped here
        }

        let lock2 = VaultLock::acquire(&paths).expect("second acquire");
        assert!(lock2.is_held());
    }

    #[test]
    fn lock_released_explicitly() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let mut lock = VaultLock::acquire(&paths).expect("acquire");
        lock.release().expect("release");
        assert!(!lock.is_held());

        let lock2 = VaultLock::acquire(&paths).expect("reacquire");
        assert!(lock2.is_held());
    }

    #[test]
    fn try_acquire_returns_none_when_locked() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let _lock1 = VaultLock::acquire(&paths).expect("first acquire");

        let result = VaultLock::try_acquire(&paths).expect("try_acquire");
        assert!(result.is_none());
    }

    #[test]
    fn try_acquire_returns_lock_when_available() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let lock = VaultLock::try_acquire(&paths)
            .expect("try_acquire")
            .expect("should get lock");
        assert!(lock.is_held());
    }

    #[test]
    fn multiple_release_calls_are_safe() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let mut lock = VaultLock::acquire(&paths).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release should be ok");
        assert!(!lock.is_held());
    }

    #[test]
    fn worktree_shares_lock_with_parent() {
        // Both the main repo and a linked worktree lock the same file
        // under common_dir.
        let temp = TempDir::new().expect("create temp dir");
        let common_dir = temp.path().to_path_buf();
        let worktree_git_dir = common_dir.join("worktrees").join("feature");

        let main_paths = CollabPaths::new(common_dir.clone(), common_dir.clone());
        let worktree_paths = CollabPaths::new(worktree_git_dir, common_dir.clone());

        let lock1 = VaultLock::acquire(&main_paths).expect("acquire from main");
        assert!(lock1.is_held());

        let result = VaultLock::acquire(&worktree_paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked)));
    }

    #[test]
    fn error_display_formatting() {
        let err = LockError::AlreadyLocked;
        assert!(err.to_string().contains("already in progress"));

        let err = LockError::CreateFailed("test".into());
        assert!(err.to_string().contains("create"));
    }
}
