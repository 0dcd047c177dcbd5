//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All repository reads and writes
//! flow through this interface. Direct parsing of `.git` internal files
//! outside this module is prohibited. No other module should import `git2`.
//!
//! Local operations use the `git2` crate exclusively. Network operations
//! (fetch, push) shell out to the `git` binary in [`remote`] so that
//! credential helpers work unchanged and every call carries a timeout.
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Ref operations (read, CAS update, delete)
//! - Tree-level merging, cherry-picking, and tree construction
//! - Ancestry queries (merge-base, is-ancestor, commit walks)
//! - Status and state detection
//! - Fetch and push with timeouts ([`remote`])
//!
//! # Invariants
//!
//! - All ref updates use CAS (compare-and-swap) semantics
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, BranchName, RefName)
//!
//! # Example
//!
//! ```ignore
//! use collabvault::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//!
//! // Query operations
//! let oid = git.resolve_ref("refs/heads/main")?;
//!
//! // CAS update (fails if ref changed since read)
//! git.update_ref_cas(
//!     "refs/collab/last-sync",
//!     &new_oid,
//!     Some(&old_oid),
//!     "collab: record sync point"
//! )?;
//! ```

mod interface;
mod remote;

pub use interface::{
    CherryPickOutcome, CommitInfo, DiffEntry, DiffStatus, Git, GitError, GitState, MergeOutcome,
    RepoContext, RepoInfo, TreeEntryInfo, TreeUpdate, WorktreeStatus,
};
pub use remote::{GitRemote, RemoteError};
