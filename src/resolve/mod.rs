//! resolve
//!
//! Conflict resolution policy.
//!
//! Given how a path changed on each side of a sync cycle and its
//! [`ChangeClass`](crate::classify::ChangeClass), the resolver decides
//! what lands on the base branch and what needs a human:
//!
//! - **Auto-merge**: the merged result stands. Covers remote-only
//!   changes, additive contributions, and the case where both sides
//!   independently arrived at identical content.
//! - **Accept remote with recovery**: for conflicting additive files,
//!   the remote version wins on the base branch and the local version
//!   is preserved as a recovery copy so nothing is silently lost.
//! - **Defer to review**: local deviations to shared-state files never
//!   reach the base branch directly. The pushed tree keeps the remote
//!   version; the local version rides the review branch until a master
//!   approves it.
//!
//! The resolver is a pure function over per-path facts. It never
//! touches the repository; the sync engine gathers the facts and
//! applies the decisions.

use crate::classify::ChangeClass;
use crate::core::types::VaultPath;
use crate::git::DiffStatus;

/// What a sync cycle does with one changed path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the merged result; both contributions survive.
    AutoMerge,
    /// Remote wins on the base branch; preserve the local version as a
    /// recovery copy and warn.
    AcceptRemoteWithRecovery,
    /// Push the remote version; route the local version to review.
    DeferToReview,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::AutoMerge => write!(f, "auto-merge"),
            Resolution::AcceptRemoteWithRecovery => write!(f, "accept-remote"),
            Resolution::DeferToReview => write!(f, "defer-to-review"),
        }
    }
}

/// Everything the resolver needs to know about one changed path.
#[derive(Debug, Clone)]
pub struct PathChange {
    /// The path in question.
    pub path: VaultPath,
    /// How the local side changed it since the last sync point, if at
    /// all.
    pub local: Option<DiffStatus>,
    /// How the remote side changed it since the last sync point, if at
    /// all.
    pub remote: Option<DiffStatus>,
    /// Whether the tree-level merge reported a conflict for this path.
    pub conflicted: bool,
    /// For clean merges where both sides changed: whether the merged
    /// entry is identical to the remote side's entry. When true, the
    /// local edit added nothing the remote doesn't already have.
    pub merged_matches_remote: bool,
}

impl PathChange {
    /// A path only the local side touched.
    pub fn local_only(path: VaultPath, status: DiffStatus) -> Self {
        Self {
            path,
            local: Some(status),
            remote: None,
            conflicted: false,
            merged_matches_remote: false,
        }
    }

    /// A path only the remote side touched.
    pub fn remote_only(path: VaultPath, status: DiffStatus) -> Self {
        Self {
            path,
            local: None,
            remote: Some(status),
            conflicted: false,
            merged_matches_remote: true,
        }
    }
}

/// Decide what happens to one changed path.
///
/// Total over all inputs; a path neither side changed resolves to
/// [`Resolution::AutoMerge`] (there is nothing to decide).
pub fn resolve(change: &PathChange, class: ChangeClass) -> Resolution {
    match (change.local, change.remote) {
        // Remote-only changes flow in unconditionally.
        (None, Some(_)) => Resolution::AutoMerge,
        (None, None) => Resolution::AutoMerge,

        // Local-only changes: additive content is ours to publish;
        // shared state waits for review.
        (Some(_), None) => match class {
            ChangeClass::Additive => Resolution::AutoMerge,
            ChangeClass::SharedState => Resolution::DeferToReview,
        },

        // Both sides changed.
        (Some(_), Some(_)) => match class {
            ChangeClass::Additive => {
                if change.conflicted {
                    Resolution::AcceptRemoteWithRecovery
                } else {
                    Resolution::AutoMerge
                }
            }
            ChangeClass::SharedState => {
                if !change.conflicted && change.merged_matches_remote {
                    // Both sides wrote the same thing; pushing the
                    // merge publishes nothing new.
                    Resolution::AutoMerge
                } else {
                    Resolution::DeferToReview
                }
            }
        },
    }
}
