//! core::session
//!
//! Sync session records and the rolling outcome log.
//!
//! A [`SyncSession`] is the run record for one sync cycle. It is
//! control-flow state while the cycle runs and becomes a durable log
//! entry once the cycle reaches a terminal phase. Only the outcome is
//! durable: the log keeps a short rolling window so `collab status`
//! can report the last result without a daemon in the picture.
//!
//! # Storage
//!
//! - `<common_dir>/collab/sessions.json` - Rolling log, newest last

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::CollabPaths;
use crate::core::types::{SessionId, UtcTimestamp, VaultPath};

/// Number of session outcomes retained in the rolling log.
const LOG_CAPACITY: usize = 20;

/// Errors from session log operations.
#[derive(Debug, Error)]
pub enum SessionLogError {
    /// I/O error reading or writing the log.
    #[error("session log i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("session log json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The phase a sync session is in.
///
/// Phases advance strictly forward; `Failed` is reachable from any
/// non-terminal phase and absorbs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Session created, nothing touched yet.
    Idle,
    /// Fetching the remote and merging the base into the sync branch.
    Pulling,
    /// Diffing against the last known-good point and classifying paths.
    Classifying,
    /// Applying per-path resolutions.
    Resolving,
    /// Ensuring a review request exists for deferred paths.
    AwaitingReview,
    /// Pushing the sync branch (and review branch, if any).
    Pushing,
    /// Cycle completed.
    Done,
    /// Cycle failed; the working tree was restored.
    Failed,
}

impl SyncPhase {
    /// Check if the session has reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Failed)
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Pulling => "pulling",
            SyncPhase::Classifying => "classifying",
            SyncPhase::Resolving => "resolving",
            SyncPhase::AwaitingReview => "awaiting-review",
            SyncPhase::Pushing => "pushing",
            SyncPhase::Done => "done",
            SyncPhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// How the session touched the review request, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// A new request was opened this cycle.
    Opened,
    /// An existing open request had its file list extended.
    Updated,
    /// An open request already covered every deferred path.
    Unchanged,
}

/// Reference to the external review request a session touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewTouch {
    /// External request id (e.g. a pull request number).
    pub id: String,
    /// Browsable URL, when the host provides one.
    pub url: Option<String>,
    /// What this session did to the request.
    pub action: ReviewAction,
}

/// The run record for one sync cycle.
///
/// Created at session start, mutated as phases advance, persisted to
/// the rolling log once terminal. Fields use plain serializable types
/// so the record stays decoupled from the engine that produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSession {
    /// Unique id for this cycle.
    pub id: SessionId,
    /// Current phase.
    pub phase: SyncPhase,
    /// When the cycle started.
    pub started_at: UtcTimestamp,
    /// When the cycle reached a terminal phase.
    pub finished_at: Option<UtcTimestamp>,
    /// Paths merged into the sync branch this cycle.
    pub auto_merged: Vec<VaultPath>,
    /// Paths parked on the review branch this cycle.
    pub deferred: Vec<VaultPath>,
    /// Paths whose local version was preserved under recovery before
    /// being overwritten by the remote version.
    pub recovered: Vec<VaultPath>,
    /// Human-readable warnings surfaced in the summary.
    pub warnings: Vec<String>,
    /// The review request this session opened or updated.
    pub review: Option<ReviewTouch>,
    /// Failure description when `phase` is `Failed`.
    pub error: Option<String>,
}

impl SyncSession {
    /// Create a fresh session in the `Idle` phase.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            phase: SyncPhase::Idle,
            started_at: UtcTimestamp::now(),
            finished_at: None,
            auto_merged: vec![],
            deferred: vec![],
            recovered: vec![],
            warnings: vec![],
            review: None,
            error: None,
        }
    }

    /// Advance to the given phase.
    pub fn advance(&mut self, phase: SyncPhase) {
        self.phase = phase;
    }

    /// Mark the session done.
    pub fn complete(&mut self) {
        self.phase = SyncPhase::Done;
        self.finished_at = Some(UtcTimestamp::now());
    }

    /// Mark the session failed with a description.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.phase = SyncPhase::Failed;
        self.error = Some(reason.into());
        self.finished_at = Some(UtcTimestamp::now());
    }

    /// Record a warning for the session summary.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Check if the session reached a terminal phase.
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// True when the cycle ended with paths waiting on review.
    ///
    /// This is a successful outcome, not a failure.
    pub fn review_required(&self) -> bool {
        self.phase == SyncPhase::Done && !self.deferred.is_empty()
    }
}

/// The rolling log of recent session outcomes.
///
/// Stored as a JSON array at `<common_dir>/collab/sessions.json`,
/// newest entry last, capped at a fixed capacity.
pub struct SessionLog;

impl SessionLog {
    /// Load all retained session records.
    ///
    /// A missing log is an empty log, not an error.
    pub fn load(paths: &CollabPaths) -> Result<Vec<SyncSession>, SessionLogError> {
        let path = paths.session_log_path();
        if !path.exists() {
            return Ok(vec![]);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load the most recent session record, if any.
    pub fn last(paths: &CollabPaths) -> Result<Option<SyncSession>, SessionLogError> {
        Ok(Self::load(paths)?.into_iter().next_back())
    }

    /// Append a terminal session record, dropping the oldest entries
    /// beyond capacity.
    pub fn append(paths: &CollabPaths, session: &SyncSession) -> Result<(), SessionLogError> {
        let mut entries = Self::load(paths)?;
        entries.push(session.clone());
        if entries.len() > LOG_CAPACITY {
            let excess = entries.len() - LOG_CAPACITY;
            entries.drain(..excess);
        }
        Self::write_atomic(&paths.session_log_path(), &entries)
    }

    /// Write the log atomically (write to temp file, then rename) to
    /// prevent corruption.
    fn write_atomic(path: &Path, entries: &[SyncSession]) -> Result<(), SessionLogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(entries)?;

        // Write to temp file in same directory (for atomic rename)
        let temp_path = path.with_extension("json.tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}
