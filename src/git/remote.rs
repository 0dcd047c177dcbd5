//! git::remote
//!
//! Network-facing Git operations (fetch, push).
//!
//! These shell out to the `git` binary rather than using libgit2's
//! transport so that the user's credential helpers, SSH agents, and
//! URL rewrites all work exactly as they do on the command line. Every
//! call runs under a timeout so an unreachable remote stalls a sync
//! cycle, not the process.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Default per-call timeout for fetch and push.
pub const DEFAULT_NETWORK_TIMEOUT_SECS: u64 = 30;

/// Stderr fragments that indicate a credential problem rather than a
/// transient network failure.
const AUTH_MARKERS: [&str; 6] = [
    "authentication failed",
    "permission denied",
    "could not read username",
    "could not read password",
    "invalid credentials",
    "error: 403",
];

/// Stderr fragments that indicate the remote ref moved under us.
const REJECTED_MARKERS: [&str; 3] = ["non-fast-forward", "[rejected]", "fetch first"];

/// Errors from remote Git operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The operation did not complete within the timeout.
    #[error("git {operation} timed out after {secs}s")]
    Timeout {
        /// The operation that timed out ("fetch" or "push")
        operation: &'static str,
        /// The timeout that elapsed
        secs: u64,
    },

    /// The remote rejected our credentials.
    #[error("git {operation} was denied by the remote: {detail}")]
    AuthFailed {
        /// The operation that was denied
        operation: &'static str,
        /// First stderr line describing the denial
        detail: String,
    },

    /// The remote ref advanced since we fetched (push raced a teammate).
    #[error("git {operation} was rejected (remote moved): {detail}")]
    Rejected {
        /// The rejected operation
        operation: &'static str,
        /// First stderr line describing the rejection
        detail: String,
    },

    /// The git command exited nonzero for some other reason.
    #[error("git {operation} failed: {detail}")]
    CommandFailed {
        /// The failed operation
        operation: &'static str,
        /// Stderr from the command
        detail: String,
    },

    /// The git binary could not be started.
    #[error("failed to run git: {source}")]
    Spawn {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    /// Whether a later sync cycle may succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Timeout { .. }
                | RemoteError::Rejected { .. }
                | RemoteError::CommandFailed { .. }
        )
    }
}

/// Handle for fetch and push against a repository's working directory.
#[derive(Debug, Clone)]
pub struct GitRemote {
    work_dir: PathBuf,
    timeout: Duration,
}

impl GitRemote {
    /// Create a remote handle rooted at `work_dir`.
    pub fn new(work_dir: &Path, timeout: Duration) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            timeout,
        }
    }

    /// Create a remote handle with the default timeout.
    pub fn with_default_timeout(work_dir: &Path) -> Self {
        Self::new(work_dir, Duration::from_secs(DEFAULT_NETWORK_TIMEOUT_SECS))
    }

    /// Fetch a remote, updating its remote-tracking refs.
    ///
    /// Prunes tracking refs for branches deleted on the remote, so a
    /// promoted-and-deleted review branch does not linger as a stale
    /// tracking ref.
    pub async fn fetch(&self, remote: &str) -> Result<(), RemoteError> {
        self.run("fetch", &["fetch", "--quiet", "--prune", remote])
            .await
    }

    /// Push a single refspec to a remote.
    pub async fn push(&self, remote: &str, refspec: &str) -> Result<(), RemoteError> {
        self.run("push", &["push", "--quiet", remote, refspec])
            .await
    }

    async fn run(&self, operation: &'static str, args: &[&str]) -> Result<(), RemoteError> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.work_dir)
            // Never block on an interactive credential prompt; a
            // missing credential surfaces as AuthFailed instead.
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RemoteError::Spawn { source })?;

        // Drain stderr concurrently so a chatty remote can't fill the
        // pipe and wedge the child.
        let stderr_pipe = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr_pipe {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => return Err(RemoteError::Spawn { source }),
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(RemoteError::Timeout {
                    operation,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if status.success() {
            return Ok(());
        }

        let stderr = stderr_task.await.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr);
        Err(classify_failure(operation, stderr.trim()))
    }
}

/// Map a nonzero git exit into the taxonomy the sync engine cares
/// about.
fn classify_failure(operation: &'static str, stderr: &str) -> RemoteError {
    let lower = stderr.to_lowercase();
    let first_line = stderr.lines().next().unwrap_or(stderr).to_string();

    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        return RemoteError::AuthFailed {
            operation,
            detail: first_line,
        };
    }

    if REJECTED_MARKERS.iter().any(|m| lower.contains(m)) {
        return RemoteError::Rejected {
            operation,
            detail: first_line,
        };
    }

    RemoteError::CommandFailed {
        operation,
        detail: stderr.to_string(),
    }
}
