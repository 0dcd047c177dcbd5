//! review::traits
//!
//! Review host trait for interacting with remote review services.
//!
//! # Design
//!
//! The `ReviewHost` trait is async because review operations involve
//! network I/O. Host adapters are invoked only after local sync state
//! is committed; a host failure never compromises local correctness,
//! it just leaves the review request to be reconciled on the next
//! cycle.
//!
//! # Example
//!
//! ```ignore
//! use collabvault::review::{ReviewHost, CreateRequest};
//!
//! async fn open_review(host: &dyn ReviewHost) -> Result<(), ReviewError> {
//!     let request = CreateRequest {
//!         head: "collab/review".to_string(),
//!         base: "main".to_string(),
//!         title: "Shared vault changes awaiting review".to_string(),
//!         body: "...".to_string(),
//!     };
//!     let review = host.create_request(request).await?;
//!     println!("Opened review #{}: {}", review.number, review.url);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// Errors from review host operations.
///
/// These error types map to common failure modes when talking to a
/// hosted review service like GitHub.
#[derive(Debug, Clone, Error)]
pub enum ReviewError {
    /// Authentication is required but not available.
    #[error("authentication required (set COLLAB_GITHUB_TOKEN or GITHUB_TOKEN)")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The operation is not supported for this remote.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl ReviewError {
    /// Whether a later sync cycle may succeed without user action.
    ///
    /// Credential problems and unsupported remotes need the user;
    /// everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ReviewError::AuthRequired
                | ReviewError::AuthFailed(_)
                | ReviewError::NotImplemented(_)
        )
    }
}

/// Request to open a review request.
#[derive(Debug, Clone)]
pub struct CreateRequest {
    /// Head branch name (the branch carrying deferred changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// Review title
    pub title: String,
    /// Review body
    pub body: String,
}

/// Review request information returned from the host.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    /// Request number
    pub number: u64,
    /// Web URL for viewing
    pub url: String,
    /// Request state (open, closed, merged)
    pub state: ReviewState,
    /// Head branch name
    pub head: String,
    /// Base branch name
    pub base: String,
    /// Request title
    pub title: String,
    /// Request body, if any
    pub body: Option<String>,
}

/// Review request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    /// Open and awaiting a master's decision
    Open,
    /// Closed without being merged
    Closed,
    /// Merged
    Merged,
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewState::Open => write!(f, "open"),
            ReviewState::Closed => write!(f, "closed"),
            ReviewState::Merged => write!(f, "merged"),
        }
    }
}

/// The ReviewHost trait for interacting with remote review services.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async
/// tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ReviewError>`. Callers should treat
/// `AuthRequired`/`AuthFailed` as needing user action and everything
/// else as retryable on a later cycle.
#[async_trait]
pub trait ReviewHost: Send + Sync {
    /// Get the host name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Open a new review request.
    ///
    /// # Errors
    ///
    /// - `AuthRequired` if no credentials are configured
    /// - `AuthFailed` if the token is invalid or lacks permissions
    /// - `ApiError` with status 422 if validation fails (e.g., the
    ///   head branch doesn't exist on the remote)
    async fn create_request(&self, request: CreateRequest) -> Result<ReviewRequest, ReviewError>;

    /// Replace the body of an existing review request.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request doesn't exist
    async fn update_body(&self, number: u64, body: &str) -> Result<ReviewRequest, ReviewError>;

    /// Get a review request by number.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request doesn't exist
    async fn get_request(&self, number: u64) -> Result<ReviewRequest, ReviewError>;

    /// Find the open review request with the given head branch, if
    /// any.
    ///
    /// This is what makes the gateway idempotent: at most one open
    /// request exists per head branch, and repeated cycles find and
    /// update it instead of opening duplicates.
    async fn find_open_by_head(&self, head: &str) -> Result<Option<ReviewRequest>, ReviewError>;

    /// Close a review request without merging it.
    ///
    /// Used after a master promotes the deferred changes locally; the
    /// request has served its purpose.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the request doesn't exist
    async fn close_request(&self, number: u64) -> Result<ReviewRequest, ReviewError>;
}
