//! review
//!
//! Abstraction for hosted review services (GitHub).
//!
//! # Architecture
//!
//! The `ReviewHost` trait defines the interface for opening, updating,
//! and closing review requests. Sync cycles go through the
//! [`ReviewGateway`], which enforces the one-open-request-per-branch
//! invariant and makes repeated cycles idempotent. Commands use the
//! [`host_for_remote`] factory rather than importing specific host
//! implementations directly.
//!
//! Host operations are invoked only after local sync state is
//! committed; a host failure never compromises local correctness. The
//! deferred files are safe on the review branch, and the next cycle
//! reconciles the request.
//!
//! # Modules
//!
//! - `traits`: Core `ReviewHost` trait and request/response types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: Recording implementation for deterministic testing
//! - `gateway`: Idempotent request management
//!
//! # Example
//!
//! ```ignore
//! use collabvault::review::{host_for_remote, ReviewGateway};
//!
//! let host = host_for_remote("git@github.com:owner/vault.git")?;
//! let gateway = ReviewGateway::new(host);
//! let outcome = gateway.ensure_request(&head, &base, &deferred).await?;
//! println!("review: {}", outcome.request.url);
//! ```

mod gateway;
pub mod github;
pub mod mock;
mod traits;

pub use gateway::{ReviewGateway, ReviewOutcome, REVIEW_TITLE};
pub use traits::*;

use std::sync::Arc;

use github::GitHubHost;

/// Create a review host for a remote URL.
///
/// Detects the hosting service from the URL and reads credentials from
/// the environment (`COLLAB_GITHUB_TOKEN`, then `GITHUB_TOKEN`).
///
/// # Errors
///
/// - [`ReviewError::NotImplemented`] if the remote isn't a service we
///   can open review requests on
/// - [`ReviewError::AuthRequired`] if no token is configured
pub fn host_for_remote(url: &str) -> Result<Arc<dyn ReviewHost>, ReviewError> {
    if crate::git::Git::parse_github_remote(url).is_none() {
        return Err(ReviewError::NotImplemented(format!(
            "no review host for remote '{}'",
            url
        )));
    }

    let token = github::token_from_env().ok_or(ReviewError::AuthRequired)?;
    let host = GitHubHost::from_remote_url(url, token).ok_or_else(|| {
        ReviewError::NotImplemented(format!("no review host for remote '{}'", url))
    })?;

    Ok(Arc::new(host))
}

#[cfg(test)]
mod factory_tests {
    use super::*;

    #[test]
    fn unsupported_remote_is_rejected() {
        let err = host_for_remote("https://git.example.com/team/vault.git").unwrap_err();
        assert!(matches!(err, ReviewError::NotImplemented(_)));
    }
}
