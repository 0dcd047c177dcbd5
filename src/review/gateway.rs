//! review::gateway
//!
//! Idempotent review request management.
//!
//! # Design
//!
//! The gateway guarantees **at most one open review request per review
//! branch**. Every sync cycle that defers files calls
//! [`ReviewGateway::ensure_request`]; the gateway finds the open
//! request if one exists, unions the deferred-file list into its body,
//! and only talks to the host when something actually changed. Running
//! the same cycle twice is a no-op.
//!
//! The file list travels inside the request body between markers (see
//! [`crate::ui::review_body`]), so the host itself is the source of
//! truth for what's awaiting review. No local database to drift.

use std::sync::Arc;

use super::traits::{CreateRequest, ReviewError, ReviewHost, ReviewRequest, ReviewState};
use crate::core::session::ReviewAction;
use crate::core::types::{BranchName, VaultPath};
use crate::ui::review_body;

/// Title used for review requests this tool opens.
pub const REVIEW_TITLE: &str = "Shared vault changes awaiting review";

/// What `ensure_request` did.
#[derive(Debug, Clone)]
pub struct ReviewOutcome {
    /// The open review request after the call.
    pub request: ReviewRequest,
    /// Whether the call opened, updated, or left it alone.
    pub action: ReviewAction,
}

/// Gateway between sync cycles and the review host.
#[derive(Clone)]
pub struct ReviewGateway {
    host: Arc<dyn ReviewHost>,
}

impl std::fmt::Debug for ReviewGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewGateway")
            .field("host", &self.host.name())
            .finish()
    }
}

impl ReviewGateway {
    /// Create a gateway over a review host.
    pub fn new(host: Arc<dyn ReviewHost>) -> Self {
        Self { host }
    }

    /// Direct access to the underlying host.
    pub fn host(&self) -> &dyn ReviewHost {
        self.host.as_ref()
    }

    /// Ensure an open review request exists for `head` carrying (at
    /// least) the given deferred files.
    ///
    /// - No open request: one is opened with the file list in its body.
    /// - Open request exists: the new files are unioned into the list
    ///   already in its body. Files never leave the list here; only a
    ///   master's merge or close retires them.
    /// - Nothing would change: the host is not called.
    pub async fn ensure_request(
        &self,
        head: &BranchName,
        base: &BranchName,
        files: &[VaultPath],
    ) -> Result<ReviewOutcome, ReviewError> {
        match self.host.find_open_by_head(head.as_str()).await? {
            None => {
                let body = review_body::render_body(None, files);
                let request = self
                    .host
                    .create_request(CreateRequest {
                        head: head.to_string(),
                        base: base.to_string(),
                        title: REVIEW_TITLE.to_string(),
                        body,
                    })
                    .await?;
                Ok(ReviewOutcome {
                    request,
                    action: ReviewAction::Opened,
                })
            }
            Some(existing) => {
                let current_body = existing.body.as_deref();
                let mut union = review_body::parse_file_block(current_body.unwrap_or(""));
                union.extend(files.iter().cloned());
                union.sort();
                union.dedup();

                let new_body = review_body::render_body(current_body, &union);
                if current_body == Some(new_body.as_str()) {
                    return Ok(ReviewOutcome {
                        request: existing,
                        action: ReviewAction::Unchanged,
                    });
                }

                let request = self.host.update_body(existing.number, &new_body).await?;
                Ok(ReviewOutcome {
                    request,
                    action: ReviewAction::Updated,
                })
            }
        }
    }

    /// Current state of a review request by number.
    pub async fn status_of(&self, number: u64) -> Result<ReviewState, ReviewError> {
        Ok(self.host.get_request(number).await?.state)
    }

    /// The open review request for `head`, if any.
    pub async fn open_request(
        &self,
        head: &BranchName,
    ) -> Result<Option<ReviewRequest>, ReviewError> {
        self.host.find_open_by_head(head.as_str()).await
    }
}
