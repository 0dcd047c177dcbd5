//! review::mock
//!
//! Recording review host for deterministic testing.
//!
//! # Design
//!
//! The recording host stores review requests in memory, records every
//! call for verification, and allows configuring failure scenarios. It
//! also exposes synchronous helpers so a test can play the master's
//! part (marking a request merged or closed) between sync cycles.
//!
//! # Example
//!
//! ```
//! use collabvault::review::mock::RecordingHost;
//! use collabvault::review::{CreateRequest, ReviewHost, ReviewState};
//!
//! # tokio_test::block_on(async {
//! let host = RecordingHost::new();
//!
//! let review = host.create_request(CreateRequest {
//!     head: "collab/review".to_string(),
//!     base: "main".to_string(),
//!     title: "Shared vault changes awaiting review".to_string(),
//!     body: "files".to_string(),
//! }).await.unwrap();
//!
//! assert_eq!(review.number, 1);
//! assert_eq!(review.state, ReviewState::Open);
//!
//! // The test plays the master and approves it.
//! host.mark_merged(1);
//! assert_eq!(host.get_request(1).await.unwrap().state, ReviewState::Merged);
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::traits::{CreateRequest, ReviewError, ReviewHost, ReviewRequest, ReviewState};

/// Recording review host for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share
/// state.
#[derive(Debug, Clone)]
pub struct RecordingHost {
    inner: Arc<Mutex<RecordingHostInner>>,
}

#[derive(Debug)]
struct RecordingHostInner {
    /// Stored requests by number.
    requests: HashMap<u64, ReviewRequest>,
    /// Next request number to assign.
    next_number: u64,
    /// Operation to fail (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<RecordedOp>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail create_request with the given error.
    Create(ReviewError),
    /// Fail update_body with the given error.
    UpdateBody(ReviewError),
    /// Fail get_request with the given error.
    Get(ReviewError),
    /// Fail find_open_by_head with the given error.
    FindOpenByHead(ReviewError),
    /// Fail close_request with the given error.
    Close(ReviewError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedOp {
    Create { head: String, title: String },
    UpdateBody { number: u64 },
    Get { number: u64 },
    FindOpenByHead { head: String },
    Close { number: u64 },
}

impl RecordingHost {
    /// Create a new empty recording host.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RecordingHostInner {
                requests: HashMap::new(),
                next_number: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Configure the host to fail on a specific operation.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.lock().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.lock().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<RecordedOp> {
        self.lock().operations.clone()
    }

    /// Get the number of stored requests.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Get a request by number without going through the trait.
    pub fn request(&self, number: u64) -> Option<ReviewRequest> {
        self.lock().requests.get(&number).cloned()
    }

    /// Get the open request for a head branch, if any.
    pub fn open_request_for(&self, head: &str) -> Option<ReviewRequest> {
        self.lock()
            .requests
            .values()
            .find(|r| r.head == head && r.state == ReviewState::Open)
            .cloned()
    }

    /// Mark a request merged, as a master would on the host.
    pub fn mark_merged(&self, number: u64) {
        if let Some(request) = self.lock().requests.get_mut(&number) {
            request.state = ReviewState::Merged;
        }
    }

    /// Mark a request closed without merging.
    pub fn mark_closed(&self, number: u64) {
        if let Some(request) = self.lock().requests.get_mut(&number) {
            request.state = ReviewState::Closed;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingHostInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, op: RecordedOp) {
        self.lock().operations.push(op);
    }

    fn check_fail(&self, operation: &str) -> Option<ReviewError> {
        let inner = self.lock();
        match &inner.fail_on {
            Some(FailOn::Create(e)) if operation == "create" => Some(e.clone()),
            Some(FailOn::UpdateBody(e)) if operation == "update_body" => Some(e.clone()),
            Some(FailOn::Get(e)) if operation == "get" => Some(e.clone()),
            Some(FailOn::FindOpenByHead(e)) if operation == "find_open_by_head" => Some(e.clone()),
            Some(FailOn::Close(e)) if operation == "close" => Some(e.clone()),
            _ => None,
        }
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewHost for RecordingHost {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_request(&self, request: CreateRequest) -> Result<ReviewRequest, ReviewError> {
        self.record(RecordedOp::Create {
            head: request.head.clone(),
            title: request.title.clone(),
        });
        if let Some(err) = self.check_fail("create") {
            return Err(err);
        }

        let mut inner = self.lock();
        let number = inner.next_number;
        inner.next_number += 1;

        let review = ReviewRequest {
            number,
            url: format!("https://example.com/review/{}", number),
            state: ReviewState::Open,
            head: request.head,
            base: request.base,
            title: request.title,
            body: Some(request.body),
        };
        inner.requests.insert(number, review.clone());
        Ok(review)
    }

    async fn update_body(&self, number: u64, body: &str) -> Result<ReviewRequest, ReviewError> {
        self.record(RecordedOp::UpdateBody { number });
        if let Some(err) = self.check_fail("update_body") {
            return Err(err);
        }

        let mut inner = self.lock();
        match inner.requests.get_mut(&number) {
            Some(request) => {
                request.body = Some(body.to_string());
                Ok(request.clone())
            }
            None => Err(ReviewError::NotFound(format!("review request {}", number))),
        }
    }

    async fn get_request(&self, number: u64) -> Result<ReviewRequest, ReviewError> {
        self.record(RecordedOp::Get { number });
        if let Some(err) = self.check_fail("get") {
            return Err(err);
        }

        self.lock()
            .requests
            .get(&number)
            .cloned()
            .ok_or_else(|| ReviewError::NotFound(format!("review request {}", number)))
    }

    async fn find_open_by_head(&self, head: &str) -> Result<Option<ReviewRequest>, ReviewError> {
        self.record(RecordedOp::FindOpenByHead {
            head: head.to_string(),
        });
        if let Some(err) = self.check_fail("find_open_by_head") {
            return Err(err);
        }

        Ok(self.open_request_for(head))
    }

    async fn close_request(&self, number: u64) -> Result<ReviewRequest, ReviewError> {
        self.record(RecordedOp::Close { number });
        if let Some(err) = self.check_fail("close") {
            return Err(err);
        }

        let mut inner = self.lock();
        match inner.requests.get_mut(&number) {
            Some(request) => {
                request.state = ReviewState::Closed;
                Ok(request.clone())
            }
            None => Err(ReviewError::NotFound(format!("review request {}", number))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_create(head: &str) -> CreateRequest {
        CreateRequest {
            head: head.to_string(),
            base: "main".to_string(),
            title: "Shared vault changes awaiting review".to_string(),
            body: "body".to_string(),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_numbers() {
        let host = RecordingHost::new();
        let first = host.create_request(sample_create("collab/review")).await.unwrap();
        let second = host.create_request(sample_create("other")).await.unwrap();

        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
        assert_eq!(host.request_count(), 2);
    }

    #[tokio::test]
    async fn find_open_by_head_only_matches_open() {
        let host = RecordingHost::new();
        let review = host.create_request(sample_create("collab/review")).await.unwrap();

        assert!(host
            .find_open_by_head("collab/review")
            .await
            .unwrap()
            .is_some());

        host.mark_merged(review.number);
        assert!(host
            .find_open_by_head("collab/review")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn update_body_replaces_body() {
        let host = RecordingHost::new();
        let review = host.create_request(sample_create("collab/review")).await.unwrap();

        let updated = host.update_body(review.number, "new body").await.unwrap();
        assert_eq!(updated.body.as_deref(), Some("new body"));
    }

    #[tokio::test]
    async fn close_transitions_state() {
        let host = RecordingHost::new();
        let review = host.create_request(sample_create("collab/review")).await.unwrap();

        let closed = host.close_request(review.number).await.unwrap();
        assert_eq!(closed.state, ReviewState::Closed);
    }

    #[tokio::test]
    async fn unknown_numbers_are_not_found() {
        let host = RecordingHost::new();
        assert!(matches!(
            host.get_request(99).await,
            Err(ReviewError::NotFound(_))
        ));
        assert!(matches!(
            host.update_body(99, "x").await,
            Err(ReviewError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn configured_failures_fire() {
        let host = RecordingHost::new().fail_on(FailOn::Create(ReviewError::RateLimited));
        assert!(matches!(
            host.create_request(sample_create("collab/review")).await,
            Err(ReviewError::RateLimited)
        ));

        host.clear_fail_on();
        assert!(host.create_request(sample_create("collab/review")).await.is_ok());
    }

    #[tokio::test]
    async fn operations_are_recorded() {
        let host = RecordingHost::new();
        let _ = host.find_open_by_head("collab/review").await;
        let _ = host.create_request(sample_create("collab/review")).await;

        let ops = host.operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0], RecordedOp::FindOpenByHead { .. }));
        assert!(matches!(ops[1], RecordedOp::Create { .. }));
    }
}
