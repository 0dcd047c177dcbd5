//! review::github
//!
//! GitHub review host implementation using the REST API.
//!
//! # Design
//!
//! This module implements the `ReviewHost` trait for GitHub pull
//! requests. The review branch is pushed by the sync engine before any
//! of these calls happen, so every operation here is a plain REST call
//! against `pulls` endpoints.
//!
//! # Authentication
//!
//! A bearer token comes from the environment: `COLLAB_GITHUB_TOKEN` is
//! checked first so vault credentials can differ from a general
//! `GITHUB_TOKEN`.
//!
//! # Rate Limiting
//!
//! GitHub has rate limits. This implementation returns
//! [`ReviewError::RateLimited`] when limits are hit; the sync engine
//! parks the review step and retries on the next cycle.
//!
//! # Example
//!
//! ```ignore
//! use collabvault::review::github::GitHubHost;
//! use collabvault::review::{ReviewHost, CreateRequest};
//!
//! let host = GitHubHost::from_remote_url(
//!     "git@github.com:owner/repo.git",
//!     "ghp_xxx",
//! ).expect("github remote");
//!
//! let review = host.create_request(CreateRequest {
//!     head: "collab/review".to_string(),
//!     base: "main".to_string(),
//!     title: "Shared vault changes awaiting review".to_string(),
//!     body: String::new(),
//! }).await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::traits::{CreateRequest, ReviewError, ReviewHost, ReviewRequest, ReviewState};
use crate::git::Git;

/// Default GitHub API base URL.
const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "collab-vault";

/// Environment variables checked (in order) for a bearer token.
const TOKEN_ENV_VARS: [&str; 2] = ["COLLAB_GITHUB_TOKEN", "GITHUB_TOKEN"];

/// Read a GitHub token from the environment.
pub fn token_from_env() -> Option<String> {
    TOKEN_ENV_VARS
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|token| !token.trim().is_empty())
}

/// GitHub review host.
pub struct GitHubHost {
    /// HTTP client for making requests
    client: Client,
    /// Bearer token
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (overridable for GitHub Enterprise and tests)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubHost")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl GitHubHost {
    /// Create a GitHub host for a repository.
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a GitHub host with a custom API base URL.
    ///
    /// Used for GitHub Enterprise installations and for pointing tests
    /// at a local mock server.
    pub fn with_api_base(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.into(),
        }
    }

    /// Create a GitHub host from a remote URL.
    ///
    /// Parses the remote URL to extract owner and repo. Returns `None`
    /// for URLs that aren't GitHub.
    ///
    /// # Example
    ///
    /// ```
    /// use collabvault::review::github::GitHubHost;
    ///
    /// assert!(GitHubHost::from_remote_url("git@github.com:owner/repo.git", "t").is_some());
    /// assert!(GitHubHost::from_remote_url("https://example.com/repo.git", "t").is_none());
    /// ```
    pub fn from_remote_url(url: &str, token: impl Into<String>) -> Option<Self> {
        let (owner, repo) = Git::parse_github_remote(url)?;
        Some(Self::new(token, owner, repo))
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ReviewError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ReviewError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ReviewError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ReviewError::ApiError {
                status: status.as_u16(),
                message: format!("failed to parse response: {}", e),
            })
        } else {
            Err(Self::map_error_response(response, status).await)
        }
    }

    /// Map an error response from the API into a typed error.
    async fn map_error_response(response: Response, status: StatusCode) -> ReviewError {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => ReviewError::AuthFailed("invalid or expired token".into()),
            StatusCode::FORBIDDEN => ReviewError::AuthFailed(format!("permission denied: {}", message)),
            StatusCode::NOT_FOUND => ReviewError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ReviewError::RateLimited,
            _ if status.is_server_error() => ReviewError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ReviewError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl ReviewHost for GitHubHost {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn create_request(&self, request: CreateRequest) -> Result<ReviewRequest, ReviewError> {
        let body = CreatePullBody {
            title: &request.title,
            head: &request.head,
            base: &request.base,
            body: &request.body,
        };

        let response = self
            .client
            .post(self.repo_url("pulls"))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;

        let pull: PullResponse = self.handle_response(response).await?;
        Ok(pull.into_review_request())
    }

    async fn update_body(&self, number: u64, body: &str) -> Result<ReviewRequest, ReviewError> {
        let patch = UpdatePullBody { body };

        let response = self
            .client
            .patch(self.repo_url(&format!("pulls/{}", number)))
            .headers(self.headers()?)
            .json(&patch)
            .send()
            .await
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;

        let pull: PullResponse = self.handle_response(response).await?;
        Ok(pull.into_review_request())
    }

    async fn get_request(&self, number: u64) -> Result<ReviewRequest, ReviewError> {
        let response = self
            .client
            .get(self.repo_url(&format!("pulls/{}", number)))
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;

        let pull: PullResponse = self.handle_response(response).await?;
        Ok(pull.into_review_request())
    }

    async fn find_open_by_head(&self, head: &str) -> Result<Option<ReviewRequest>, ReviewError> {
        // GitHub requires the head filter as "owner:branch"
        let response = self
            .client
            .get(self.repo_url("pulls"))
            .headers(self.headers()?)
            .query(&[
                ("head", format!("{}:{}", self.owner, head)),
                ("state", "open".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;

        let pulls: Vec<PullResponse> = self.handle_response(response).await?;
        Ok(pulls.into_iter().next().map(PullResponse::into_review_request))
    }

    async fn close_request(&self, number: u64) -> Result<ReviewRequest, ReviewError> {
        let patch = ClosePullBody { state: "closed" };

        let response = self
            .client
            .patch(self.repo_url(&format!("pulls/{}", number)))
            .headers(self.headers()?)
            .json(&patch)
            .send()
            .await
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;

        let pull: PullResponse = self.handle_response(response).await?;
        Ok(pull.into_review_request())
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Serialize)]
struct CreatePullBody<'a> {
    title: &'a str,
    head: &'a str,
    base: &'a str,
    body: &'a str,
}

#[derive(Serialize)]
struct UpdatePullBody<'a> {
    body: &'a str,
}

#[derive(Serialize)]
struct ClosePullBody {
    state: &'static str,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
    state: String,
    title: String,
    body: Option<String>,
    merged_at: Option<String>,
    head: BranchRef,
    base: BranchRef,
}

#[derive(Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

impl PullResponse {
    fn into_review_request(self) -> ReviewRequest {
        // GitHub reports merged PRs as "closed" with merged_at set
        let state = if self.merged_at.is_some() {
            ReviewState::Merged
        } else if self.state == "open" {
            ReviewState::Open
        } else {
            ReviewState::Closed
        };

        ReviewRequest {
            number: self.number,
            url: self.html_url,
            state,
            head: self.head.branch,
            base: self.base.branch,
            title: self.title,
            body: self.body,
        }
    }
}
